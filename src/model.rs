// src/model.rs
//! Domain records: leads, connectors and their typed configuration.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;

pub const STAGE_READY: &str = "READY";
pub const STAGE_MAILED: &str = "MAILED";

/// One normalized contact record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub full_name: String,
    pub street: String,
    #[serde(default)]
    pub unit: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(default)]
    pub county: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub dob: String,
    #[serde(default)]
    pub lead_source: String,
    #[serde(default)]
    pub provider: String,
    #[serde(default)]
    pub connector_id: String,
    pub stage: String,
    pub imported_at: DateTime<Utc>,
}

// ---- field mapping ----

/// Loose mapping as it arrives over the wire; every entry optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingSpec {
    pub full_name: Option<String>,
    pub street: Option<String>,
    pub unit: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub county: Option<String>,
    pub phone: Option<String>,
    pub dob: Option<String>,
    pub lead_source: Option<String>,
}

/// Validated mapping from canonical field to source key (or dotted path).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "MappingSpec")]
pub struct FieldMapping {
    pub full_name: String,
    pub street: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub county: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lead_source: Option<String>,
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

impl TryFrom<MappingSpec> for FieldMapping {
    type Error = IngestError;

    fn try_from(spec: MappingSpec) -> Result<Self, Self::Error> {
        let required = |v: Option<String>, name: &str| {
            non_blank(v).ok_or_else(|| IngestError::config(format!("missing mapping for {name}")))
        };
        Ok(FieldMapping {
            full_name: required(spec.full_name, "fullName")?,
            street: required(spec.street, "street")?,
            city: required(spec.city, "city")?,
            state: required(spec.state, "state")?,
            zip: required(spec.zip, "zip")?,
            unit: non_blank(spec.unit),
            county: non_blank(spec.county),
            phone: non_blank(spec.phone),
            dob: non_blank(spec.dob),
            lead_source: non_blank(spec.lead_source),
        })
    }
}

// ---- connector configuration ----

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpSourceConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiJsonConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Dotted path to the records array, e.g. `data.items`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub records_path: Option<String>,
}

fn default_sftp_port() -> u16 {
    22
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SftpConfig {
    #[serde(default)]
    pub host: String,
    #[serde(default = "default_sftp_port")]
    pub port: u16,
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,
    #[serde(default)]
    pub remote_path: String,
    /// Offline override: read this local file instead of connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_mock_path: Option<String>,
}

impl Default for SftpConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: default_sftp_port(),
            username: String::new(),
            password: None,
            private_key: None,
            remote_path: String::new(),
            local_mock_path: None,
        }
    }
}

/// Closed set of source kinds, each carrying only its own parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum ConnectorSource {
    CsvUrl(HttpSourceConfig),
    ApiJson(ApiJsonConfig),
    SftpCsv(SftpConfig),
}

pub const CONNECTOR_TYPES: [&str; 3] = ["csv_url", "api_json", "sftp_csv"];

impl ConnectorSource {
    pub fn type_name(&self) -> &'static str {
        match self {
            ConnectorSource::CsvUrl(_) => "csv_url",
            ConnectorSource::ApiJson(_) => "api_json",
            ConnectorSource::SftpCsv(_) => "sftp_csv",
        }
    }

    /// Build from the loose `(type, config)` pair. A missing config is
    /// treated as an empty object.
    pub fn from_parts(kind: &str, config: serde_json::Value) -> Result<Self, IngestError> {
        if !CONNECTOR_TYPES.contains(&kind) {
            return Err(IngestError::config(
                "type must be csv_url, api_json, or sftp_csv",
            ));
        }
        let config = match config {
            serde_json::Value::Null => serde_json::Value::Object(Default::default()),
            other => other,
        };
        let source: ConnectorSource =
            serde_json::from_value(serde_json::json!({ "type": kind, "config": config }))
                .map_err(|e| IngestError::config(format!("invalid {kind} config: {e}")))?;
        source.validate()?;
        Ok(source)
    }

    fn validate(&self) -> Result<(), IngestError> {
        match self {
            ConnectorSource::CsvUrl(c) if c.url.trim().is_empty() => {
                Err(IngestError::config("config.url is required"))
            }
            ConnectorSource::ApiJson(c) if c.url.trim().is_empty() => {
                Err(IngestError::config("config.url is required"))
            }
            ConnectorSource::SftpCsv(c)
                if c.local_mock_path.is_none()
                    && (c.host.trim().is_empty() || c.remote_path.trim().is_empty()) =>
            {
                Err(IngestError::config(
                    "config.host and config.remotePath are required (or config.localMockPath)",
                ))
            }
            _ => Ok(()),
        }
    }
}

// ---- run bookkeeping ----

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    #[default]
    None,
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trigger {
    Manual,
    Scheduled,
}

impl Trigger {
    pub fn as_str(self) -> &'static str {
        match self {
            Trigger::Manual => "manual",
            Trigger::Scheduled => "scheduled",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub trigger: Trigger,
    pub fetched: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

/// Configured external lead source plus its mapping, schedule and last run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub source: ConnectorSource,
    pub mapping: FieldMapping,
    /// 0 = never auto-run.
    #[serde(default)]
    pub schedule_minutes: u64,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub last_run_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_run_status: RunStatus,
    #[serde(default)]
    pub last_run_summary: Option<RunSummary>,
    #[serde(default)]
    pub last_run_error: String,
}

fn default_enabled() -> bool {
    true
}

impl Connector {
    /// New connector with no run history.
    pub fn new(
        name: impl Into<String>,
        source: ConnectorSource,
        mapping: FieldMapping,
        schedule_minutes: u64,
        enabled: bool,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            source,
            mapping,
            schedule_minutes,
            enabled,
            created_at: Utc::now(),
            last_run_at: None,
            last_run_status: RunStatus::None,
            last_run_summary: None,
            last_run_error: String::new(),
        }
    }
}

/// Connector create/update payload before validation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorDraft {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub mapping: Option<MappingSpec>,
    #[serde(default)]
    pub schedule_minutes: Option<u64>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl ConnectorDraft {
    /// Validate every field and produce a fresh connector.
    pub fn into_connector(self) -> Result<Connector, IngestError> {
        let name = self
            .name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .ok_or_else(|| IngestError::config("name is required"))?;
        let source = ConnectorSource::from_parts(self.kind.as_deref().unwrap_or_default(), self.config)?;
        let mapping = validate_mapping(self.mapping)?;
        Ok(Connector::new(
            name,
            source,
            mapping,
            self.schedule_minutes.unwrap_or(0),
            self.enabled.unwrap_or(true),
        ))
    }

    /// Overlay the fields present in this draft onto `existing` and
    /// re-validate. Identity and run state are preserved.
    pub fn apply_to(self, existing: &Connector) -> Result<Connector, IngestError> {
        let mut next = existing.clone();
        if let Some(name) = self.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(IngestError::config("name is required"));
            }
            next.name = name;
        }
        let kind_changed = self.kind.is_some();
        if kind_changed || !self.config.is_null() {
            let kind = self
                .kind
                .unwrap_or_else(|| existing.source.type_name().to_string());
            let config = if self.config.is_null() {
                existing_config_value(&existing.source)
            } else {
                self.config
            };
            next.source = ConnectorSource::from_parts(&kind, config)?;
        }
        if self.mapping.is_some() {
            next.mapping = validate_mapping(self.mapping)?;
        }
        if let Some(minutes) = self.schedule_minutes {
            next.schedule_minutes = minutes;
        }
        if let Some(enabled) = self.enabled {
            next.enabled = enabled;
        }
        Ok(next)
    }
}

fn existing_config_value(source: &ConnectorSource) -> serde_json::Value {
    serde_json::to_value(source)
        .ok()
        .and_then(|mut v| v.get_mut("config").map(serde_json::Value::take))
        .unwrap_or(serde_json::Value::Null)
}

/// Reject a missing mapping or one without all required fields.
pub fn validate_mapping(mapping: Option<MappingSpec>) -> Result<FieldMapping, IngestError> {
    mapping
        .ok_or_else(|| IngestError::config("mapping object is required"))?
        .try_into()
}
