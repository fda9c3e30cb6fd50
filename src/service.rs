// src/service.rs
//! Operations exposed to the routing layer: connector management, run-now,
//! lead queries, export, stage transitions and ad-hoc CSV import.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::IngestError;
use crate::ingest::providers::records_from_csv_text;
use crate::ingest::runner::{ConnectorRunner, RunReport};
use crate::ingest::transport::Transports;
use crate::ingest::{import_batch, merge_leads, ImportSource};
use crate::model::{
    validate_mapping, Connector, ConnectorDraft, MappingSpec, Trigger, STAGE_MAILED, STAGE_READY,
};
use crate::query::{self, LeadCriteria, LeadPage};
use crate::store::{LeadStore, Repository};

pub const MANUAL_IMPORT_ID: &str = "manual-import";
pub const MANUAL_IMPORT_NAME: &str = "Manual Import";

/// Lead query as the routing layer passes it in.
#[derive(Debug, Clone, Default)]
pub struct LeadQuery {
    pub criteria: LeadCriteria,
    pub batch_size: Option<usize>,
    pub batch_number: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvImportRequest {
    #[serde(default)]
    pub csv_text: String,
    #[serde(default)]
    pub mapping: Option<MappingSpec>,
    #[serde(default)]
    pub provider_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub fetched: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

pub struct LeadService {
    repo: Arc<Repository>,
    runner: Arc<ConnectorRunner>,
    default_batch_size: usize,
}

impl LeadService {
    pub fn new(store: Arc<dyn LeadStore>, transports: Transports, default_batch_size: usize) -> Self {
        let repo = Arc::new(Repository::new(store));
        let runner = Arc::new(ConnectorRunner::new(repo.clone(), transports));
        Self {
            repo,
            runner,
            default_batch_size: default_batch_size.max(1),
        }
    }

    /// Shared with the scheduler so both paths use the same running set.
    pub fn runner(&self) -> Arc<ConnectorRunner> {
        self.runner.clone()
    }

    // ---- connectors ----

    pub async fn list_connectors(&self) -> Result<Vec<Connector>, IngestError> {
        Ok(self.repo.connectors().await?)
    }

    pub async fn create_connector(&self, draft: ConnectorDraft) -> Result<Connector, IngestError> {
        let connector = draft.into_connector()?;
        let txn = self.repo.write().await;
        let mut connectors = txn.load_connectors().await?;
        connectors.push(connector.clone());
        txn.save_connectors(&connectors).await?;
        tracing::info!(connector_id = %connector.id, name = %connector.name, "connector created");
        Ok(connector)
    }

    pub async fn update_connector(&self, id: &str, patch: ConnectorDraft) -> Result<Connector, IngestError> {
        let txn = self.repo.write().await;
        let mut connectors = txn.load_connectors().await?;
        let slot = connectors
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| IngestError::NotFound("connector".into()))?;
        let next = patch.apply_to(slot)?;
        *slot = next.clone();
        txn.save_connectors(&connectors).await?;
        tracing::info!(connector_id = %id, "connector updated");
        Ok(next)
    }

    pub async fn delete_connector(&self, id: &str) -> Result<(), IngestError> {
        let txn = self.repo.write().await;
        let mut connectors = txn.load_connectors().await?;
        let before = connectors.len();
        connectors.retain(|c| c.id != id);
        if connectors.len() == before {
            return Err(IngestError::NotFound("connector".into()));
        }
        txn.save_connectors(&connectors).await?;
        tracing::info!(connector_id = %id, "connector deleted");
        Ok(())
    }

    pub async fn run_connector(&self, id: &str) -> Result<RunReport, IngestError> {
        self.runner.run(id, Trigger::Manual).await
    }

    // ---- leads ----

    pub async fn query_leads(&self, q: &LeadQuery) -> Result<LeadPage, IngestError> {
        self.query_leads_at(q, Utc::now().date_naive()).await
    }

    pub async fn query_leads_at(&self, q: &LeadQuery, today: NaiveDate) -> Result<LeadPage, IngestError> {
        let leads = self.repo.leads().await?;
        Ok(query::query(
            &leads,
            &q.criteria,
            q.batch_size.unwrap_or(self.default_batch_size),
            q.batch_number.unwrap_or(1),
            today,
        ))
    }

    /// CSV of the same page [`Self::query_leads`] would return.
    pub async fn export_leads(&self, q: &LeadQuery) -> Result<String, IngestError> {
        let today = Utc::now().date_naive();
        let page = self.query_leads_at(q, today).await?;
        Ok(query::export_csv(&page.items, today)?)
    }

    /// READY → MAILED for the given IDs; other stages are left alone.
    pub async fn mark_mailed(&self, lead_ids: &[String]) -> Result<usize, IngestError> {
        if lead_ids.is_empty() {
            return Err(IngestError::config("leadIds array is required"));
        }
        let wanted: HashSet<&str> = lead_ids.iter().map(String::as_str).collect();

        let txn = self.repo.write().await;
        let mut leads = txn.load_leads().await?;
        let mut updated = 0usize;
        for lead in leads.iter_mut() {
            if wanted.contains(lead.id.as_str()) && lead.stage == STAGE_READY {
                lead.stage = STAGE_MAILED.to_string();
                updated += 1;
            }
        }
        if updated > 0 {
            txn.save_leads(&leads).await?;
        }
        tracing::info!(requested = lead_ids.len(), updated, "leads marked mailed");
        Ok(updated)
    }

    /// One-shot import of pasted CSV through the regular dedup pipeline.
    pub async fn import_csv(&self, req: CsvImportRequest) -> Result<ImportReport, IngestError> {
        let mapping = validate_mapping(req.mapping)?;
        if req.csv_text.trim().is_empty() {
            return Err(IngestError::config("csvText is required"));
        }
        let name = req
            .provider_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| MANUAL_IMPORT_NAME.to_string());
        let source = ImportSource {
            id: MANUAL_IMPORT_ID,
            name: &name,
            mapping: &mapping,
        };

        let raw = records_from_csv_text(&req.csv_text);
        let txn = self.repo.write().await;
        let existing = txn.load_leads().await?;
        let outcome = import_batch(&source, &existing, &raw, Utc::now());
        let report = ImportReport {
            fetched: raw.len(),
            imported: outcome.imported.len(),
            duplicates: outcome.duplicate_count,
            invalid: outcome.invalid_count,
        };
        if report.imported > 0 {
            txn.save_leads(&merge_leads(outcome.imported, existing)).await?;
        }
        tracing::info!(
            target: "ingest",
            provider = %name,
            fetched = report.fetched,
            imported = report.imported,
            duplicates = report.duplicates,
            invalid = report.invalid,
            "manual csv import"
        );
        Ok(report)
    }
}
