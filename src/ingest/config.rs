// src/ingest/config.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const ENV_PATH: &str = "LEADS_CONFIG_PATH";
const ENV_DATA_DIR: &str = "LEADS_DATA_DIR";
const ENV_TICK_MS: &str = "CONNECTOR_TICK_MS";
const ENV_BATCH_SIZE: &str = "LEADS_DEFAULT_BATCH_SIZE";

const MIN_TICK_MS: u64 = 1_000;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_tick_interval_ms() -> u64 {
    60_000
}
fn default_batch_size() -> usize {
    5_000
}
fn default_metrics_enabled() -> bool {
    true
}

/// Service settings. Every field has a default so an empty file is valid.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AppConfig {
    /// Directory holding `leads.json` and `connectors.json`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,
    /// Page size for lead queries that don't pass `batchSize`.
    #[serde(default = "default_batch_size")]
    pub default_batch_size: usize,
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            tick_interval_ms: default_tick_interval_ms(),
            default_batch_size: default_batch_size(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl AppConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(MIN_TICK_MS))
    }

    fn sanitize(mut self) -> Self {
        self.tick_interval_ms = self.tick_interval_ms.max(MIN_TICK_MS);
        self.default_batch_size = self.default_batch_size.max(1);
        self
    }

    fn apply_env_overrides(mut self) -> Self {
        if let Ok(dir) = std::env::var(ENV_DATA_DIR) {
            if !dir.trim().is_empty() {
                self.data_dir = PathBuf::from(dir.trim());
            }
        }
        if let Some(ms) = env_parse::<u64>(ENV_TICK_MS) {
            self.tick_interval_ms = ms;
        }
        if let Some(n) = env_parse::<usize>(ENV_BATCH_SIZE) {
            self.default_batch_size = n;
        }
        self
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse().ok())
}

/// Load config from an explicit path. Supports TOML or JSON formats.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, ext.as_str())
        .with_context(|| format!("parsing config {}", path.display()))
}

/// Load config using env var + fallbacks, then apply env overrides:
/// 1) $LEADS_CONFIG_PATH
/// 2) config/leads.toml
/// 3) config/leads.json
/// 4) defaults
pub fn load_config_default() -> Result<AppConfig> {
    let base = if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if !pb.exists() {
            return Err(anyhow!("LEADS_CONFIG_PATH points to non-existent path"));
        }
        load_config_from(&pb)?
    } else {
        let toml_p = PathBuf::from("config/leads.toml");
        let json_p = PathBuf::from("config/leads.json");
        if toml_p.exists() {
            load_config_from(&toml_p)?
        } else if json_p.exists() {
            load_config_from(&json_p)?
        } else {
            AppConfig::default()
        }
    };
    Ok(base.apply_env_overrides().sanitize())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<AppConfig> {
    if hint_ext == "json" || s.trim_start().starts_with('{') {
        let cfg: AppConfig = serde_json::from_str(s)?;
        return Ok(cfg.sanitize());
    }
    let cfg: AppConfig = toml::from_str(s)?;
    Ok(cfg.sanitize())
}
