// src/ingest/providers/api_json.rs
use crate::error::IngestError;
use crate::ingest::types::{HttpFetcher, RawRecord};
use crate::model::ApiJsonConfig;

use super::pick_path;

/// GET a JSON document and extract the records array.
///
/// `recordsPath` wins when it resolves to an array; otherwise a top-level
/// array is used; otherwise the result is empty. A misconfigured path is not
/// an error.
pub async fn fetch(
    cfg: &ApiJsonConfig,
    http: &dyn HttpFetcher,
) -> Result<Vec<RawRecord>, IngestError> {
    let resp = http
        .get(&cfg.url, &cfg.headers)
        .await
        .map_err(|e| IngestError::transport(format!("{e:#}")))?;
    if !resp.is_success() {
        return Err(IngestError::transport(format!("HTTP {}", resp.status)));
    }
    let json: RawRecord = serde_json::from_str(&resp.body)
        .map_err(|e| IngestError::Decode(format!("invalid JSON from {}: {e}", cfg.url)))?;
    Ok(extract_records(json, cfg.records_path.as_deref()))
}

pub(crate) fn extract_records(json: RawRecord, records_path: Option<&str>) -> Vec<RawRecord> {
    if let Some(RawRecord::Array(items)) = pick_path(&json, records_path.unwrap_or_default()) {
        return items.clone();
    }
    match json {
        RawRecord::Array(items) => items,
        _ => Vec::new(),
    }
}
