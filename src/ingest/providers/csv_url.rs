// src/ingest/providers/csv_url.rs
use crate::error::IngestError;
use crate::ingest::types::{HttpFetcher, RawRecord};
use crate::model::HttpSourceConfig;

use super::records_from_csv_text;

/// GET the CSV document and parse its rows.
pub async fn fetch(
    cfg: &HttpSourceConfig,
    http: &dyn HttpFetcher,
) -> Result<Vec<RawRecord>, IngestError> {
    let resp = http
        .get(&cfg.url, &cfg.headers)
        .await
        .map_err(|e| IngestError::transport(format!("{e:#}")))?;
    if !resp.is_success() {
        return Err(IngestError::transport(format!("HTTP {}", resp.status)));
    }
    Ok(records_from_csv_text(&resp.body))
}
