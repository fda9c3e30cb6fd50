// src/ingest/providers/mod.rs
//! Fetch adapters, one per connector kind. Each returns the full set of raw
//! records or an error; nothing shared is touched here.

pub mod api_json;
pub mod csv_url;
pub mod sftp_csv;

use metrics::{counter, histogram};

use crate::csv_codec;
use crate::error::IngestError;
use crate::ingest::transport::Transports;
use crate::ingest::types::RawRecord;
use crate::model::ConnectorSource;

/// Dispatch on the connector kind and fetch every raw record.
pub async fn fetch_records(
    source: &ConnectorSource,
    transports: &Transports,
) -> Result<Vec<RawRecord>, IngestError> {
    let t0 = std::time::Instant::now();
    let out = match source {
        ConnectorSource::CsvUrl(cfg) => csv_url::fetch(cfg, transports.http.as_ref()).await,
        ConnectorSource::ApiJson(cfg) => api_json::fetch(cfg, transports.http.as_ref()).await,
        ConnectorSource::SftpCsv(cfg) => {
            sftp_csv::fetch(cfg, transports.file_transfer.as_ref()).await
        }
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("lead_ingest_fetch_ms").record(ms);
    match &out {
        Ok(records) => {
            counter!("lead_ingest_fetched_total").increment(records.len() as u64);
        }
        Err(e) => {
            tracing::warn!(target: "ingest", kind = source.type_name(), error = %e, "fetch failed");
        }
    }
    out
}

/// Parse CSV text into raw records (objects of strings).
pub(crate) fn records_from_csv_text(text: &str) -> Vec<RawRecord> {
    csv_codec::parse(text)
        .records
        .into_iter()
        .map(|rec| {
            RawRecord::Object(
                rec.into_iter()
                    .map(|(k, v)| (k, RawRecord::String(v)))
                    .collect(),
            )
        })
        .collect()
}

/// Resolve a dotted path (`data.items`) inside a JSON value. An empty path
/// resolves to the value itself.
pub fn pick_path<'a>(value: &'a RawRecord, path: &str) -> Option<&'a RawRecord> {
    let path = path.trim();
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |acc, key| match acc {
        RawRecord::Object(map) => map.get(key),
        RawRecord::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}
