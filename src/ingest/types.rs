// src/ingest/types.rs
use std::collections::BTreeMap;

use anyhow::Result;

use crate::model::Lead;

/// Loosely typed record as produced by a fetch adapter. CSV rows become
/// objects of strings; JSON sources pass their elements through untouched.
pub type RawRecord = serde_json::Value;

/// Result of merging one batch of raw records.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// New leads in fetch order.
    pub imported: Vec<Lead>,
    pub duplicate_count: usize,
    pub invalid_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Outbound HTTP GET used by the `csv_url` and `api_json` adapters.
#[async_trait::async_trait]
pub trait HttpFetcher: Send + Sync {
    async fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<HttpResponse>;
}

/// Credentials for one file-transfer session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransferLogin {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub private_key: Option<String>,
}

/// One remote session. `close` must be safe to call after a failed `get`.
#[async_trait::async_trait]
pub trait FileTransferSession: Send {
    async fn get(&mut self, remote_path: &str) -> Result<Vec<u8>>;
    async fn close(&mut self) -> Result<()>;
}

/// Opens file-transfer sessions for the `sftp_csv` adapter.
#[async_trait::async_trait]
pub trait FileTransferConnector: Send + Sync {
    async fn connect(&self, login: &FileTransferLogin) -> Result<Box<dyn FileTransferSession>>;
}
