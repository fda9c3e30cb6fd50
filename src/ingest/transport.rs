// src/ingest/transport.rs
//! Default transport collaborators.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use reqwest::Client;

use crate::ingest::types::{
    FileTransferConnector, FileTransferLogin, FileTransferSession, HttpFetcher, HttpResponse,
};

/// `reqwest`-backed GET. No timeout: a hung source only blocks its own run.
#[derive(Clone, Default)]
pub struct ReqwestFetcher {
    client: Client,
}

impl ReqwestFetcher {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait::async_trait]
impl HttpFetcher for ReqwestFetcher {
    async fn get(&self, url: &str, headers: &BTreeMap<String, String>) -> Result<HttpResponse> {
        let mut req = self.client.get(url);
        for (k, v) in headers {
            req = req.header(k.as_str(), v.as_str());
        }
        let resp = req.send().await.with_context(|| format!("GET {url}"))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.context("read response body")?;
        Ok(HttpResponse { status, body })
    }
}

/// Placeholder used when no file-transfer client is wired in. Connectors
/// with `localMockPath` never reach it.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnconfiguredFileTransfer;

#[async_trait::async_trait]
impl FileTransferConnector for UnconfiguredFileTransfer {
    async fn connect(&self, login: &FileTransferLogin) -> Result<Box<dyn FileTransferSession>> {
        Err(anyhow!(
            "file transfer client not configured for {}:{}; set localMockPath",
            login.host,
            login.port
        ))
    }
}

/// Transport collaborators handed to the fetch adapters.
#[derive(Clone)]
pub struct Transports {
    pub http: Arc<dyn HttpFetcher>,
    pub file_transfer: Arc<dyn FileTransferConnector>,
}

impl Transports {
    pub fn new(http: Arc<dyn HttpFetcher>, file_transfer: Arc<dyn FileTransferConnector>) -> Self {
        Self {
            http,
            file_transfer,
        }
    }
}

impl Default for Transports {
    fn default() -> Self {
        Self::new(Arc::new(ReqwestFetcher::new()), Arc::new(UnconfiguredFileTransfer))
    }
}
