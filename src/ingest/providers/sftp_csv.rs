// src/ingest/providers/sftp_csv.rs
use anyhow::Context;

use crate::error::IngestError;
use crate::ingest::types::{FileTransferConnector, FileTransferLogin, RawRecord};
use crate::model::SftpConfig;

use super::records_from_csv_text;

/// Download the remote CSV (or read `localMockPath`) and parse its rows.
pub async fn fetch(
    cfg: &SftpConfig,
    connector: &dyn FileTransferConnector,
) -> Result<Vec<RawRecord>, IngestError> {
    let text = read_text(cfg, connector).await?;
    Ok(records_from_csv_text(&text))
}

async fn read_text(
    cfg: &SftpConfig,
    connector: &dyn FileTransferConnector,
) -> Result<String, IngestError> {
    if let Some(path) = cfg.local_mock_path.as_deref().filter(|p| !p.trim().is_empty()) {
        return tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading localMockPath {path}"))
            .map_err(|e| IngestError::transport(format!("{e:#}")));
    }

    let login = FileTransferLogin {
        host: cfg.host.clone(),
        port: cfg.port,
        username: cfg.username.clone(),
        password: cfg.password.clone(),
        private_key: cfg.private_key.clone(),
    };
    let mut session = connector
        .connect(&login)
        .await
        .map_err(|e| IngestError::transport(format!("{e:#}")))?;

    // The session is closed whether or not the download succeeded.
    let downloaded = session.get(&cfg.remote_path).await;
    let closed = session.close().await;

    let bytes = downloaded
        .with_context(|| format!("downloading {}", cfg.remote_path))
        .map_err(|e| IngestError::transport(format!("{e:#}")))?;
    if let Err(e) = closed {
        tracing::warn!(target: "ingest", host = %cfg.host, error = %e, "file transfer close failed");
    }
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
