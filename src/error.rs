//! Error taxonomy shared by the pipeline, the scheduler and the HTTP layer.
//!
//! Record-level invalidity and duplicates are *not* errors; they are counted
//! in [`crate::ingest::ImportOutcome`]. Everything that aborts an operation
//! ends up here with a short message and a machine-checkable [`ErrorKind`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    NotFound,
    Transport,
    Decode,
    AlreadyRunning,
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transport => "transport",
            ErrorKind::Decode => "decode",
            ErrorKind::AlreadyRunning => "already_running",
            ErrorKind::Storage => "storage",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// Rejected before any I/O: unknown type, incomplete mapping, bad config.
    #[error("{0}")]
    Config(String),

    #[error("{0} not found")]
    NotFound(String),

    /// Non-2xx response, connection failure, file-transfer failure.
    #[error("{0}")]
    Transport(String),

    /// The source answered but the payload could not be decoded.
    #[error("{0}")]
    Decode(String),

    #[error("connector is already running")]
    AlreadyRunning(String),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl IngestError {
    pub fn config(msg: impl Into<String>) -> Self {
        IngestError::Config(msg.into())
    }

    pub fn transport(msg: impl Into<String>) -> Self {
        IngestError::Transport(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            IngestError::Config(_) => ErrorKind::Config,
            IngestError::NotFound(_) => ErrorKind::NotFound,
            IngestError::Transport(_) => ErrorKind::Transport,
            IngestError::Decode(_) => ErrorKind::Decode,
            IngestError::AlreadyRunning(_) => ErrorKind::AlreadyRunning,
            IngestError::Storage(_) => ErrorKind::Storage,
        }
    }
}
