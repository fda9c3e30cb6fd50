// src/store.rs
//! Whole-collection persistence for leads and connectors.
//!
//! Backends only know read-all / replace-all. [`Repository`] adds the
//! single-writer discipline: every read-modify-write goes through
//! [`Repository::write`], so concurrent connector runs, CRUD edits and manual
//! imports never lose each other's updates.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};

use crate::model::{Connector, Lead};

#[async_trait::async_trait]
pub trait LeadStore: Send + Sync {
    async fn load_leads(&self) -> Result<Vec<Lead>>;
    async fn save_leads(&self, leads: &[Lead]) -> Result<()>;
    async fn load_connectors(&self) -> Result<Vec<Connector>>;
    async fn save_connectors(&self, connectors: &[Connector]) -> Result<()>;
}

// ---- JSON files ----

/// `<dir>/leads.json` + `<dir>/connectors.json`, pretty-printed.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Create the directory and empty collections if missing.
    pub async fn ensure_files(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("creating data dir {}", self.dir.display()))?;
        for file in [self.leads_path(), self.connectors_path()] {
            if !tokio::fs::try_exists(&file).await.unwrap_or(false) {
                tokio::fs::write(&file, "[]\n")
                    .await
                    .with_context(|| format!("seeding {}", file.display()))?;
            }
        }
        Ok(())
    }

    pub fn leads_path(&self) -> PathBuf {
        self.dir.join("leads.json")
    }

    pub fn connectors_path(&self) -> PathBuf {
        self.dir.join("connectors.json")
    }

    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Vec<T>> {
        self.ensure_files().await?;
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    async fn write_json<T: Serialize>(&self, path: &Path, items: &[T]) -> Result<()> {
        self.ensure_files().await?;
        let mut text = serde_json::to_string_pretty(items).context("serializing collection")?;
        text.push('\n');
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, text)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .with_context(|| format!("replacing {}", path.display()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl LeadStore for JsonFileStore {
    async fn load_leads(&self) -> Result<Vec<Lead>> {
        self.read_json(&self.leads_path()).await
    }

    async fn save_leads(&self, leads: &[Lead]) -> Result<()> {
        self.write_json(&self.leads_path(), leads).await
    }

    async fn load_connectors(&self) -> Result<Vec<Connector>> {
        self.read_json(&self.connectors_path()).await
    }

    async fn save_connectors(&self, connectors: &[Connector]) -> Result<()> {
        self.write_json(&self.connectors_path(), connectors).await
    }
}

// ---- in-memory ----

#[derive(Debug, Default)]
pub struct MemoryStore {
    leads: Mutex<Vec<Lead>>,
    connectors: Mutex<Vec<Connector>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> anyhow::Error {
    anyhow!("memory store mutex poisoned")
}

#[async_trait::async_trait]
impl LeadStore for MemoryStore {
    async fn load_leads(&self) -> Result<Vec<Lead>> {
        Ok(self.leads.lock().map_err(poisoned)?.clone())
    }

    async fn save_leads(&self, leads: &[Lead]) -> Result<()> {
        *self.leads.lock().map_err(poisoned)? = leads.to_vec();
        Ok(())
    }

    async fn load_connectors(&self) -> Result<Vec<Connector>> {
        Ok(self.connectors.lock().map_err(poisoned)?.clone())
    }

    async fn save_connectors(&self, connectors: &[Connector]) -> Result<()> {
        *self.connectors.lock().map_err(poisoned)? = connectors.to_vec();
        Ok(())
    }
}

// ---- repository ----

/// Store plus a collection-wide write lock.
pub struct Repository {
    backend: Arc<dyn LeadStore>,
    writer: AsyncMutex<()>,
}

impl Repository {
    pub fn new(backend: Arc<dyn LeadStore>) -> Self {
        Self {
            backend,
            writer: AsyncMutex::new(()),
        }
    }

    /// Snapshot read; may be stale by the time the caller acts on it.
    pub async fn leads(&self) -> Result<Vec<Lead>> {
        self.backend.load_leads().await
    }

    pub async fn connectors(&self) -> Result<Vec<Connector>> {
        self.backend.load_connectors().await
    }

    /// Exclusive read-modify-write access until the returned guard drops.
    pub async fn write(&self) -> WriteTxn<'_> {
        WriteTxn {
            _guard: self.writer.lock().await,
            backend: self.backend.as_ref(),
        }
    }
}

pub struct WriteTxn<'a> {
    _guard: MutexGuard<'a, ()>,
    backend: &'a dyn LeadStore,
}

impl WriteTxn<'_> {
    pub async fn load_leads(&self) -> Result<Vec<Lead>> {
        self.backend.load_leads().await
    }

    pub async fn save_leads(&self, leads: &[Lead]) -> Result<()> {
        self.backend.save_leads(leads).await
    }

    pub async fn load_connectors(&self) -> Result<Vec<Connector>> {
        self.backend.load_connectors().await
    }

    pub async fn save_connectors(&self, connectors: &[Connector]) -> Result<()> {
        self.backend.save_connectors(connectors).await
    }
}
