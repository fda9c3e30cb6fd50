// src/ingest/runner.rs
//! One connector run: guard, fetch, merge, record the outcome.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use metrics::{counter, gauge};
use serde::Serialize;

use crate::error::IngestError;
use crate::ingest::providers::fetch_records;
use crate::ingest::scheduler::RunRegistry;
use crate::ingest::transport::Transports;
use crate::ingest::types::RawRecord;
use crate::ingest::{ensure_metrics_described, import_batch, merge_leads, ImportSource};
use crate::model::{Connector, RunStatus, RunSummary, Trigger};
use crate::store::{Repository, WriteTxn};

/// What a successful run reports back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub connector_id: String,
    pub fetched: usize,
    pub imported: usize,
    pub duplicates: usize,
    pub invalid: usize,
}

pub struct ConnectorRunner {
    repo: Arc<Repository>,
    transports: Transports,
    running: RunRegistry,
}

impl ConnectorRunner {
    pub fn new(repo: Arc<Repository>, transports: Transports) -> Self {
        ensure_metrics_described();
        Self {
            repo,
            transports,
            running: RunRegistry::new(),
        }
    }

    pub fn repository(&self) -> &Arc<Repository> {
        &self.repo
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.running
    }

    /// Run `connector_id` now.
    ///
    /// Fails fast with `AlreadyRunning` when the connector has a run in
    /// flight; nothing is fetched or written in that case. A fetch failure is
    /// recorded on the connector and no leads are merged.
    pub async fn run(&self, connector_id: &str, trigger: Trigger) -> Result<RunReport, IngestError> {
        let Some(_slot) = self.running.try_acquire(connector_id) else {
            counter!("lead_ingest_runs_total", "status" => "conflict").increment(1);
            return Err(IngestError::AlreadyRunning(connector_id.to_string()));
        };

        let connector = self
            .repo
            .connectors()
            .await?
            .into_iter()
            .find(|c| c.id == connector_id)
            .ok_or_else(|| IngestError::NotFound("connector".into()))?;

        tracing::info!(
            target: "ingest",
            connector_id,
            connector = %connector.name,
            kind = connector.source.type_name(),
            trigger = trigger.as_str(),
            "connector run started"
        );

        let result = match fetch_records(&connector.source, &self.transports).await {
            Ok(raw) => self.merge(&connector, trigger, raw).await,
            Err(e) => Err(e),
        };

        gauge!("lead_ingest_last_run_ts").set(Utc::now().timestamp() as f64);
        match result {
            Ok(report) => {
                counter!("lead_ingest_runs_total", "status" => "ok").increment(1);
                tracing::info!(
                    target: "ingest",
                    connector_id,
                    fetched = report.fetched,
                    imported = report.imported,
                    duplicates = report.duplicates,
                    invalid = report.invalid,
                    "connector run finished"
                );
                Ok(report)
            }
            Err(e) => {
                counter!("lead_ingest_runs_total", "status" => "error").increment(1);
                tracing::warn!(
                    target: "ingest",
                    connector_id,
                    kind = e.kind().as_str(),
                    error = %e,
                    "connector run failed"
                );
                if let Err(record_err) = self.record_failure(connector_id, &e).await {
                    tracing::warn!(target: "ingest", connector_id, error = %record_err, "could not record run failure");
                }
                Err(e)
            }
        }
    }

    /// Merge a fetched batch and stamp the connector, all under the write lock.
    ///
    /// If the stamp can't be written the merged leads are rolled back, so a
    /// run that reports failure never leaves its import behind.
    async fn merge(
        &self,
        connector: &Connector,
        trigger: Trigger,
        raw: Vec<RawRecord>,
    ) -> Result<RunReport, IngestError> {
        let txn = self.repo.write().await;
        let now = Utc::now();

        let existing = txn.load_leads().await?;
        let outcome = import_batch(&ImportSource::from(connector), &existing, &raw, now);
        let imported = outcome.imported.len();
        let summary = RunSummary {
            trigger,
            fetched: raw.len(),
            imported,
            duplicates: outcome.duplicate_count,
            invalid: outcome.invalid_count,
        };

        let merged = if imported > 0 {
            let merged = merge_leads(outcome.imported, existing);
            txn.save_leads(&merged).await?;
            Some(merged)
        } else {
            None
        };

        if let Err(e) = stamp_ok(&txn, &connector.id, now, &summary).await {
            if let Some(merged) = merged {
                // New leads are the prefix of the merged set.
                if let Err(rollback) = txn.save_leads(&merged[imported..]).await {
                    tracing::error!(
                        target: "ingest",
                        connector_id = %connector.id,
                        error = %rollback,
                        "could not roll back merged leads"
                    );
                }
            }
            return Err(e.into());
        }

        counter!("lead_ingest_imported_total").increment(imported as u64);
        counter!("lead_ingest_duplicates_total").increment(summary.duplicates as u64);
        counter!("lead_ingest_invalid_total").increment(summary.invalid as u64);

        Ok(RunReport {
            connector_id: connector.id.clone(),
            fetched: summary.fetched,
            imported: summary.imported,
            duplicates: summary.duplicates,
            invalid: summary.invalid,
        })
    }

    async fn record_failure(&self, connector_id: &str, err: &IngestError) -> anyhow::Result<()> {
        let txn = self.repo.write().await;
        let mut connectors = txn.load_connectors().await?;
        if let Some(c) = connectors.iter_mut().find(|c| c.id == connector_id) {
            c.last_run_at = Some(Utc::now());
            c.last_run_status = RunStatus::Error;
            c.last_run_error = err.to_string();
            txn.save_connectors(&connectors).await?;
        }
        Ok(())
    }
}

/// Record a successful run. Connectors are reloaded so edits made while
/// fetching are not clobbered.
async fn stamp_ok(
    txn: &WriteTxn<'_>,
    connector_id: &str,
    now: DateTime<Utc>,
    summary: &RunSummary,
) -> anyhow::Result<()> {
    let mut connectors = txn.load_connectors().await?;
    if let Some(c) = connectors.iter_mut().find(|c| c.id == connector_id) {
        c.last_run_at = Some(now);
        c.last_run_status = RunStatus::Ok;
        c.last_run_summary = Some(summary.clone());
        c.last_run_error.clear();
        txn.save_connectors(&connectors).await?;
    }
    Ok(())
}
