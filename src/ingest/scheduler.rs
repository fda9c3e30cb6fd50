// src/ingest/scheduler.rs
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use metrics::counter;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use crate::error::IngestError;
use crate::ingest::runner::ConnectorRunner;
use crate::model::{Connector, Trigger};

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Connector IDs with a run in flight. At most one run per ID at any instant.
#[derive(Debug, Default)]
pub struct RunRegistry {
    running: Mutex<HashSet<String>>,
}

impl RunRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<String>> {
        // A panic while holding the lock leaves the set itself intact.
        self.running.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Claim `id`, or `None` if it is already running. The claim is released
    /// when the returned slot drops.
    pub fn try_acquire(&self, id: &str) -> Option<RunSlot<'_>> {
        if !self.lock().insert(id.to_string()) {
            return None;
        }
        Some(RunSlot {
            registry: self,
            id: id.to_string(),
        })
    }

    pub fn is_running(&self, id: &str) -> bool {
        self.lock().contains(id)
    }

    pub fn running_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().iter().cloned().collect();
        ids.sort();
        ids
    }
}

#[derive(Debug)]
pub struct RunSlot<'a> {
    registry: &'a RunRegistry,
    id: String,
}

impl Drop for RunSlot<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.id);
    }
}

/// Enabled, scheduled (`scheduleMinutes > 0`) and either never run or at
/// least `scheduleMinutes` since the last run.
pub fn is_due(connector: &Connector, now: DateTime<Utc>) -> bool {
    if !connector.enabled || connector.schedule_minutes == 0 {
        return false;
    }
    match connector.last_run_at {
        None => true,
        Some(last) => i64::try_from(connector.schedule_minutes)
            .ok()
            .and_then(chrono::Duration::try_minutes)
            .is_some_and(|period| now.signed_duration_since(last) >= period),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub due: usize,
    pub succeeded: usize,
    pub failed: usize,
}

/// Run every due connector once, sequentially in stored order. Failures are
/// logged and isolated to their connector.
pub async fn tick(runner: &ConnectorRunner, now: DateTime<Utc>) -> Result<TickReport, IngestError> {
    counter!("lead_scheduler_ticks_total").increment(1);
    let connectors = runner.repository().connectors().await?;
    let due: Vec<&Connector> = connectors.iter().filter(|c| is_due(c, now)).collect();

    let mut report = TickReport {
        due: due.len(),
        ..TickReport::default()
    };
    for c in due {
        match runner.run(&c.id, Trigger::Scheduled).await {
            Ok(_) => report.succeeded += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(
                    target: "ingest",
                    connector_id = %c.id,
                    connector = %c.name,
                    kind = e.kind().as_str(),
                    error = %e,
                    "scheduled run failed"
                );
            }
        }
    }
    Ok(report)
}

/// Running scheduler loop. Dropping the handle stops the loop after the
/// current tick; [`SchedulerHandle::shutdown`] also waits for it.
pub struct SchedulerHandle {
    stop: Option<oneshot::Sender<()>>,
    join: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub async fn shutdown(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(join) = self.join.take() {
            if let Err(e) = join.await {
                tracing::warn!(target: "ingest", error = ?e, "scheduler task ended abnormally");
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.join.as_ref().map_or(true, |j| j.is_finished())
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

/// Spawn the periodic due-connector check. The first tick fires one
/// `period` after start; a zero period is raised to 1 ms.
pub fn spawn_scheduler(runner: Arc<ConnectorRunner>, period: Duration) -> SchedulerHandle {
    let period = period.max(MIN_PERIOD);
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let join = tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(target: "ingest", period_ms = period.as_millis() as u64, "scheduler started");
        loop {
            tokio::select! {
                _ = &mut stop_rx => break,
                _ = ticker.tick() => {
                    match tick(&runner, Utc::now()).await {
                        Ok(r) if r.due > 0 => tracing::info!(
                            target: "ingest",
                            due = r.due,
                            succeeded = r.succeeded,
                            failed = r.failed,
                            "scheduler tick"
                        ),
                        Ok(_) => tracing::debug!(target: "ingest", "scheduler tick: nothing due"),
                        Err(e) => tracing::warn!(target: "ingest", error = %e, "scheduler tick error"),
                    }
                }
            }
        }
        tracing::info!(target: "ingest", "scheduler stopped");
    });
    SchedulerHandle {
        stop: Some(stop_tx),
        join: Some(join),
    }
}
