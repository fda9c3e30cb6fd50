// src/lib.rs
// Public library surface for the service binary and integration tests.

pub mod api;
pub mod csv_codec;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod normalize;
pub mod query;
pub mod service;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::api::router;
pub use crate::error::{ErrorKind, IngestError};
pub use crate::ingest::config::AppConfig;
pub use crate::model::{Connector, Lead};
pub use crate::service::LeadService;

use std::sync::Arc;

use anyhow::Result;

use crate::ingest::scheduler::spawn_scheduler;
use crate::ingest::transport::Transports;
use crate::store::JsonFileStore;

/// Build the full application router from `cfg`: JSON-file store, default
/// transports, a running scheduler and (optionally) `/metrics`.
pub async fn app(cfg: &AppConfig) -> Result<axum::Router> {
    let store = JsonFileStore::new(&cfg.data_dir);
    store.ensure_files().await?;

    let service = Arc::new(LeadService::new(
        Arc::new(store),
        Transports::default(),
        cfg.default_batch_size,
    ));
    let scheduler = spawn_scheduler(service.runner(), cfg.tick_interval());
    let state = api::AppState::new(service).with_scheduler(scheduler);

    let mut router = api::router(state);
    if cfg.metrics_enabled {
        match crate::metrics::Metrics::init() {
            Ok(m) => router = router.merge(m.router()),
            Err(e) => tracing::warn!(error = ?e, "metrics disabled"),
        }
    }
    tracing::info!(
        data_dir = %cfg.data_dir.display(),
        tick_ms = cfg.tick_interval().as_millis() as u64,
        "lead ingest service ready"
    );
    Ok(router)
}
