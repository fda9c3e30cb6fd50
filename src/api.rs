use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;

use crate::error::IngestError;
use crate::ingest::scheduler::SchedulerHandle;
use crate::model::ConnectorDraft;
use crate::query::{LeadCriteria, STAGE_ALL};
use crate::service::{CsvImportRequest, LeadQuery, LeadService};

pub const SERVICE_NAME: &str = "lead-ingest";

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<LeadService>,
    /// Keeps the scheduler alive for as long as the router is.
    pub scheduler: Option<Arc<SchedulerHandle>>,
}

impl AppState {
    pub fn new(service: Arc<LeadService>) -> Self {
        Self {
            service,
            scheduler: None,
        }
    }

    pub fn with_scheduler(mut self, handle: SchedulerHandle) -> Self {
        self.scheduler = Some(Arc::new(handle));
        self
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/connectors", get(list_connectors).post(create_connector))
        .route(
            "/api/connectors/{id}",
            patch(update_connector).delete(delete_connector),
        )
        .route("/api/connectors/{id}/run", post(run_connector))
        .route("/api/leads", get(query_leads))
        .route("/api/leads/export.csv", get(export_leads))
        .route("/api/leads/mark-mailed", post(mark_mailed))
        .route("/api/leads/import-csv", post(import_csv))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ---- errors ----

pub struct ApiError(IngestError);

impl From<IngestError> for ApiError {
    fn from(e: IngestError) -> Self {
        ApiError(e)
    }
}

/// Malformed or mistyped request bodies are configuration errors too.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(IngestError::config(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let status = match kind {
            crate::error::ErrorKind::Config => StatusCode::BAD_REQUEST,
            crate::error::ErrorKind::NotFound => StatusCode::NOT_FOUND,
            crate::error::ErrorKind::AlreadyRunning => StatusCode::CONFLICT,
            crate::error::ErrorKind::Transport | crate::error::ErrorKind::Decode => {
                StatusCode::BAD_GATEWAY
            }
            crate::error::ErrorKind::Storage => {
                tracing::error!(error = ?self.0, "storage failure");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = serde_json::json!({ "error": self.0.to_string(), "kind": kind });
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ---- handlers ----

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "ok": true,
        "service": SERVICE_NAME,
        "now": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn list_connectors(State(state): State<AppState>) -> ApiResult<Json<serde_json::Value>> {
    let items = state.service.list_connectors().await?;
    Ok(Json(serde_json::json!({ "items": items })))
}

async fn create_connector(
    State(state): State<AppState>,
    draft: Result<Json<ConnectorDraft>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(draft) = draft?;
    let connector = state.service.create_connector(draft).await?;
    Ok((StatusCode::CREATED, Json(connector)).into_response())
}

async fn update_connector(
    State(state): State<AppState>,
    Path(id): Path<String>,
    patch: Result<Json<ConnectorDraft>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(patch) = patch?;
    let connector = state.service.update_connector(&id, patch).await?;
    Ok(Json(connector).into_response())
}

async fn delete_connector(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    state.service.delete_connector(&id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

async fn run_connector(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let report = state.service.run_connector(&id).await?;
    let mut body = serde_json::to_value(&report).unwrap_or_default();
    if let Some(obj) = body.as_object_mut() {
        obj.insert("ok".into(), serde_json::Value::Bool(true));
    }
    Ok(Json(body))
}

/// Parse query parameters leniently: bad numbers fall back to defaults.
fn lead_query_from_params(q: &HashMap<String, String>) -> LeadQuery {
    let text = |k: &str| q.get(k).map(|v| v.trim().to_string()).unwrap_or_default();
    let num = |k: &str| q.get(k).and_then(|v| v.trim().parse::<i64>().ok());

    let stage = text("stage");
    LeadQuery {
        criteria: LeadCriteria {
            stage: if stage.is_empty() { STAGE_ALL.to_string() } else { stage },
            state: text("state"),
            county: text("county"),
            zip_prefix: text("zipPrefix"),
            min_age: num("minAge").and_then(|v| i32::try_from(v).ok()),
            max_age: num("maxAge").and_then(|v| i32::try_from(v).ok()),
        },
        batch_size: num("batchSize").map(|v| usize::try_from(v).unwrap_or(1)),
        batch_number: num("batchNumber").map(|v| usize::try_from(v).unwrap_or(1)),
    }
}

async fn query_leads(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let page = state
        .service
        .query_leads(&lead_query_from_params(&params))
        .await?;
    Ok(Json(page).into_response())
}

async fn export_leads(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> ApiResult<Response> {
    let csv = state
        .service
        .export_leads(&lead_query_from_params(&params))
        .await?;
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8")], csv).into_response())
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct MarkMailedReq {
    #[serde(default)]
    lead_ids: Vec<String>,
}

async fn mark_mailed(
    State(state): State<AppState>,
    body: Result<Json<MarkMailedReq>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(body) = body?;
    let updated = state.service.mark_mailed(&body.lead_ids).await?;
    Ok(Json(serde_json::json!({ "ok": true, "updated": updated })))
}

async fn import_csv(
    State(state): State<AppState>,
    body: Result<Json<CsvImportRequest>, JsonRejection>,
) -> ApiResult<Json<serde_json::Value>> {
    let Json(body) = body?;
    let report = state.service.import_csv(body).await?;
    let mut out = serde_json::to_value(&report).unwrap_or_default();
    if let Some(obj) = out.as_object_mut() {
        obj.insert("ok".into(), serde_json::Value::Bool(true));
    }
    Ok(Json(out))
}
