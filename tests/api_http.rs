// tests/api_http.rs
//
// HTTP-level tests for the public API Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::json;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    Router,
};
use tower::ServiceExt as _; // for `oneshot`

use lead_ingest::api::{router, AppState};
use lead_ingest::ingest::transport::{Transports, UnconfiguredFileTransfer};
use lead_ingest::ingest::types::{HttpFetcher, HttpResponse};
use lead_ingest::store::MemoryStore;
use lead_ingest::LeadService;

const BODY_LIMIT: usize = 1024 * 1024;

struct FixedCsv;

#[async_trait]
impl HttpFetcher for FixedCsv {
    async fn get(&self, url: &str, _headers: &BTreeMap<String, String>) -> Result<HttpResponse> {
        if url.contains("down") {
            return Ok(HttpResponse { status: 500, body: String::new() });
        }
        Ok(HttpResponse {
            status: 200,
            body: "Name,Street,City,State,Zip\nAnn Lee,1 Main,Avon,OH,44011\n".into(),
        })
    }
}

fn test_router() -> Router {
    let service = LeadService::new(
        Arc::new(MemoryStore::new()),
        Transports::new(Arc::new(FixedCsv), Arc::new(UnconfiguredFileTransfer)),
        5000,
    );
    router(AppState::new(Arc::new(service)))
}

fn mapping() -> Json {
    json!({"fullName": "Name", "street": "Street", "city": "City", "state": "State", "zip": "Zip"})
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, String) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string())),
        None => builder.body(Body::empty()),
    }
    .expect("build request");

    let resp = app.clone().oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    (status, String::from_utf8(bytes).expect("utf8"))
}

async fn send_json(app: &Router, method: &str, uri: &str, body: Option<Json>) -> (StatusCode, Json) {
    let (status, text) = send(app, method, uri, body).await;
    let v = serde_json::from_str(&text).unwrap_or(Json::Null);
    (status, v)
}

#[tokio::test]
async fn health_reports_ok() {
    let app = test_router();
    let (status, v) = send_json(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["ok"], true);
    assert_eq!(v["service"], "lead-ingest");
}

#[tokio::test]
async fn invalid_connector_is_rejected_with_400() {
    let app = test_router();
    let (status, v) = send_json(
        &app,
        "POST",
        "/api/connectors",
        Some(json!({"name": "X", "type": "ftp", "config": {}, "mapping": mapping()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["kind"], "config");
    assert_eq!(v["error"], "type must be csv_url, api_json, or sftp_csv");

    let mut partial = mapping();
    partial.as_object_mut().unwrap().remove("zip");
    let (status, v) = send_json(
        &app,
        "POST",
        "/api/connectors",
        Some(json!({"name": "X", "type": "csv_url", "config": {"url": "https://x"}, "mapping": partial})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "missing mapping for zip");

    let (_, list) = send_json(&app, "GET", "/api/connectors", None).await;
    assert_eq!(list["items"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn connector_lifecycle_over_http() {
    let app = test_router();
    let (status, created) = send_json(
        &app,
        "POST",
        "/api/connectors",
        Some(json!({"name": "Vendor", "type": "csv_url", "config": {"url": "https://v.test/a.csv"},
                    "mapping": mapping(), "scheduleMinutes": 30})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["type"], "csv_url");
    assert_eq!(created["config"]["url"], "https://v.test/a.csv");
    assert_eq!(created["lastRunStatus"], "none");
    let id = created["id"].as_str().unwrap().to_string();

    let (status, run) = send_json(&app, "POST", &format!("/api/connectors/{id}/run"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(run["ok"], true);
    assert_eq!(run["imported"], 1);

    let (status, patched) = send_json(
        &app,
        "PATCH",
        &format!("/api/connectors/{id}"),
        Some(json!({"name": "Renamed", "enabled": false})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["name"], "Renamed");
    assert_eq!(patched["enabled"], false);
    assert_eq!(patched["lastRunStatus"], "ok");
    assert_eq!(patched["lastRunSummary"]["trigger"], "manual");

    let (status, _) = send_json(&app, "DELETE", &format!("/api/connectors/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, v) = send_json(&app, "DELETE", &format!("/api/connectors/{id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(v["kind"], "not_found");
}

#[tokio::test]
async fn failing_source_maps_to_502_and_unknown_run_to_404() {
    let app = test_router();
    let (_, created) = send_json(
        &app,
        "POST",
        "/api/connectors",
        Some(json!({"name": "Down", "type": "csv_url", "config": {"url": "https://down.test"},
                    "mapping": mapping()})),
    )
    .await;
    let id = created["id"].as_str().unwrap();

    let (status, v) = send_json(&app, "POST", &format!("/api/connectors/{id}/run"), None).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(v["error"], "HTTP 500");

    let (status, _) = send_json(&app, "POST", "/api/connectors/missing/run", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn import_query_export_and_mark_mailed() {
    let app = test_router();
    let csv = "Name,Street,City,State,Zip,County\n\
Ann Lee,1 Main,Avon,oh,44011,Lorain\n\
Bo Ray,2 Oak,Erie,pa,16501,Erie\n\
Bo Ray,2 Oak,Erie,PA,16501,Erie\n\
,3 Elm,Avon,OH,44011,Lorain\n";

    let (status, r) = send_json(
        &app,
        "POST",
        "/api/leads/import-csv",
        Some(json!({"csvText": csv, "mapping": {
            "fullName": "Name", "street": "Street", "city": "City",
            "state": "State", "zip": "Zip", "county": "County"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(r["ok"], true);
    assert_eq!((r["fetched"].as_u64(), r["imported"].as_u64()), (Some(4), Some(2)));
    assert_eq!((r["duplicates"].as_u64(), r["invalid"].as_u64()), (Some(1), Some(1)));

    let (status, page) = send_json(&app, "GET", "/api/leads?state=OH&batchSize=abc", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["totalStored"], 2);
    assert_eq!(page["totalFiltered"], 1);
    assert_eq!(page["batchSize"], 5000);
    assert_eq!(page["items"][0]["provider"], "Manual Import");
    assert_eq!(page["items"][0]["connectorId"], "manual-import");
    let ann_id = page["items"][0]["id"].as_str().unwrap().to_string();

    let (status, body) = send(&app, "GET", "/api/leads/export.csv?county=erie", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut lines = body.lines();
    assert_eq!(
        lines.next().unwrap(),
        "Full Name,Street,Unit,City,State,ZIP,County,Phone,DOB,Age,Provider,Stage,Imported At"
    );
    assert!(lines.next().unwrap().starts_with("Bo Ray,2 Oak,,Erie,PA,16501,Erie,,,,Manual Import,READY,"));
    assert!(lines.next().is_none());

    let (status, v) = send_json(
        &app,
        "POST",
        "/api/leads/mark-mailed",
        Some(json!({"leadIds": [ann_id, "nope"]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(v["updated"], 1);
    // Already MAILED: nothing changes the second time.
    let (_, v) = send_json(&app, "POST", "/api/leads/mark-mailed", Some(json!({"leadIds": [ann_id]}))).await;
    assert_eq!(v["updated"], 0);

    let (_, mailed) = send_json(&app, "GET", "/api/leads?stage=MAILED", None).await;
    assert_eq!(mailed["totalFiltered"], 1);
    assert_eq!(mailed["items"][0]["fullName"], "Ann Lee");

    let (status, _) = send_json(&app, "POST", "/api/leads/mark-mailed", Some(json!({"leadIds": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn export_content_type_is_csv() {
    let app = test_router();
    let req = Request::builder()
        .uri("/api/leads/export.csv")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let ct = resp.headers().get(header::CONTENT_TYPE).unwrap().to_str().unwrap();
    assert!(ct.starts_with("text/csv"));
}

#[tokio::test]
async fn import_without_text_is_rejected() {
    let app = test_router();
    let (status, v) = send_json(
        &app,
        "POST",
        "/api/leads/import-csv",
        Some(json!({"csvText": "   ", "mapping": mapping()})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["error"], "csvText is required");
}

#[tokio::test]
async fn malformed_bodies_are_config_errors() {
    let app = test_router();
    let (status, v) = send_json(
        &app,
        "POST",
        "/api/connectors",
        Some(json!({"name": "X", "type": "csv_url", "config": {"url": "https://x"},
                    "mapping": mapping(), "scheduleMinutes": "30"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(v["kind"], "config");
    assert!(v["error"].as_str().unwrap().contains("scheduleMinutes"), "{v}");

    // Not JSON at all, and no content type.
    let req = Request::builder()
        .method("POST")
        .uri("/api/leads/mark-mailed")
        .body(Body::from("leadIds=1"))
        .unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT).await.unwrap();
    let v: Json = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(v["kind"], "config");
}
