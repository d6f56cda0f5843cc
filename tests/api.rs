use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use marquee::application::contract::Contracts;
use marquee::infra::gateway::Gateway;
use marquee::infra::http::{self, ApiState, REQUEST_ID_HEADER};
use marquee::infra::ledger::{EventQueue, MemoryLedger};
use serde_json::{Value, json};
use tower::ServiceExt;

fn router() -> Router {
    let ledger = MemoryLedger::in_memory(Arc::new(EventQueue::new()));
    let gateway = Gateway::new(Arc::new(ledger), Contracts::default());
    http::build_router(ApiState::new(gateway, 50))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(payload) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(payload.to_string())
        }
        None => Body::empty(),
    };
    let request = builder.body(body).expect("request should build");

    let response = app
        .clone()
        .oneshot(request)
        .await
        .expect("router should respond");
    let status = response.status();
    assert!(response.headers().contains_key(REQUEST_ID_HEADER));

    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body should collect")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("body should be json")
    };
    (status, value)
}

fn submit_body(catalog_id: &str) -> Value {
    json!({
        "args": [catalog_id, "Inception", "Nolan", "2010", "[\"Sci-Fi\"]", "", "alice", "", "abc123"]
    })
}

#[tokio::test]
async fn invoke_commits_and_returns_the_envelope() {
    let app = router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/content/SubmitContentRequest",
        Some(submit_body("tt1375666")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["committed"], true);
    assert_eq!(body["result"]["success"], true);
    assert_eq!(body["result"]["txn_id"], body["tx_id"]);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/content/GetContentRequest",
        Some(json!({ "args": ["tt1375666"] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["result"]["status"], "pending_review");
}

#[tokio::test]
async fn refused_envelopes_are_reported_but_not_committed() {
    let app = router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/content/SubmitContentRequest",
        Some(submit_body("not-an-id")),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["committed"], false);
    assert_eq!(body["result"]["success"], false);

    let (_, health) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(health["height"], 0);
}

#[tokio::test]
async fn contract_errors_map_to_http_statuses() {
    let app = router();

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/entries/GetEntry",
        Some(json!({ "args": ["missing", "films"] })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
    assert!(body["error"]["hint"].as_str().unwrap().contains("missing"));

    let (status, body) = send(&app, Method::POST, "/api/v1/entries/Explode", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "unknown_operation");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/ratings/SubmitRating",
        Some(json!({ "args": ["r1", "e1", "films", "bob", "9"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["error"]["fields"][0]["field"], "rating");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/content/QueryAllCatalogEntries",
        Some(json!({ "args": ["10", "***"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/entries/CreateEntry",
        Some(json!({ "args": ["e1", "films", "", "", "", "", ""] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["error"]["fields"][0]["field"], "title");

    let create = json!({ "args": ["e1", "films", "Heat", "", "", "alice", ""] });
    let (status, _) = send(&app, Method::POST, "/api/v1/entries/CreateEntry", Some(create.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, Method::POST, "/api/v1/entries/CreateEntry", Some(create)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "duplicate");
}

#[tokio::test]
async fn events_drain_in_commit_order() {
    let app = router();
    for rating_id in ["r1", "r2"] {
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/v1/ratings/SubmitRating",
            Some(json!({ "args": [rating_id, "e1", "films", rating_id, "4"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = send(&app, Method::GET, "/api/v1/events?limit=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["events"].as_array().unwrap().len(), 1);
    assert_eq!(body["events"][0]["name"], "RatingSubmitted");
    assert_eq!(body["events"][0]["payload"]["rating_id"], "r1");
    assert_eq!(body["remaining"], 1);

    let (_, body) = send(&app, Method::GET, "/api/v1/events", None).await;
    assert_eq!(body["events"][0]["payload"]["rating_id"], "r2");
    assert_eq!(body["remaining"], 0);
}

#[tokio::test]
async fn health_reports_ledger_height() {
    let app = router();
    send(
        &app,
        Method::POST,
        "/api/v1/content/SubmitContentRequest",
        Some(submit_body("tt1375666")),
    )
    .await;

    let (status, body) = send(&app, Method::GET, "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["height"], 1);
    assert_eq!(body["pending_events"], 1);
}
