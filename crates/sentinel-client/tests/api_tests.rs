//! Integration tests for the Sentinel client against an in-process fake API.
//!
//! Each test starts an Axum server on an ephemeral port that mimics the
//! inference and vault routes and records every request it receives.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};

use sentinel_client::{
    InferenceRequest, Policy, Sentinel, SentinelConfig, SentinelError, TokenHolder,
};

#[derive(Debug, Clone)]
struct Recorded {
    method: &'static str,
    path: String,
    authorization: Option<String>,
    body: Option<Value>,
}

#[derive(Clone, Default)]
struct FakeApi {
    log: Arc<Mutex<Vec<Recorded>>>,
}

impl FakeApi {
    fn record(&self, method: &'static str, path: String, headers: &HeaderMap, body: Option<Value>) {
        let authorization = headers
            .get("authorization")
            .map(|v| v.to_str().unwrap().to_owned());
        self.log.lock().unwrap().push(Recorded {
            method,
            path,
            authorization,
            body,
        });
    }

    fn requests(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }
}

fn error(status: StatusCode, detail: Value) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}

async fn inference(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    api.record("POST", "/api/v1/inference".to_owned(), &headers, Some(body.clone()));

    if headers
        .get("authorization")
        .is_some_and(|v| v.to_str().unwrap() == "Bearer expired")
    {
        return error(StatusCode::UNAUTHORIZED, json!("Invalid token"));
    }

    let input = body["input_text"].as_str().unwrap_or_default();
    if input.contains("boom") {
        return error(StatusCode::INTERNAL_SERVER_ERROR, json!("upstream model failure"));
    }
    if body["session_id"].as_str().is_some_and(|s| s.len() < 3) {
        return error(
            StatusCode::UNPROCESSABLE_ENTITY,
            json!([{
                "loc": ["body", "session_id"],
                "msg": "String should have at least 3 characters"
            }]),
        );
    }
    if input.contains("garbage") {
        return (StatusCode::OK, "not json").into_response();
    }
    if input.contains("SSN") {
        return Json(json!({
            "response": "Your SSN is <REDACTED>.",
            "secret_id": "sec-1",
            "leak_detected": true,
        }))
        .into_response();
    }
    Json(json!({ "response": "Hello.", "secret_id": null, "leak_detected": false })).into_response()
}

async fn secret(
    State(api): State<FakeApi>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    api.record("GET", format!("/api/v1/secret/{id}"), &headers, None);
    if headers.get("authorization").is_none() {
        return error(StatusCode::FORBIDDEN, json!("Access denied"));
    }
    if id != "sec-1" {
        return error(StatusCode::NOT_FOUND, json!("Secret not found"));
    }
    Json(json!({
        "secret_id": "sec-1",
        "session_id": "session-1",
        "owner_id": "user-42",
        "created_at": "2024-05-01T12:00:00.000001",
        "detector_metadata": { "labels": ["SSN"] },
        "mapping": {
            "<REDACTED>": { "label": "SSN", "original": "123-45-6789", "synthetic": "syn-0001" }
        }
    }))
    .into_response()
}

async fn healthz(State(api): State<FakeApi>, headers: HeaderMap) -> Json<Value> {
    api.record("GET", "/api/healthz".to_owned(), &headers, None);
    Json(json!({ "status": "ok" }))
}

async fn slow(State(_api): State<FakeApi>) -> Json<Value> {
    tokio::time::sleep(Duration::from_secs(5)).await;
    Json(json!({ "response": "late", "leak_detected": false }))
}

async fn spawn_api() -> (String, FakeApi) {
    spawn_with(Router::new().route("/api/v1/inference", post(inference))).await
}

async fn spawn_with(inference_route: Router<FakeApi>) -> (String, FakeApi) {
    let api = FakeApi::default();
    let app = inference_route
        .route("/api/v1/secret/{id}", get(secret))
        .route("/api/healthz", get(healthz))
        .with_state(api.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api"), api)
}

fn ssn_request() -> InferenceRequest {
    InferenceRequest {
        session_id: "session-1".to_owned(),
        input_text: "My SSN is 123-45-6789".to_owned(),
        policy: Policy::Default,
    }
}

// ── Inference ────────────────────────────────────────────────────────

#[tokio::test]
async fn inference_posts_payload_and_decodes_result() {
    let (url, api) = spawn_api().await;
    let tokens = TokenHolder::with_token(Some("jwt-abc".to_owned()));
    let client = Sentinel::new(url, tokens).unwrap();

    let result = client.run_inference(&ssn_request()).await.unwrap();
    assert_eq!(result.response, "Your SSN is <REDACTED>.");
    assert_eq!(result.secret_id.as_deref(), Some("sec-1"));
    assert!(result.leak_detected);

    let reqs = api.requests();
    assert_eq!(reqs.len(), 1);
    assert_eq!(reqs[0].method, "POST");
    assert_eq!(reqs[0].path, "/api/v1/inference");
    assert_eq!(reqs[0].authorization.as_deref(), Some("Bearer jwt-abc"));
    let body = reqs[0].body.as_ref().unwrap();
    assert_eq!(body["session_id"], "session-1");
    assert_eq!(body["input_text"], "My SSN is 123-45-6789");
    assert_eq!(body["policy"], "default");
}

#[tokio::test]
async fn block_on_leak_policy_goes_over_the_wire() {
    let (url, api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let mut req = ssn_request();
    req.policy = Policy::BlockOnLeak;
    client.run_inference(&req).await.unwrap();
    assert_eq!(api.requests()[0].body.as_ref().unwrap()["policy"], "block-on-leak");
}

#[tokio::test]
async fn null_secret_id_is_none() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let mut req = ssn_request();
    req.input_text = "hello there".to_owned();
    let result = client.run_inference(&req).await.unwrap();
    assert_eq!(result.secret_id, None);
    assert!(!result.leak_detected);
}

// ── Token holder ─────────────────────────────────────────────────────

#[tokio::test]
async fn token_changes_apply_to_subsequent_requests() {
    let (url, api) = spawn_api().await;
    let tokens = TokenHolder::new();
    let client = Sentinel::new(url, tokens.clone()).unwrap();

    client.run_inference(&ssn_request()).await.unwrap();
    tokens.set("first");
    client.run_inference(&ssn_request()).await.unwrap();
    tokens.set("second");
    client.run_inference(&ssn_request()).await.unwrap();
    tokens.set("");
    client.run_inference(&ssn_request()).await.unwrap();

    let auth: Vec<Option<String>> = api.requests().into_iter().map(|r| r.authorization).collect();
    assert_eq!(
        auth,
        vec![
            None,
            Some("Bearer first".to_owned()),
            Some("Bearer second".to_owned()),
            None,
        ]
    );
}

// ── Error mapping ────────────────────────────────────────────────────

#[tokio::test]
async fn server_error_maps_to_api_error_with_detail() {
    let (url, api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let mut req = ssn_request();
    req.input_text = "boom".to_owned();

    let err = client.run_inference(&req).await.unwrap_err();
    match err {
        SentinelError::Api {
            status_code,
            message,
        } => {
            assert_eq!(status_code, 500);
            assert_eq!(message, "upstream model failure");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
    // No retry.
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn validation_errors_are_joined() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let mut req = ssn_request();
    req.session_id = "s".to_owned();

    let err = client.run_inference(&req).await.unwrap_err();
    assert_eq!(err.status_code(), Some(422));
    assert!(err.to_string().contains("at least 3 characters"), "{err}");
}

#[tokio::test]
async fn unauthorized_maps_to_auth_error() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, Some("expired".to_owned())).unwrap();
    let err = client.run_inference(&ssn_request()).await.unwrap_err();
    assert!(
        matches!(
            err,
            SentinelError::Auth { status_code: 401, ref message } if message == "Invalid token"
        ),
        "{err:?}"
    );
}

#[tokio::test]
async fn undecodable_success_body_is_json_error() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let mut req = ssn_request();
    req.input_text = "garbage".to_owned();
    let err = client.run_inference(&req).await.unwrap_err();
    assert!(matches!(err, SentinelError::Json(_)), "{err:?}");
}

#[tokio::test]
async fn unreachable_server_is_network_error() {
    let client = Sentinel::new("http://127.0.0.1:1/api", None::<String>).unwrap();
    let err = client.run_inference(&ssn_request()).await.unwrap_err();
    assert!(matches!(err, SentinelError::Network(_)), "{err:?}");
    assert_eq!(err.status_code(), None);
}

#[tokio::test]
async fn configured_timeout_maps_to_timeout_error() {
    let (url, _api) = spawn_with(Router::new().route("/api/v1/inference", post(slow))).await;
    let client = Sentinel::with_config(
        SentinelConfig {
            base_url: url,
            timeout: Some(Duration::from_millis(100)),
            ..Default::default()
        },
        None::<String>,
    )
    .unwrap();
    let err = client.run_inference(&ssn_request()).await.unwrap_err();
    assert!(matches!(err, SentinelError::Timeout), "{err:?}");
}

// ── Secret fetch ─────────────────────────────────────────────────────

#[tokio::test]
async fn fetch_secret_decodes_mapping() {
    let (url, api) = spawn_api().await;
    let client = Sentinel::new(url, Some("jwt".to_owned())).unwrap();

    let mapping = client.fetch_secret("sec-1").await.unwrap();
    assert_eq!(mapping.secret_id, "sec-1");
    assert_eq!(mapping.owner_id, "user-42");
    assert_eq!(mapping.labels(), vec!["SSN"]);
    let entry = &mapping.mapping["<REDACTED>"];
    assert_eq!(entry.synthetic, "syn-0001");
    assert_eq!(entry.original, "123-45-6789");
    assert_eq!(mapping.created_at.to_rfc3339(), "2024-05-01T12:00:00.000001+00:00");

    let reqs = api.requests();
    assert_eq!(reqs[0].path, "/api/v1/secret/sec-1");
    assert_eq!(reqs[0].authorization.as_deref(), Some("Bearer jwt"));
}

#[tokio::test]
async fn unknown_secret_is_not_found_without_retry() {
    let (url, api) = spawn_api().await;
    let client = Sentinel::new(url, Some("jwt".to_owned())).unwrap();

    let err = client.fetch_secret("sec-404").await.unwrap_err();
    match err {
        SentinelError::NotFound { resource, message } => {
            assert_eq!(resource, "sec-404");
            assert_eq!(message, "Secret not found");
        }
        other => panic!("expected NotFound, got {other:?}"),
    }
    assert_eq!(api.requests().len(), 1);
}

#[tokio::test]
async fn forbidden_secret_is_auth_error() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let err = client.fetch_secret("sec-1").await.unwrap_err();
    assert_eq!(err.status_code(), Some(403));
    assert!(matches!(err, SentinelError::Auth { .. }));
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_status() {
    let (url, _api) = spawn_api().await;
    let client = Sentinel::new(url, None::<String>).unwrap();
    let health = client.health().await;
    assert!(health.ok);
    assert_eq!(health.detail, "ok");
}

#[tokio::test]
async fn health_of_unreachable_server_is_not_ok() {
    let client = Sentinel::new("http://127.0.0.1:1/api", None::<String>).unwrap();
    let health = client.health().await;
    assert!(!health.ok);
    assert!(health.detail.contains("network"), "{}", health.detail);
}
