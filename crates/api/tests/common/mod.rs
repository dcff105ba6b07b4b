#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use courier_broker::testing::RecordingPublisher;
use courier_broker::QueueIntrospector;
use courier_core::signing::{self, Signer, SIGNATURE_HEADER};
use courier_db::memory::MemoryStore;
use courier_events::Broadcaster;
use courier_worker::ResultHandler;
use http_body_util::BodyExt;
use tower::ServiceExt;

use courier_api::config::ServerConfig;
use courier_api::engine::ingestion::IngestionProxy;
use courier_api::router::build_app_router;
use courier_api::state::AppState;
use courier_api::ws::WsManager;

pub const SIGNING_SECRET: &str = "test-signing-secret";

/// Nothing listens on the discard port.
pub const UNREACHABLE_URL: &str = "http://127.0.0.1:9";

/// Build a test `ServerConfig` with safe defaults.
///
/// Every upstream points at [`UNREACHABLE_URL`] unless `overrides` says
/// otherwise.
pub fn test_config(overrides: &[(&str, &str)]) -> ServerConfig {
    let mut vars: HashMap<String, String> = [
        ("HOST", "127.0.0.1"),
        ("PORT", "0"),
        ("DATABASE_URL", "postgres://unused/courier"),
        ("SIGNING_SECRET", SIGNING_SECRET),
        ("INGESTION_URL", "http://127.0.0.1:9/ingest"),
        ("INGESTION_API_KEY", "test-api-key"),
        ("INGESTION_TIMEOUT_SECS", "5"),
        ("AMQP_MANAGEMENT_URL", UNREACHABLE_URL),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in overrides {
        vars.insert(k.to_string(), v.to_string());
    }
    ServerConfig::from_lookup(move |key| vars.get(key).cloned()).unwrap()
}

/// The router plus handles on every test double behind it.
pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    pub broadcaster: Arc<Broadcaster>,
    pub signer: Signer,
}

impl TestApp {
    /// A fresh clone of the router for one `oneshot` call.
    pub fn app(&self) -> Router {
        self.router.clone()
    }
}

/// Build the full application router over in-memory doubles.
///
/// Uses the same [`build_app_router`] as `main.rs`, so tests exercise the
/// production middleware stack.
pub fn build_test_app() -> TestApp {
    build_test_app_with(test_config(&[]))
}

pub fn build_test_app_with(config: ServerConfig) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let publisher = Arc::new(RecordingPublisher::new());
    let broadcaster = Arc::new(Broadcaster::default());
    let signer = Signer::new(config.signing_secret.clone());

    let state = AppState {
        config: Arc::new(config.clone()),
        jobs: store.clone(),
        conversations: store.clone(),
        publisher: publisher.clone(),
        signer: Arc::new(signer.clone()),
        broadcaster: broadcaster.clone(),
        introspector: Arc::new(QueueIntrospector::from_config(&config.broker)),
        ingestion: Arc::new(IngestionProxy::new(&config.ingestion).unwrap()),
        results: Arc::new(ResultHandler::new(store.clone(), broadcaster.clone())),
        ws_manager: Arc::new(WsManager::new()),
    };

    TestApp {
        router: build_app_router(state, &config),
        store,
        publisher,
        broadcaster,
        signer,
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn spawn_server(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_vec(&body).unwrap()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST `body` with the given signature header value.
pub async fn post_with_signature(
    app: Router,
    uri: &str,
    body: &[u8],
    signature: &str,
) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json")
        .header(SIGNATURE_HEADER, signature)
        .body(Body::from(body.to_vec()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

/// POST `body` signed with `signer`.
pub async fn post_signed(
    app: Router,
    signer: &Signer,
    uri: &str,
    body: serde_json::Value,
) -> Response<Body> {
    let bytes = serde_json::to_vec(&body).unwrap();
    let signature = signer.sign(&bytes);
    post_with_signature(app, uri, &bytes, &signature).await
}

/// POST a job status report for `kind`/`job_id`, signed the way a worker
/// signs it.
pub async fn post_status(
    test: &TestApp,
    kind: &str,
    job_id: impl std::fmt::Display,
    body: serde_json::Value,
) -> Response<Body> {
    let job_id: i64 = job_id.to_string().parse().unwrap();
    let bytes = serde_json::to_vec(&body).unwrap();
    let signature = sign_status(&test.signer, kind, job_id, &bytes);
    post_with_signature(test.app(), &status_uri(kind, job_id), &bytes, &signature).await
}

pub fn sign_status(signer: &Signer, kind: &str, job_id: i64, body: &[u8]) -> String {
    signer.sign(&signing::status_webhook_input(kind, job_id, body))
}

pub fn status_uri(kind: &str, job_id: impl std::fmt::Display) -> String {
    format!("/api/v1/webhooks/{kind}/{job_id}/status")
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn install_payload() -> serde_json::Value {
    serde_json::json!({
        "name": "llama-3-8b",
        "source_path": "s3://models/llama-3-8b",
        "clinician_type_id": 2,
    })
}

pub fn fine_tune_payload() -> serde_json::Value {
    serde_json::json!({
        "name": "cardio-ft",
        "base_model_id": 4,
        "dataset_path": "s3://datasets/cardio.jsonl",
        "clinician_type_id": 2,
    })
}

/// Dispatch a job through the API and return its JSON representation.
pub async fn dispatch(test: &TestApp, kind: &str, payload: serde_json::Value) -> serde_json::Value {
    let response = post_json(test.app(), &format!("/api/v1/jobs/{kind}"), payload).await;
    assert_eq!(response.status(), axum::http::StatusCode::CREATED);
    body_json(response).await["data"].clone()
}
