//! HTTP-level tests for ingestion jobs against a fake ingestion service.

mod common;

use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::post;
use axum::{Json, Router};
use common::{body_json, build_test_app, build_test_app_with, post_json, spawn_server, test_config};
use courier_db::JobStore;
use tokio::sync::Mutex;

/// Requests seen by the fake service: API key header and JSON body.
type Seen = Arc<Mutex<Vec<(Option<String>, serde_json::Value)>>>;

/// Start a fake ingestion service that answers every request with
/// `status` and `body`.
async fn ingestion_service(status: StatusCode, body: &'static str) -> (String, Seen) {
    let seen: Seen = Arc::default();
    let router = Router::new()
        .route(
            "/ingest",
            post(
                move |State(seen): State<Seen>, headers: HeaderMap, Json(req): Json<serde_json::Value>| async move {
                    let key = headers
                        .get("x-api-key")
                        .and_then(|v| v.to_str().ok())
                        .map(str::to_string);
                    seen.lock().await.push((key, req));
                    (status, body)
                },
            ),
        )
        .with_state(seen.clone());
    let base = spawn_server(router).await;
    (format!("{base}/ingest"), seen)
}

fn ingestion_payload() -> serde_json::Value {
    serde_json::json!({
        "file_references": ["s3://docs/guideline-1.pdf", "s3://docs/guideline-2.pdf"],
        "clinician_type_id": 3,
        "name": "cardiology-guidelines",
    })
}

#[tokio::test]
async fn successful_ingestion_completes_job_with_knowledge_base() {
    let (url, seen) = ingestion_service(StatusCode::OK, r#"{"chunks": 42}"#).await;
    let test = build_test_app_with(test_config(&[("INGESTION_URL", &url)]));

    let response = post_json(test.app(), "/api/v1/jobs/ingestion", ingestion_payload()).await;

    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "done");
    let resource_id = json["data"]["derived_resource_id"].as_i64().unwrap();

    let resource = test.store.find_resource(resource_id).await.unwrap().unwrap();
    assert_eq!(resource.resource_kind, "knowledge_base");
    assert_eq!(resource.name, "cardiology-guidelines");
    assert_eq!(resource.attributes["chunks"], 42);
    assert_eq!(resource.attributes["clinician_type_id"], 3);

    let seen = seen.lock().await;
    assert_eq!(seen.len(), 1);
    let (key, body) = &seen[0];
    assert_eq!(key.as_deref(), Some("test-api-key"));
    assert_eq!(body["job_id"], json["data"]["id"]);
    assert_eq!(body["clinician_type_id"], 3);
    assert_eq!(body["file_references"].as_array().unwrap().len(), 2);

    assert!(test.publisher.published().await.is_empty());
}

#[tokio::test]
async fn rejected_ingestion_fails_with_response_body() {
    let (url, _seen) =
        ingestion_service(StatusCode::UNPROCESSABLE_ENTITY, "unsupported file type").await;
    let test = build_test_app_with(test_config(&[("INGESTION_URL", &url)]));

    let response = post_json(test.app(), "/api/v1/jobs/ingestion", ingestion_payload()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["error"], "unsupported file type");

    let job = test
        .store
        .find_job(json["job_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status.as_str(), "failed");
    assert_eq!(job.error_message.as_deref(), Some("unsupported file type"));
    assert_eq!(test.store.resource_count().await, 0);
}

#[tokio::test]
async fn unrecordable_success_fails_job_instead_of_leaving_it_running() {
    let (url, _seen) = ingestion_service(StatusCode::OK, r#"{"chunks": 42}"#).await;
    let test = build_test_app_with(test_config(&[("INGESTION_URL", &url)]));
    test.store.fail_completions(true);

    let response = post_json(test.app(), "/api/v1/jobs/ingestion", ingestion_payload()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "DISPATCH_FAILED");
    let job = test
        .store
        .find_job(json["job_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status.as_str(), "failed");
    assert!(job
        .error_message
        .is_some_and(|m| m.starts_with("Failed to record ingestion result")));
    assert_eq!(job.derived_resource_id, None);
    assert_eq!(test.store.resource_count().await, 0);
}

#[tokio::test]
async fn unreachable_service_fails_job_from_pending() {
    let test = build_test_app();

    let response = post_json(test.app(), "/api/v1/jobs/ingestion", ingestion_payload()).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    let job = test
        .store
        .find_job(json["job_id"].as_i64().unwrap())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(job.status.as_str(), "failed");
    assert!(job
        .error_message
        .is_some_and(|m| m.starts_with("Ingestion service unreachable")));
}

#[tokio::test]
async fn empty_file_list_is_rejected_before_calling_service() {
    let (url, seen) = ingestion_service(StatusCode::OK, "{}").await;
    let test = build_test_app_with(test_config(&[("INGESTION_URL", &url)]));

    let response = post_json(
        test.app(),
        "/api/v1/jobs/ingestion",
        serde_json::json!({ "file_references": [], "clinician_type_id": 3 }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(seen.lock().await.is_empty());
}
