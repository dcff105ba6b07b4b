//! HTTP-level tests for `GET /api/v1/queues/traffic` against a fake
//! management API.

mod common;

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::get as get_route;
use axum::{Json, Router};
use common::{body_json, build_test_app, build_test_app_with, get, spawn_server, test_config};

/// Management API stub that knows the default monitored queues.
fn management_api() -> Router {
    Router::new().route(
        "/api/queues/{vhost}/{name}",
        get_route(|Path((vhost, name)): Path<(String, String)>| async move {
            assert_eq!(vhost, "/");
            match name.as_str() {
                "model_install" => Ok(Json(serde_json::json!({
                    "messages_ready": 0,
                    "messages_unacknowledged": 0,
                    "consumers": 1,
                }))),
                "fine_tune" => Ok(Json(serde_json::json!({
                    "messages_ready": 3,
                    "messages_unacknowledged": 1,
                    "consumers": 1,
                }))),
                "inference_results" => Ok(Json(serde_json::json!({ "consumers": 0 }))),
                _ => Err(StatusCode::NOT_FOUND),
            }
        }),
    )
}

#[tokio::test]
async fn traffic_reports_each_monitored_queue() {
    let base = spawn_server(management_api()).await;
    let test = build_test_app_with(test_config(&[("AMQP_MANAGEMENT_URL", &base)]));

    let response = get(test.app(), "/api/v1/queues/traffic").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let queues = json["data"].as_array().unwrap();
    assert_eq!(queues.len(), 3);

    let fine_tune = queues.iter().find(|q| q["queue"] == "fine_tune").unwrap();
    assert_eq!(fine_tune["messages_ready"], 3);
    assert_eq!(fine_tune["messages_unacknowledged"], 1);

    let results = queues
        .iter()
        .find(|q| q["queue"] == "inference_results")
        .unwrap();
    assert_eq!(results["messages_ready"], 0);
    assert_eq!(results["consumers"], 0);
}

#[tokio::test]
async fn unknown_queue_returns_404() {
    let base = spawn_server(management_api()).await;
    let test = build_test_app_with(test_config(&[
        ("AMQP_MANAGEMENT_URL", &base),
        ("FINE_TUNE_QUEUE", "missing_queue"),
    ]));

    let response = get(test.app(), "/api/v1/queues/traffic").await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unreachable_broker_returns_502() {
    let test = build_test_app();

    let response = get(test.app(), "/api/v1/queues/traffic").await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_GATEWAY");
}
