//! Unit tests for `WsManager`.
//!
//! These exercise the connection registry directly, without performing any
//! HTTP upgrades.

use axum::extract::ws::Message;
use courier_api::ws::WsManager;

// ---------------------------------------------------------------------------
// Test: add/remove semantics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn new_manager_has_zero_connections() {
    let manager = WsManager::new();

    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn add_and_remove_track_connection_count() {
    let manager = WsManager::new();

    let _rx = manager
        .add("conn-1".to_string(), "conversation_7".to_string())
        .await;
    assert_eq!(manager.connection_count().await, 1);

    manager.remove("conn-1").await;
    assert_eq!(manager.connection_count().await, 0);
}

#[tokio::test]
async fn remove_unknown_id_is_noop() {
    let manager = WsManager::new();

    let _rx = manager
        .add("conn-1".to_string(), "conversation_7".to_string())
        .await;
    manager.remove("nonexistent").await;

    assert_eq!(manager.connection_count().await, 1);
}

// ---------------------------------------------------------------------------
// Test: per-topic counts
// ---------------------------------------------------------------------------

#[tokio::test]
async fn counts_connections_per_topic() {
    let manager = WsManager::new();

    let _a = manager.add("a".into(), "conversation_7".into()).await;
    let _b = manager.add("b".into(), "conversation_7".into()).await;
    let _c = manager.add("c".into(), "job_status_install".into()).await;

    assert_eq!(manager.topic_connection_count("conversation_7").await, 2);
    assert_eq!(manager.topic_connection_count("job_status_install").await, 1);
    assert_eq!(manager.topic_connection_count("conversation_8").await, 0);
}

// ---------------------------------------------------------------------------
// Test: control frames
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ping_all_reaches_every_connection() {
    let manager = WsManager::new();

    let mut rx1 = manager.add("a".into(), "conversation_1".into()).await;
    let mut rx2 = manager.add("b".into(), "job_status_fine_tune".into()).await;

    manager.ping_all().await;

    assert!(matches!(rx1.recv().await, Some(Message::Ping(_))));
    assert!(matches!(rx2.recv().await, Some(Message::Ping(_))));
}

#[tokio::test]
async fn shutdown_all_sends_close_and_clears() {
    let manager = WsManager::new();

    let mut rx = manager.add("a".into(), "conversation_1".into()).await;

    manager.shutdown_all().await;

    assert!(matches!(rx.recv().await, Some(Message::Close(None))));
    assert_eq!(manager.connection_count().await, 0);
    // The sender was dropped with the map entry.
    assert!(rx.recv().await.is_none());
}
