mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use statescout::{InteractiveSession, SessionStore, SESSION_VERSION};

use common::{fast_config, filter_app, APP_URL};

#[tokio::test]
async fn test_save_load_resume_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));

    let session = InteractiveSession::start(Arc::new(filter_app()), fast_config(), APP_URL)
        .await
        .unwrap();
    session.execute_action("action_0").await.unwrap();

    let mut snapshot = session.to_session();
    store.save(&mut snapshot).unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.version, SESSION_VERSION);
    assert_eq!(loaded.id, snapshot.id);
    assert_eq!(loaded.app_url, APP_URL);
    assert_eq!(loaded.current_state_id.as_deref(), Some("state_002"));
    assert_eq!(loaded.entry_state_id.as_deref(), Some("state_001"));
    assert_eq!(loaded.state_graph.states.len(), 2);
    assert_eq!(loaded.state_graph.transitions.len(), 1);
    assert_eq!(loaded.exploration_history.len(), 1);

    // Resuming replays the recorded path back to the persisted cursor.
    let resumed = InteractiveSession::resume(Arc::new(filter_app()), fast_config(), loaded)
        .await
        .unwrap();
    assert_eq!(resumed.current_state().unwrap().id, "state_002");
    assert_eq!(resumed.graph_snapshot().states.len(), 2);
    // The explored flag survives the reload.
    resumed.go_to_root().await.unwrap();
    assert!(resumed.available_actions()[0].is_explored);
}

#[tokio::test]
async fn test_each_save_refreshes_last_updated_at() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));

    let session = InteractiveSession::start(Arc::new(filter_app()), fast_config(), APP_URL)
        .await
        .unwrap();

    store.save(&mut session.to_session()).unwrap();
    let first = store.load().unwrap().last_updated_at;

    tokio::time::sleep(Duration::from_millis(10)).await;
    store.save(&mut session.to_session()).unwrap();
    let second = store.load().unwrap().last_updated_at;

    assert!(second > first);
}

#[tokio::test]
async fn test_resume_migrated_unversioned_session() {
    let dir = tempfile::tempdir().unwrap();
    let store = SessionStore::new(dir.path().join("session.json"));

    // Minimal pre-versioned payload: URL only, no graph.
    std::fs::write(
        store.path(),
        json!({ "appUrl": APP_URL }).to_string(),
    )
    .unwrap();

    let loaded = store.load().unwrap();
    assert_eq!(loaded.version, SESSION_VERSION);

    let resumed = InteractiveSession::resume(Arc::new(filter_app()), fast_config(), loaded)
        .await
        .unwrap();
    assert_eq!(resumed.current_state().unwrap().id, "state_001");
    assert_eq!(resumed.available_actions().len(), 2);
}
