mod common;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use statescout::browser::mock::{MockBrowser, MockBrowserConfig};
use statescout::model::AppState;
use statescout::{ExploreError, InteractiveSession, PageSnapshot, SessionEvent};

use common::{button, fast_config, filter_app, APP_URL};

async fn started(driver: Arc<MockBrowser>) -> InteractiveSession {
    InteractiveSession::start(driver, fast_config(), APP_URL)
        .await
        .unwrap()
}

#[tokio::test]
async fn test_execute_action_discovers_new_state() {
    let session = started(Arc::new(filter_app())).await;

    let actions = session.available_actions();
    assert_eq!(actions.len(), 2);
    assert_eq!(actions[0].action.element_label, "Active");
    assert!(!actions[0].is_explored);

    let outcome = session.execute_action("action_0").await.unwrap();
    assert_eq!(outcome.previous_state_id, "state_001");
    assert_eq!(outcome.new_state_id, "state_002");
    assert!(outcome.is_new_state);

    assert_eq!(session.current_state().unwrap().id, "state_002");
    assert_eq!(session.path_from_root(), vec!["state_001", "state_002"]);

    let graph = session.graph_snapshot();
    assert_eq!(graph.states.len(), 2);
    assert_eq!(graph.transitions.len(), 1);
    assert_eq!(graph.transitions[0].from_state_id, "state_001");
    assert_eq!(graph.transitions[0].to_state_id, "state_002");
}

#[tokio::test]
async fn test_repeating_an_action_adds_no_second_edge() {
    let session = started(Arc::new(filter_app())).await;

    session.execute_action("action_0").await.unwrap();
    session.go_to_root().await.unwrap();

    let outcome = session.execute_action("action_0").await.unwrap();
    assert_eq!(outcome.new_state_id, "state_002");
    assert!(!outcome.is_new_state);

    let graph = session.graph_snapshot();
    assert_eq!(graph.states.len(), 2);
    assert_eq!(graph.transitions.len(), 1);
}

#[tokio::test]
async fn test_explored_flag_and_result_state_survive_reset() {
    let session = started(Arc::new(filter_app())).await;
    session.execute_action("action_0").await.unwrap();
    session.go_to_root().await.unwrap();

    let actions = session.available_actions();
    assert!(actions[0].is_explored);
    assert_eq!(actions[0].result_state_id.as_deref(), Some("state_002"));
    assert!(!actions[1].is_explored);
    assert_eq!(actions[1].result_state_id, None);
}

#[tokio::test]
async fn test_skip_is_bookkeeping_only() {
    let session = started(Arc::new(filter_app())).await;

    session.skip_action("state_001", "action_1").unwrap();
    assert!(session.available_actions()[1].is_skipped);

    // A skipped action can still be executed explicitly.
    let outcome = session.execute_action("action_1").await.unwrap();
    assert_eq!(outcome.new_state_id, "state_001");

    session.unskip_action("state_001", "action_1").unwrap();
    assert!(!session.available_actions()[1].is_skipped);
}

#[tokio::test]
async fn test_jump_replays_shortest_path() {
    let driver = Arc::new(filter_app());
    let session = started(driver.clone()).await;

    session.execute_action("action_0").await.unwrap();
    session.go_to_root().await.unwrap();
    assert_eq!(session.current_state().unwrap().id, "state_001");

    session.jump_to_state("state_002").await.unwrap();
    assert_eq!(session.current_state().unwrap().id, "state_002");
    assert_eq!(session.path_from_root(), vec!["state_001", "state_002"]);
    assert_eq!(driver.current_page().as_deref(), Some("active"));
}

#[tokio::test]
async fn test_jump_to_entry_replays_nothing() {
    let driver = Arc::new(filter_app());
    let session = started(driver.clone()).await;
    session.execute_action("action_0").await.unwrap();
    let executed_before = driver.executed_actions().len();

    session.jump_to_state("state_001").await.unwrap();
    assert_eq!(session.current_state().unwrap().id, "state_001");
    assert_eq!(driver.executed_actions().len(), executed_before);
}

#[tokio::test]
async fn test_jump_failures_leave_cursor_unchanged() {
    let session = started(Arc::new(filter_app())).await;
    let mut persisted = session.to_session();
    // A state that exists in the graph but has no inbound transition.
    persisted.state_graph.states.push(AppState {
        id: "state_099".to_string(),
        url: APP_URL.to_string(),
        dom_hash: "deadbeefdeadbeef".to_string(),
        description: "orphan".to_string(),
        elements: Vec::new(),
        timestamp: Utc::now(),
    });

    let resumed = InteractiveSession::resume(Arc::new(filter_app()), fast_config(), persisted)
        .await
        .unwrap();
    assert_eq!(resumed.current_state().unwrap().id, "state_001");

    let err = resumed.jump_to_state("state_099").await.unwrap_err();
    assert!(matches!(err, ExploreError::PathNotFound { .. }));
    assert_eq!(resumed.current_state().unwrap().id, "state_001");

    let err = resumed.jump_to_state("state_404").await.unwrap_err();
    assert!(matches!(err, ExploreError::UnknownState { .. }));
    assert_eq!(resumed.current_state().unwrap().id, "state_001");
}

#[tokio::test]
async fn test_jump_falls_back_to_alternate_recorded_path() {
    /// Two recorded routes to the same goal state: a one-hop shortcut
    /// and a two-hop detour.
    fn detour_app() -> MockBrowser {
        let home = PageSnapshot::new(APP_URL, "home")
            .with_elements(vec![button("direct", "Direct"), button("via", "Via")]);
        let mid = PageSnapshot::new(APP_URL, "mid").with_elements(vec![button("next", "Next")]);
        let goal = PageSnapshot::new(APP_URL, "goal").with_list_items(7);
        MockBrowser::new()
            .with_page("home", home)
            .with_page("mid", mid)
            .with_page("goal", goal)
            .with_route("home", "click|#direct", "goal")
            .with_route("home", "click|#via", "mid")
            .with_route("mid", "click|#next", "goal")
    }

    // Record both routes to the goal state, then persist.
    let session = started(Arc::new(detour_app())).await;
    session.execute_action("action_0").await.unwrap(); // #direct -> goal
    session.go_to_root().await.unwrap();
    session.execute_action("action_1").await.unwrap(); // #via -> mid
    session.execute_action("action_0").await.unwrap(); // #next -> goal
    session.go_to_root().await.unwrap();
    let persisted = session.to_session();

    // Same app, but the one-hop shortcut is now broken.
    let driver = Arc::new(
        detour_app().with_config(MockBrowserConfig::default().failing_selector("#direct")),
    );
    let resumed = InteractiveSession::resume(driver.clone(), fast_config(), persisted)
        .await
        .unwrap();

    resumed.jump_to_state("state_002").await.unwrap();
    assert_eq!(resumed.current_state().unwrap().id, "state_002");
    assert_eq!(driver.current_page().as_deref(), Some("goal"));
}

#[tokio::test]
async fn test_concurrent_mutation_fails_fast() {
    let driver = filter_app()
        .with_config(MockBrowserConfig::default().stalling_selector("#filter-active"));
    let session = Arc::new(
        InteractiveSession::start(
            Arc::new(driver),
            fast_config().with_action_timeout(Duration::from_millis(200)),
            APP_URL,
        )
        .await
        .unwrap(),
    );

    let stalled = {
        let session = session.clone();
        tokio::spawn(async move { session.execute_action("action_0").await })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;

    // Second mutation while the first holds the lock: rejected, not queued.
    let err = session.execute_action("action_1").await.unwrap_err();
    assert!(matches!(err, ExploreError::ExecutionInProgress));

    let err = stalled.await.unwrap().unwrap_err();
    assert!(matches!(err, ExploreError::ActionTimeout { .. }));

    // Lock released after the failure.
    session.execute_action("action_1").await.unwrap();
}

#[tokio::test]
async fn test_events_broadcast_on_new_state() {
    let session = started(Arc::new(filter_app())).await;
    let mut events = session.subscribe();

    session.execute_action("action_0").await.unwrap();
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::GraphChanged
    ));
    assert!(matches!(
        events.recv().await.unwrap(),
        SessionEvent::StateChanged
    ));
}

#[tokio::test]
async fn test_unknown_action_id_is_rejected() {
    let session = started(Arc::new(filter_app())).await;
    let err = session.execute_action("action_42").await.unwrap_err();
    assert!(matches!(err, ExploreError::UnknownAction { .. }));
}

#[tokio::test]
async fn test_resume_without_entry_behaves_like_fresh_start() {
    let session = started(Arc::new(filter_app())).await;
    let mut persisted = session.to_session();
    persisted.state_graph = Default::default();
    persisted.current_state_id = None;
    persisted.entry_state_id = None;

    let resumed = InteractiveSession::resume(Arc::new(filter_app()), fast_config(), persisted)
        .await
        .unwrap();
    assert_eq!(resumed.current_state().unwrap().id, "state_001");
    assert_eq!(resumed.available_actions().len(), 2);
}

#[tokio::test]
async fn test_start_fails_on_unreachable_app() {
    let driver = MockBrowser::new()
        .with_page("home", PageSnapshot::new(APP_URL, "home").with_elements(vec![button("go", "Go")]))
        .with_config(MockBrowserConfig::default().failing_navigation());
    let err = InteractiveSession::start(Arc::new(driver), fast_config(), APP_URL)
        .await
        .unwrap_err();
    assert!(matches!(err, ExploreError::NavigationFailure { .. }));
}
