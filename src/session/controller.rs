//! Interactive session controller.
//!
//! The manually-steppable counterpart of the autonomous engine: one
//! action at a time, skip/unskip bookkeeping, and jump-to-state via
//! shortest-path replay from the entry state. All mutating operations
//! are serialized behind a single fail-fast mutation lock, and every
//! state- or graph-changing operation broadcasts a [`SessionEvent`] to
//! subscribed observers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::sync::broadcast;

use crate::browser::{BrowserDriver, PageSnapshot};
use crate::config::ExplorerConfig;
use crate::discovery;
use crate::error::ExploreError;
use crate::graph::StateGraph;
use crate::identity::StateRegistry;
use crate::model::{
    Action, AppState, AvailableAction, ExplorationSession, ExplorationStep, GraphSnapshot, StateId,
};
use crate::session::store::SESSION_VERSION;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Change notification broadcast to observers after mutating
/// operations. Delivery is fire-and-forget; lagging or disconnected
/// observers are dropped by the channel.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Current state, path-from-root, or action projection changed.
    StateChanged,
    /// A state or transition was added to the graph.
    GraphChanged,
    /// The session was written to disk.
    SessionSaved { path: String },
}

/// Result of executing one interactive action.
#[derive(Debug, Clone)]
pub struct ActionOutcome {
    pub previous_state_id: StateId,
    pub new_state_id: StateId,
    pub is_new_state: bool,
}

struct SessionInner {
    session_id: String,
    created_at: DateTime<Utc>,
    registry: StateRegistry,
    graph: StateGraph,
    current_state_id: Option<StateId>,
    path_from_root: Vec<StateId>,
    skipped: BTreeMap<StateId, BTreeSet<String>>,
    history: Vec<ExplorationStep>,
    /// Snapshot the current projection is derived from.
    snapshot: Option<PageSnapshot>,
}

/// Interactive exploration session over one browser driver.
pub struct InteractiveSession {
    driver: Arc<dyn BrowserDriver>,
    config: ExplorerConfig,
    inner: Mutex<SessionInner>,
    /// The mutation lock: at most one browser-mutating operation at any
    /// instant. Contending callers fail fast with `ExecutionInProgress`.
    busy: AtomicBool,
    events: broadcast::Sender<SessionEvent>,
}

struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for InteractiveSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InteractiveSession").finish_non_exhaustive()
    }
}

impl InteractiveSession {
    /// Start a fresh session: navigate to the app and capture the entry
    /// state.
    pub async fn start(
        driver: Arc<dyn BrowserDriver>,
        config: ExplorerConfig,
        url: &str,
    ) -> Result<Self, ExploreError> {
        let controller = Self::with_parts(
            driver,
            config,
            uuid::Uuid::new_v4().to_string(),
            Utc::now(),
            StateRegistry::new(),
            StateGraph::new(url),
            BTreeMap::new(),
            Vec::new(),
        );
        controller.capture_entry().await?;
        Ok(controller)
    }

    /// Rehydrate a persisted session and resynchronize the live cursor
    /// with the persisted one via path replay.
    pub async fn resume(
        driver: Arc<dyn BrowserDriver>,
        config: ExplorerConfig,
        session: ExplorationSession,
    ) -> Result<Self, ExploreError> {
        // Migrated pre-versioned payloads can lack the URL inside the
        // graph snapshot; the session-level URL is authoritative then.
        let mut graph_snapshot = session.state_graph;
        if graph_snapshot.app_url.is_empty() {
            graph_snapshot.app_url = session.app_url.clone();
        }
        let graph = StateGraph::from_snapshot(graph_snapshot);
        let registry = StateRegistry::rehydrate(&graph, &session.explored_actions);
        let skipped = session
            .skipped_actions
            .into_iter()
            .map(|(id, keys)| (id, keys.into_iter().collect()))
            .collect();

        let has_entry = graph.entry_state_id().is_some();
        let controller = Self::with_parts(
            driver,
            config,
            session.id,
            session.created_at,
            registry,
            graph,
            skipped,
            session.exploration_history,
        );

        if !has_entry {
            // Nothing was ever captured; behave like a fresh start.
            controller.capture_entry().await?;
            return Ok(controller);
        }

        match session.current_state_id {
            Some(current) => {
                if let Err(err) = controller.jump_to_state(&current).await {
                    tracing::warn!(
                        state = %current,
                        error = %err,
                        "Could not resynchronize persisted cursor; resetting to entry"
                    );
                    controller.go_to_root().await?;
                }
            }
            None => controller.go_to_root().await?,
        }
        Ok(controller)
    }

    #[allow(clippy::too_many_arguments)]
    fn with_parts(
        driver: Arc<dyn BrowserDriver>,
        config: ExplorerConfig,
        session_id: String,
        created_at: DateTime<Utc>,
        registry: StateRegistry,
        graph: StateGraph,
        skipped: BTreeMap<StateId, BTreeSet<String>>,
        history: Vec<ExplorationStep>,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            driver,
            config,
            inner: Mutex::new(SessionInner {
                session_id,
                created_at,
                registry,
                graph,
                current_state_id: None,
                path_from_root: Vec::new(),
                skipped,
                history,
                snapshot: None,
            }),
            busy: AtomicBool::new(false),
            events,
        }
    }

    /// Register an observer. New observers should be sent a full
    /// snapshot by their transport before relying on change events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn app_url(&self) -> String {
        self.inner.lock().graph.app_url().to_string()
    }

    pub fn current_state(&self) -> Option<AppState> {
        let inner = self.inner.lock();
        let id = inner.current_state_id.as_ref()?;
        inner.graph.get_state(id).cloned()
    }

    pub fn path_from_root(&self) -> Vec<StateId> {
        self.inner.lock().path_from_root.clone()
    }

    pub fn graph_snapshot(&self) -> GraphSnapshot {
        self.inner.lock().graph.snapshot()
    }

    /// Projection of the current state's candidate actions, annotated
    /// with explored/skipped flags and known result states.
    pub fn available_actions(&self) -> Vec<AvailableAction> {
        projection(&self.inner.lock(), &self.config)
    }

    /// Execute one action resolved from the current projection.
    ///
    /// Fails fast with `ExecutionInProgress` while another mutating
    /// operation holds the lock; the call is not queued.
    pub async fn execute_action(&self, action_id: &str) -> Result<ActionOutcome, ExploreError> {
        let _guard = self.acquire_busy()?;

        let (source, action) = {
            let mut inner = self.inner.lock();
            let available = projection(&inner, &self.config)
                .into_iter()
                .find(|a| a.id == action_id)
                .ok_or_else(|| ExploreError::UnknownAction {
                    action_id: action_id.to_string(),
                })?;
            let source = inner
                .current_state_id
                .clone()
                .ok_or_else(|| ExploreError::UnknownAction {
                    action_id: action_id.to_string(),
                })?;
            inner
                .registry
                .mark_explored(&source, available.action.candidate_key());
            (source, available.action)
        };

        self.execute_with_timeout(&action).await?;
        tokio::time::sleep(self.config.settle_delay).await;
        let snapshot = self.driver.snapshot().await?;

        let (outcome, is_new) = {
            let mut inner = self.inner.lock();
            let inner = &mut *inner;
            let identified = inner.registry.identify(&snapshot, &mut inner.graph);
            inner
                .graph
                .add_transition(&source, &identified.state_id, action.clone());
            inner.history.push(ExplorationStep {
                timestamp: Utc::now(),
                from_state_id: source.clone(),
                to_state_id: identified.state_id.clone(),
                action,
            });
            inner.current_state_id = Some(identified.state_id.clone());
            // Path only grows when the action actually moved the app.
            if identified.state_id != source {
                inner.path_from_root.push(identified.state_id.clone());
            }
            inner.snapshot = Some(snapshot);
            (
                ActionOutcome {
                    previous_state_id: source,
                    new_state_id: identified.state_id,
                    is_new_state: identified.is_new,
                },
                identified.is_new,
            )
        };

        if is_new {
            self.emit(SessionEvent::GraphChanged);
        }
        self.emit(SessionEvent::StateChanged);
        Ok(outcome)
    }

    /// Mark an action as uninteresting. Bookkeeping only: explicit
    /// execution of a skipped action is never blocked.
    pub fn skip_action(&self, state_id: &str, action_id: &str) -> Result<(), ExploreError> {
        let key = {
            let mut inner = self.inner.lock();
            let key = resolve_action_key(&inner, &self.config, state_id, action_id)?;
            inner
                .skipped
                .entry(state_id.to_string())
                .or_default()
                .insert(key.clone());
            key
        };
        tracing::debug!(state = %state_id, action = %key, "Action skipped");
        self.emit(SessionEvent::StateChanged);
        Ok(())
    }

    /// Remove an action from the skip set.
    pub fn unskip_action(&self, state_id: &str, action_id: &str) -> Result<(), ExploreError> {
        {
            let mut inner = self.inner.lock();
            let key = resolve_action_key(&inner, &self.config, state_id, action_id)?;
            if let Some(keys) = inner.skipped.get_mut(state_id) {
                keys.remove(&key);
            }
        }
        self.emit(SessionEvent::StateChanged);
        Ok(())
    }

    /// Jump to a previously discovered state by replaying a recorded
    /// action path from the entry state.
    ///
    /// Jumping to the entry state is observably a reset: no action is
    /// replayed. Up to `max_paths_per_state` recorded paths are tried
    /// shortest-first; a candidate whose replay fails or lands on the
    /// wrong state is abandoned for the next one. Exhausting every
    /// candidate is logged, not raised. On `PathNotFound` the cursor is
    /// left unchanged.
    pub async fn jump_to_state(&self, target: &str) -> Result<(), ExploreError> {
        let _guard = self.acquire_busy()?;

        let (app_url, candidates): (String, Vec<Vec<Action>>) = {
            let inner = self.inner.lock();
            if !inner.graph.contains_state(target) {
                return Err(ExploreError::UnknownState {
                    state_id: target.to_string(),
                });
            }
            let app_url = inner.graph.app_url().to_string();
            if inner.graph.entry_state_id().map(String::as_str) == Some(target) {
                (app_url, vec![Vec::new()])
            } else {
                let cap = self.config.max_paths_per_state.max(1);
                let paths = inner.graph.paths_to(target, cap);
                if paths.is_empty() {
                    return Err(ExploreError::PathNotFound {
                        state_id: target.to_string(),
                    });
                }
                let replays = paths
                    .iter()
                    .map(|path| {
                        path.windows(2)
                            .filter_map(|pair| {
                                inner
                                    .graph
                                    .transitions_from(&pair[0])
                                    .into_iter()
                                    .find(|t| t.to_state_id == pair[1])
                                    .map(|t| t.action.clone())
                            })
                            .collect()
                    })
                    .collect();
                (app_url, replays)
            }
        };

        let mut any_new = false;
        for (attempt, replay) in candidates.iter().enumerate() {
            let last = attempt + 1 == candidates.len();
            self.driver.navigate(&app_url).await?;

            let mut abandoned = false;
            for action in replay {
                if let Err(err) = self.execute_with_timeout(action).await {
                    if !err.is_recoverable() {
                        return Err(err);
                    }
                    tracing::warn!(
                        selector = %action.element_selector,
                        error = %err,
                        "Replay step failed"
                    );
                    abandoned = true;
                    break;
                }
                tokio::time::sleep(self.config.settle_delay).await;
            }
            if abandoned && !last {
                continue;
            }

            let snapshot = self.driver.snapshot().await?;
            let done = {
                let mut inner = self.inner.lock();
                let inner = &mut *inner;
                let identified = inner.registry.identify(&snapshot, &mut inner.graph);
                any_new |= identified.is_new;
                let on_target = identified.state_id == target;
                if on_target || last {
                    if !on_target {
                        tracing::warn!(
                            target = %target,
                            reached = %identified.state_id,
                            "Replay reached a different state than the target"
                        );
                    }
                    inner.current_state_id = Some(target.to_string());
                    inner.path_from_root = match inner.graph.shortest_path(target) {
                        Some(path) => path,
                        None => vec![target.to_string()],
                    };
                    inner.snapshot = Some(snapshot);
                    true
                } else {
                    false
                }
            };
            if done {
                break;
            }
        }

        if any_new {
            self.emit(SessionEvent::GraphChanged);
        }
        self.emit(SessionEvent::StateChanged);
        Ok(())
    }

    /// Reset to the entry state.
    pub async fn go_to_root(&self) -> Result<(), ExploreError> {
        let entry = self
            .inner
            .lock()
            .graph
            .entry_state_id()
            .cloned()
            .ok_or_else(|| ExploreError::UnknownState {
                state_id: "entry".to_string(),
            })?;
        self.jump_to_state(&entry).await
    }

    /// Snapshot the full session for persistence.
    pub fn to_session(&self) -> ExplorationSession {
        let inner = self.inner.lock();
        ExplorationSession {
            version: SESSION_VERSION,
            id: inner.session_id.clone(),
            app_url: inner.graph.app_url().to_string(),
            created_at: inner.created_at,
            last_updated_at: Utc::now(),
            current_state_id: inner.current_state_id.clone(),
            entry_state_id: inner.graph.entry_state_id().cloned(),
            state_graph: inner.graph.snapshot(),
            skipped_actions: inner
                .skipped
                .iter()
                .map(|(id, keys)| (id.clone(), keys.iter().cloned().collect()))
                .collect(),
            exploration_history: inner.history.clone(),
            explored_actions: inner.registry.explored_map(),
        }
    }

    /// Broadcast that the session was written to `path`.
    pub fn notify_saved(&self, path: impl Into<String>) {
        self.emit(SessionEvent::SessionSaved { path: path.into() });
    }

    async fn capture_entry(&self) -> Result<(), ExploreError> {
        let url = self.inner.lock().graph.app_url().to_string();
        self.driver.navigate(&url).await?;
        let snapshot = self.driver.snapshot().await?;
        {
            let mut inner = self.inner.lock();
            let inner = &mut *inner;
            let identified = inner.registry.identify(&snapshot, &mut inner.graph);
            inner.graph.set_entry_state(identified.state_id.clone());
            inner.current_state_id = Some(identified.state_id.clone());
            inner.path_from_root = vec![identified.state_id];
            inner.snapshot = Some(snapshot);
        }
        self.emit(SessionEvent::GraphChanged);
        self.emit(SessionEvent::StateChanged);
        Ok(())
    }

    fn acquire_busy(&self) -> Result<BusyGuard<'_>, ExploreError> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(ExploreError::ExecutionInProgress);
        }
        Ok(BusyGuard { flag: &self.busy })
    }

    async fn execute_with_timeout(&self, action: &Action) -> Result<(), ExploreError> {
        match tokio::time::timeout(self.config.action_timeout, self.driver.execute(action)).await {
            Ok(result) => result,
            Err(_) => Err(ExploreError::ActionTimeout {
                selector: action.element_selector.clone(),
                timeout: self.config.action_timeout,
            }),
        }
    }

    fn emit(&self, event: SessionEvent) {
        // Fire-and-forget; send only fails when no observer is registered.
        let _ = self.events.send(event);
    }
}

fn projection(inner: &SessionInner, config: &ExplorerConfig) -> Vec<AvailableAction> {
    let (Some(current), Some(snapshot)) = (&inner.current_state_id, &inner.snapshot) else {
        return Vec::new();
    };

    let transitions = inner.graph.transitions_from(current);
    let skipped = inner.skipped.get(current);
    let mut available = Vec::new();
    for element in discovery::discover_elements(snapshot) {
        for action in discovery::actions_for(&element, &config.input_values) {
            let key = action.candidate_key();
            let result_state_id = transitions
                .iter()
                .find(|t| t.action.candidate_key() == key)
                .map(|t| t.to_state_id.clone());
            available.push(AvailableAction {
                id: format!("action_{}", available.len()),
                is_explored: inner.registry.is_explored(current, &key),
                is_skipped: skipped.is_some_and(|keys| keys.contains(&key)),
                result_state_id,
                action,
            });
        }
    }
    available
}

/// Resolve a wire action id to a candidate key. Positional ids only
/// resolve against the current state's projection; a raw candidate key
/// is accepted for any state.
fn resolve_action_key(
    inner: &SessionInner,
    config: &ExplorerConfig,
    state_id: &str,
    action_id: &str,
) -> Result<String, ExploreError> {
    if inner.current_state_id.as_deref() == Some(state_id) {
        if let Some(available) = projection(inner, config)
            .into_iter()
            .find(|a| a.id == action_id)
        {
            return Ok(available.action.candidate_key());
        }
    }
    if action_id.contains('|') {
        return Ok(action_id.to_string());
    }
    Err(ExploreError::UnknownAction {
        action_id: action_id.to_string(),
    })
}
