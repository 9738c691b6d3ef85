//! Autonomous breadth-first exploration engine.
//!
//! Drives a [`BrowserDriver`] through every unexplored candidate action
//! up to the configured state and depth caps, building a complete
//! [`StateGraph`]. Strictly sequential: one action in flight at a time.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::browser::{BrowserDriver, PageSnapshot};
use crate::config::ExplorerConfig;
use crate::discovery;
use crate::error::ExploreError;
use crate::graph::StateGraph;
use crate::identity::StateRegistry;
use crate::model::{Action, StateId};

/// Outcome of an autonomous exploration run.
#[derive(Debug)]
pub struct ExplorationReport {
    pub graph: StateGraph,
    pub states_discovered: usize,
    pub transitions_recorded: usize,
    /// Visibility, timeout, and execution misses. Non-fatal.
    pub action_failures: usize,
    /// Queue items dropped for exceeding the depth cap.
    pub depth_skips: usize,
    pub duration: Duration,
}

struct QueueItem {
    source: StateId,
    action: Action,
    /// State-id path from the entry state to `source` at enqueue time.
    path: Vec<StateId>,
}

/// Single-run breadth-first explorer.
///
/// `run` consumes the engine; a finished run is never restarted.
pub struct ExplorationEngine {
    driver: Arc<dyn BrowserDriver>,
    config: ExplorerConfig,
}

impl ExplorationEngine {
    pub fn new(driver: Arc<dyn BrowserDriver>, config: ExplorerConfig) -> Self {
        Self { driver, config }
    }

    /// Explore the application at `url` until the action queue drains
    /// or the distinct-state cap is reached.
    pub async fn run(self, url: &str) -> Result<ExplorationReport, ExploreError> {
        let started = Instant::now();
        let mut graph = StateGraph::new(url);
        let mut registry = StateRegistry::new();
        let mut queue: VecDeque<QueueItem> = VecDeque::new();

        let mut transitions_recorded = 0usize;
        let mut action_failures = 0usize;
        let mut depth_skips = 0usize;

        self.driver.navigate(url).await?;
        let snapshot = self.driver.snapshot().await?;
        let entry = registry.identify(&snapshot, &mut graph);
        graph.set_entry_state(entry.state_id.clone());
        tracing::info!(entry_state = %entry.state_id, url, "Exploration started");

        let entry_path = vec![entry.state_id.clone()];
        self.enqueue_candidates(&mut queue, &registry, &entry.state_id, &snapshot, &entry_path);

        while let Some(item) = queue.pop_front() {
            if graph.state_count() >= self.config.max_states {
                tracing::info!(max_states = self.config.max_states, "State cap reached");
                break;
            }
            // path holds states, so edges-from-root is len - 1.
            if item.path.len() > self.config.max_depth {
                depth_skips += 1;
                continue;
            }

            self.restore_to(&graph, &item.source).await?;
            registry.mark_explored(&item.source, item.action.candidate_key());

            if let Err(err) = self.execute_with_timeout(&item.action).await {
                if err.is_recoverable() {
                    action_failures += 1;
                    tracing::warn!(
                        selector = %item.action.element_selector,
                        source = %item.source,
                        error = %err,
                        "Action failed; continuing"
                    );
                    continue;
                }
                return Err(err);
            }
            tokio::time::sleep(self.config.settle_delay).await;

            let snapshot = self.driver.snapshot().await?;
            let outcome = registry.identify(&snapshot, &mut graph);
            if graph.add_transition(&item.source, &outcome.state_id, item.action.clone()) {
                transitions_recorded += 1;
            }

            if outcome.is_new {
                tracing::debug!(
                    state = %outcome.state_id,
                    via = %item.action.candidate_key(),
                    "New state discovered"
                );
                if graph.state_count() < self.config.max_states {
                    let mut path = item.path.clone();
                    path.push(outcome.state_id.clone());
                    self.enqueue_candidates(&mut queue, &registry, &outcome.state_id, &snapshot, &path);
                }
            }
        }

        let report = ExplorationReport {
            states_discovered: graph.state_count(),
            transitions_recorded,
            action_failures,
            depth_skips,
            duration: started.elapsed(),
            graph,
        };
        tracing::info!(
            states = report.states_discovered,
            transitions = report.transitions_recorded,
            failures = report.action_failures,
            depth_skips = report.depth_skips,
            "Exploration finished"
        );
        Ok(report)
    }

    fn enqueue_candidates(
        &self,
        queue: &mut VecDeque<QueueItem>,
        registry: &StateRegistry,
        state_id: &str,
        snapshot: &PageSnapshot,
        path: &[StateId],
    ) {
        for element in discovery::discover_elements(snapshot) {
            for action in discovery::actions_for(&element, &self.config.input_values) {
                if registry.is_explored(state_id, &action.candidate_key()) {
                    continue;
                }
                queue.push_back(QueueItem {
                    source: state_id.to_string(),
                    action,
                    path: path.to_vec(),
                });
            }
        }
    }

    /// Return to a baseline from which the source state's actions are
    /// valid: reset to the entry URL, then replay the shortest recorded
    /// action path to the source. Replay is best-effort; a source with
    /// no known path falls back to the plain reset.
    async fn restore_to(&self, graph: &StateGraph, source: &str) -> Result<(), ExploreError> {
        self.driver.navigate(graph.app_url()).await?;

        if graph.entry_state_id().map(String::as_str) == Some(source) {
            return Ok(());
        }
        let Some(path) = graph.shortest_path(source) else {
            tracing::debug!(source, "No recorded path to source; using entry baseline");
            return Ok(());
        };

        for pair in path.windows(2) {
            let Some(transition) = graph
                .transitions_from(&pair[0])
                .into_iter()
                .find(|t| t.to_state_id == pair[1])
            else {
                break;
            };
            if let Err(err) = self.execute_with_timeout(&transition.action).await {
                if !err.is_recoverable() {
                    return Err(err);
                }
                tracing::warn!(
                    from = %pair[0],
                    to = %pair[1],
                    error = %err,
                    "Replay step failed while restoring source state"
                );
                break;
            }
            tokio::time::sleep(self.config.settle_delay).await;
        }
        Ok(())
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
}
