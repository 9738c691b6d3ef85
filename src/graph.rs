//! State graph: discovered states, deduplicated transitions, and
//! bounded cycle-free path search from the entry state.

use std::collections::{BTreeMap, HashSet, VecDeque};

use crate::model::{
    dedup_key, Action, AppState, GraphSnapshot, StateId, StateTransition,
};

/// Directed graph of discovered application states.
///
/// States are keyed by their zero-padded monotonic ids, so map order is
/// insertion order. The graph is a multigraph only across distinct
/// actions: re-discovering the same `(from, to, type, selector)` edge
/// never adds a second transition.
#[derive(Debug, Default)]
pub struct StateGraph {
    states: BTreeMap<StateId, AppState>,
    transitions: Vec<StateTransition>,
    transition_keys: HashSet<String>,
    entry_state_id: Option<StateId>,
    app_url: String,
}

impl StateGraph {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
            ..Self::default()
        }
    }

    pub fn app_url(&self) -> &str {
        &self.app_url
    }

    /// Insert a state. A state that already exists is left untouched;
    /// states are immutable once created and never deleted.
    pub fn add_state(&mut self, state: AppState) {
        self.states.entry(state.id.clone()).or_insert(state);
    }

    pub fn get_state(&self, state_id: &str) -> Option<&AppState> {
        self.states.get(state_id)
    }

    pub fn contains_state(&self, state_id: &str) -> bool {
        self.states.contains_key(state_id)
    }

    pub fn states(&self) -> impl Iterator<Item = &AppState> {
        self.states.values()
    }

    pub fn state_count(&self) -> usize {
        self.states.len()
    }

    pub fn transition_count(&self) -> usize {
        self.transitions.len()
    }

    /// Record a transition. Returns false when an edge with the same
    /// `(from, to, action type, selector)` already exists.
    pub fn add_transition(&mut self, from: &str, to: &str, action: Action) -> bool {
        let key = dedup_key(from, to, action.action_type, &action.element_selector);
        if !self.transition_keys.insert(key) {
            return false;
        }
        let id = format!("transition_{:03}", self.transitions.len() + 1);
        self.transitions.push(StateTransition {
            id,
            from_state_id: from.to_string(),
            to_state_id: to.to_string(),
            action,
        });
        true
    }

    /// Designate the entry state. Set exactly once per run; later calls
    /// are ignored with a warning.
    pub fn set_entry_state(&mut self, state_id: impl Into<String>) {
        let state_id = state_id.into();
        if let Some(existing) = &self.entry_state_id {
            tracing::warn!(
                existing = %existing,
                requested = %state_id,
                "Entry state already set; ignoring"
            );
            return;
        }
        self.entry_state_id = Some(state_id);
    }

    pub fn entry_state_id(&self) -> Option<&StateId> {
        self.entry_state_id.as_ref()
    }

    pub fn transitions_from(&self, state_id: &str) -> Vec<&StateTransition> {
        self.transitions
            .iter()
            .filter(|t| t.from_state_id == state_id)
            .collect()
    }

    pub fn transitions_to(&self, state_id: &str) -> Vec<&StateTransition> {
        self.transitions
            .iter()
            .filter(|t| t.to_state_id == state_id)
            .collect()
    }

    /// Bounded breadth-first search for simple paths from the entry
    /// state to `target`, capped at `max_paths` distinct paths.
    ///
    /// A successor already on the current path is skipped unless it is
    /// the target itself, so returned paths are cycle-free while cycles
    /// elsewhere in the graph stay reachable. Returns an empty list
    /// when no entry state is set.
    pub fn paths_to(&self, target: &str, max_paths: usize) -> Vec<Vec<StateId>> {
        let Some(entry) = self.entry_state_id.clone() else {
            return Vec::new();
        };
        if max_paths == 0 {
            return Vec::new();
        }
        if target == entry {
            // The entry state's own path is the single-element path.
            return vec![vec![entry]];
        }

        // Work bound: queue growth is capped in proportion to the path
        // cap and graph size.
        let max_queue = max_paths * self.states.len().max(1);

        let mut found: Vec<Vec<StateId>> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<(StateId, Vec<StateId>)> = VecDeque::new();
        queue.push_back((entry.clone(), vec![entry]));

        while let Some((state_id, path)) = queue.pop_front() {
            if found.len() >= max_paths {
                break;
            }
            if !visited.insert(path.join(">")) {
                continue;
            }
            if state_id == target {
                found.push(path);
                continue;
            }
            for transition in self.transitions_from(&state_id) {
                let next = &transition.to_state_id;
                if path.iter().any(|p| p == next) && next != target {
                    continue;
                }
                if queue.len() >= max_queue {
                    break;
                }
                let mut extended = path.clone();
                extended.push(next.clone());
                queue.push_back((next.clone(), extended));
            }
        }

        found
    }

    /// Paths from the entry state to every known state.
    pub fn compute_paths(&self, max_paths: usize) -> BTreeMap<StateId, Vec<Vec<StateId>>> {
        self.states
            .keys()
            .map(|id| (id.clone(), self.paths_to(id, max_paths)))
            .collect()
    }

    /// Shortest known path to a state: the bounded search with the cap
    /// forced to one.
    pub fn shortest_path(&self, target: &str) -> Option<Vec<StateId>> {
        self.paths_to(target, 1).into_iter().next()
    }

    /// Serializable snapshot for persistence and the live protocol.
    pub fn snapshot(&self) -> GraphSnapshot {
        GraphSnapshot {
            app_url: self.app_url.clone(),
            entry_state_id: self.entry_state_id.clone(),
            states: self.states.values().cloned().collect(),
            transitions: self.transitions.clone(),
            state_count: self.states.len(),
            transition_count: self.transitions.len(),
        }
    }

    /// Rebuild a graph from a persisted snapshot.
    pub fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = Self::new(snapshot.app_url);
        for state in snapshot.states {
            graph.add_state(state);
        }
        for transition in snapshot.transitions {
            let key = transition.dedup_key();
            if graph.transition_keys.insert(key) {
                graph.transitions.push(transition);
            }
        }
        graph.entry_state_id = snapshot.entry_state_id;
        graph
    }
}
