//! State identity: content fingerprinting and state deduplication.
//!
//! A state is keyed by `(url path, fingerprint)`. The fingerprint hashes
//! a sorted list of visible-interactive-element signatures plus two
//! scalar summaries, so DOM reordering that does not reflect a real
//! state change produces the same hash.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use crate::browser::PageSnapshot;
use crate::discovery;
use crate::graph::StateGraph;
use crate::model::{AppState, StateId};

/// Truncated hex length of the fingerprint.
const FINGERPRINT_LEN: usize = 16;
/// Maximum element text carried into a signature line.
const SIGNATURE_TEXT_LEN: usize = 30;

/// Result of identifying a snapshot.
#[derive(Debug, Clone)]
pub struct IdentifyOutcome {
    pub state_id: StateId,
    pub is_new: bool,
}

/// Deduplication index over discovered states, plus per-state
/// explored-action bookkeeping.
///
/// The registry owns only the index; the authoritative `AppState`
/// objects live in the [`StateGraph`], which `identify` inserts into on
/// first observation.
#[derive(Debug, Default)]
pub struct StateRegistry {
    /// `(url path, fingerprint)` -> state id of the first observation.
    seen: HashMap<(String, String), StateId>,
    /// Monotonic id counter for this run.
    counter: usize,
    /// State id -> candidate keys already executed from that state.
    explored: HashMap<StateId, BTreeSet<String>>,
}

impl StateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a rehydrated graph and persisted
    /// explored-action keys.
    pub fn rehydrate(graph: &StateGraph, explored: &BTreeMap<StateId, Vec<String>>) -> Self {
        let mut registry = Self::new();
        for state in graph.states() {
            let key = (url_path(&state.url), state.dom_hash.clone());
            registry.seen.entry(key).or_insert_with(|| state.id.clone());
        }
        registry.counter = graph.state_count();
        for (state_id, keys) in explored {
            registry
                .explored
                .insert(state_id.clone(), keys.iter().cloned().collect());
        }
        registry
    }

    /// Identify the state represented by a snapshot, creating and
    /// inserting a new `AppState` into the graph on first observation.
    ///
    /// Idempotent: captures with the same `(url path, fingerprint)` key
    /// resolve to the id of the first-seen state.
    pub fn identify(&mut self, snapshot: &PageSnapshot, graph: &mut StateGraph) -> IdentifyOutcome {
        let hash = fingerprint(snapshot);
        let key = (url_path(&snapshot.url), hash.clone());

        if let Some(existing) = self.seen.get(&key) {
            return IdentifyOutcome {
                state_id: existing.clone(),
                is_new: false,
            };
        }

        self.counter += 1;
        let state_id = format!("state_{:03}", self.counter);
        let state = AppState {
            id: state_id.clone(),
            url: snapshot.url.clone(),
            dom_hash: hash,
            description: snapshot.description.clone(),
            elements: discovery::discover_elements(snapshot),
            timestamp: Utc::now(),
        };
        graph.add_state(state);
        self.seen.insert(key, state_id.clone());

        IdentifyOutcome {
            state_id,
            is_new: true,
        }
    }

    pub fn mark_explored(&mut self, state_id: &str, candidate_key: impl Into<String>) {
        self.explored
            .entry(state_id.to_string())
            .or_default()
            .insert(candidate_key.into());
    }

    pub fn is_explored(&self, state_id: &str, candidate_key: &str) -> bool {
        self.explored
            .get(state_id)
            .is_some_and(|keys| keys.contains(candidate_key))
    }

    /// Explored keys in serializable form for the session envelope.
    pub fn explored_map(&self) -> BTreeMap<StateId, Vec<String>> {
        self.explored
            .iter()
            .map(|(id, keys)| (id.clone(), keys.iter().cloned().collect()))
            .collect()
    }
}

/// Fingerprint a page: sha2 over sorted visible-element signature lines
/// plus the list-item count and active-marker scalars, truncated hex.
pub fn fingerprint(snapshot: &PageSnapshot) -> String {
    let mut signatures: Vec<String> = snapshot
        .elements
        .iter()
        .filter(|raw| discovery::is_visible(raw))
        .map(|raw| {
            let text: String = raw.text.trim().chars().take(SIGNATURE_TEXT_LEN).collect();
            format!(
                "{}|{}|{}|{}|{}|{}|{}",
                raw.tag_name.to_lowercase(),
                raw.attr("id").unwrap_or(""),
                raw.attr("data-testid").unwrap_or(""),
                raw.attr("class").unwrap_or(""),
                text,
                raw.checked,
                raw.disabled,
            )
        })
        .collect();
    signatures.sort();
    signatures.push(format!("items:{}", snapshot.list_item_count));
    signatures.push(format!(
        "filter:{}",
        snapshot.active_marker.as_deref().unwrap_or("")
    ));

    let mut hasher = Sha256::new();
    for line in &signatures {
        hasher.update(line.as_bytes());
        hasher.update(b"\n");
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    hex[..FINGERPRINT_LEN].to_string()
}

/// Path-only portion of a URL; the non-fingerprint half of state
/// identity. Falls back to the raw string when it does not parse.
pub fn url_path(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.path().to_string())
        .unwrap_or_else(|_| url.to_string())
}
