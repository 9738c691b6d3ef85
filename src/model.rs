//! Shared data model: elements, actions, states, transitions, and the
//! persisted session envelope.
//!
//! Everything that crosses the persistence or live-protocol boundary is
//! serialized camelCase to match the session file format.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier of a discovered state (`state_001`, `state_002`, ...).
///
/// Ids are zero-padded and monotonically assigned, so lexicographic
/// order equals discovery order.
pub type StateId = String;

/// Kind of interactive element recognized by action discovery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Button,
    Link,
    Input,
    Checkbox,
    Select,
}

impl ElementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Button => "button",
            ElementKind::Link => "link",
            ElementKind::Input => "input",
            ElementKind::Checkbox => "checkbox",
            ElementKind::Select => "select",
        }
    }
}

/// A visible interactive element on a captured page.
///
/// Identity is positional/structural; elements are not persisted
/// independently of the state that captured them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveElement {
    pub selector: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub label: String,
    pub tag_name: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

/// Kind of action the explorer can perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Click,
    Input,
    Submit,
    Select,
    Check,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::Click => "click",
            ActionType::Input => "input",
            ActionType::Submit => "submit",
            ActionType::Select => "select",
            ActionType::Check => "check",
        }
    }
}

/// A candidate action derived from an interactive element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: ActionType,
    pub element_selector: String,
    pub element_label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Action {
    /// Key identifying this candidate. Two actions are the same
    /// candidate iff `(type, selector, value)` match.
    pub fn candidate_key(&self) -> String {
        format!(
            "{}|{}|{}",
            self.action_type.as_str(),
            self.element_selector,
            self.value.as_deref().unwrap_or("")
        )
    }
}

/// A discovered application state. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppState {
    pub id: StateId,
    pub url: String,
    pub dom_hash: String,
    pub description: String,
    #[serde(default)]
    pub elements: Vec<InteractiveElement>,
    pub timestamp: DateTime<Utc>,
}

/// A directed edge between two states, labeled with the action that
/// produced it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateTransition {
    pub id: String,
    pub from_state_id: StateId,
    pub to_state_id: StateId,
    pub action: Action,
}

impl StateTransition {
    /// Deduplication key: `(from, to, action type, selector)`. Repeated
    /// discovery of the same action never creates a second edge.
    pub fn dedup_key(&self) -> String {
        dedup_key(
            &self.from_state_id,
            &self.to_state_id,
            self.action.action_type,
            &self.action.element_selector,
        )
    }
}

pub(crate) fn dedup_key(
    from: &str,
    to: &str,
    action_type: ActionType,
    selector: &str,
) -> String {
    format!("{from}->{to}:{}:{selector}", action_type.as_str())
}

/// One executed step in an interactive session. Append-only audit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationStep {
    pub timestamp: DateTime<Utc>,
    pub from_state_id: StateId,
    pub to_state_id: StateId,
    pub action: Action,
}

/// Presentation-layer projection of a candidate action from the
/// current state. Derived on demand; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableAction {
    pub id: String,
    pub action: Action,
    pub is_explored: bool,
    pub is_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_state_id: Option<StateId>,
}

/// Serializable snapshot of the state graph.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSnapshot {
    #[serde(default)]
    pub app_url: String,
    #[serde(default)]
    pub entry_state_id: Option<StateId>,
    #[serde(default)]
    pub states: Vec<AppState>,
    #[serde(default)]
    pub transitions: Vec<StateTransition>,
    #[serde(default)]
    pub state_count: usize,
    #[serde(default)]
    pub transition_count: usize,
}

/// Versioned at-rest shape of a full interactive session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationSession {
    pub version: u32,
    pub id: String,
    pub app_url: String,
    pub created_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub current_state_id: Option<StateId>,
    #[serde(default)]
    pub entry_state_id: Option<StateId>,
    #[serde(default)]
    pub state_graph: GraphSnapshot,
    /// State id -> candidate keys marked uninteresting by an operator.
    /// Advisory only; execution is never blocked by membership here.
    #[serde(default)]
    pub skipped_actions: BTreeMap<StateId, Vec<String>>,
    #[serde(default)]
    pub exploration_history: Vec<ExplorationStep>,
    /// State id -> candidate keys already executed, kept separately
    /// from history so the unexplored filter survives a reload.
    #[serde(default)]
    pub explored_actions: BTreeMap<StateId, Vec<String>>,
}

impl ExplorationSession {
    /// Fresh session for an application URL, stamped with the current
    /// schema version.
    pub fn empty(app_url: impl Into<String>, version: u32) -> Self {
        let now = Utc::now();
        Self {
            version,
            id: uuid::Uuid::new_v4().to_string(),
            app_url: app_url.into(),
            created_at: now,
            last_updated_at: now,
            current_state_id: None,
            entry_state_id: None,
            state_graph: GraphSnapshot::default(),
            skipped_actions: BTreeMap::new(),
            exploration_history: Vec::new(),
            explored_actions: BTreeMap::new(),
        }
    }
}
