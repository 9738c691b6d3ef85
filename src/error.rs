//! Error types for exploration, replay, and session handling.

use std::time::Duration;

/// Error type for exploration and session operations.
///
/// Local, recoverable conditions (visibility and timeout misses during
/// exploration) are handled by the engine and never abort a run.
/// Structural conditions (unreachable target, incompatible session
/// version) are surfaced to the caller.
#[derive(Debug, thiserror::Error)]
pub enum ExploreError {
    /// The action's target element is not visible on the current page.
    #[error("Element not visible: {selector}")]
    ElementNotVisible { selector: String },

    /// The action did not complete within the configured timeout.
    #[error("Action timed out after {timeout:?}: {selector}")]
    ActionTimeout { selector: String, timeout: Duration },

    /// The browser failed to perform the action.
    #[error("Action failed on {selector}: {reason}")]
    ActionExecutionFailed { selector: String, reason: String },

    /// Navigation to a URL failed. Aborts the current run or operation.
    #[error("Navigation to {url} failed: {reason}")]
    NavigationFailure { url: String, reason: String },

    /// No recorded action path reaches the requested state.
    #[error("No known path to state {state_id}")]
    PathNotFound { state_id: String },

    /// Another mutating operation is already in flight. Callers must retry.
    #[error("Another operation is already executing")]
    ExecutionInProgress,

    /// The requested state id does not exist in the graph.
    #[error("Unknown state: {state_id}")]
    UnknownState { state_id: String },

    /// The action id does not resolve against the current projection.
    #[error("Unknown action: {action_id}")]
    UnknownAction { action_id: String },

    /// Stored session was written by a newer version. Fatal at load.
    #[error("Session version {found} is newer than supported version {supported}")]
    VersionIncompatible { found: u32, supported: u32 },

    /// Filesystem error while reading or writing a session.
    #[error("Session I/O error: {0}")]
    SessionIo(#[from] std::io::Error),

    /// Stored session is not valid JSON for the current schema.
    #[error("Session format error: {0}")]
    SessionFormat(#[from] serde_json::Error),
}

impl ExploreError {
    /// Stable machine-readable code, used by the live protocol's `error`
    /// and `action_result` payloads.
    pub fn code(&self) -> &'static str {
        match self {
            ExploreError::ElementNotVisible { .. } => "element_not_visible",
            ExploreError::ActionTimeout { .. } => "action_timeout",
            ExploreError::ActionExecutionFailed { .. } => "action_execution_failed",
            ExploreError::NavigationFailure { .. } => "navigation_failure",
            ExploreError::PathNotFound { .. } => "path_not_found",
            ExploreError::ExecutionInProgress => "execution_in_progress",
            ExploreError::UnknownState { .. } => "unknown_state",
            ExploreError::UnknownAction { .. } => "unknown_action",
            ExploreError::VersionIncompatible { .. } => "version_incompatible",
            ExploreError::SessionIo(_) => "session_io",
            ExploreError::SessionFormat(_) => "session_format",
        }
    }

    /// Whether the engine treats this as a non-fatal miss during
    /// autonomous exploration.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ExploreError::ElementNotVisible { .. }
                | ExploreError::ActionTimeout { .. }
                | ExploreError::ActionExecutionFailed { .. }
        )
    }
}
