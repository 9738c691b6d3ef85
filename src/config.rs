//! Explorer configuration.

use std::collections::HashMap;
use std::time::Duration;

/// Sample values used when generating `input` actions, keyed by the
/// element's declared input kind (`type` attribute).
#[derive(Debug, Clone)]
pub struct InputValueTable {
    values: HashMap<String, String>,
    fallback: String,
}

impl Default for InputValueTable {
    fn default() -> Self {
        let mut values = HashMap::new();
        values.insert("email".to_string(), "test@example.com".to_string());
        values.insert("password".to_string(), "Secret123!".to_string());
        values.insert("number".to_string(), "42".to_string());
        values.insert("date".to_string(), "2024-01-15".to_string());
        values.insert("search".to_string(), "query".to_string());
        values.insert("tel".to_string(), "555-0100".to_string());
        values.insert("url".to_string(), "https://example.com".to_string());
        values.insert("text".to_string(), "Test input".to_string());
        Self {
            values,
            fallback: "Test input".to_string(),
        }
    }
}

impl InputValueTable {
    /// Look up the sample value for a declared input kind, falling back
    /// to the generic text value.
    pub fn value_for(&self, input_kind: &str) -> &str {
        self.values
            .get(&input_kind.to_lowercase())
            .unwrap_or(&self.fallback)
    }

    /// Override the sample value for an input kind.
    pub fn set(&mut self, input_kind: impl Into<String>, value: impl Into<String>) {
        self.values.insert(input_kind.into(), value.into());
    }
}

/// Configuration for exploration runs and interactive sessions.
#[derive(Debug, Clone)]
pub struct ExplorerConfig {
    /// Stop autonomous exploration once this many distinct states exist.
    pub max_states: usize,
    /// Maximum number of actions from the entry state; deeper queue
    /// items are dropped without being executed.
    pub max_depth: usize,
    /// Cap on distinct paths collected per target during path search.
    pub max_paths_per_state: usize,
    /// Per-action timeout applied to the browser execution primitive.
    pub action_timeout: Duration,
    /// Wait after each executed action before capturing the result,
    /// giving the page time to re-render.
    pub settle_delay: Duration,
    /// Sample values for generated input actions.
    pub input_values: InputValueTable,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            max_states: 50,
            max_depth: 5,
            max_paths_per_state: 3,
            action_timeout: Duration::from_secs(30),
            settle_delay: Duration::from_millis(200),
            input_values: InputValueTable::default(),
        }
    }
}

impl ExplorerConfig {
    pub fn with_max_states(mut self, max_states: usize) -> Self {
        self.max_states = max_states;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_max_paths_per_state(mut self, max_paths: usize) -> Self {
        self.max_paths_per_state = max_paths;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_value_lookup() {
        let table = InputValueTable::default();
        assert_eq!(table.value_for("email"), "test@example.com");
        assert_eq!(table.value_for("EMAIL"), "test@example.com");
        assert_eq!(table.value_for("color"), "Test input");
    }

    #[test]
    fn test_builder_overrides() {
        let config = ExplorerConfig::default()
            .with_max_states(10)
            .with_max_depth(2)
            .with_action_timeout(Duration::from_secs(5));
        assert_eq!(config.max_states, 10);
        assert_eq!(config.max_depth, 2);
        assert_eq!(config.action_timeout, Duration::from_secs(5));
        assert_eq!(config.max_paths_per_state, 3);
    }
}
