//! Mock browser driver for deterministic testing.
//!
//! Implements [`BrowserDriver`] over a scripted page graph instead of a
//! real browser. Pages are registered under short keys, and routes map
//! `(page, action)` pairs to the page the action lands on. Actions
//! without a route execute successfully but leave the page unchanged.
//! All interactions are captured for later verification in tests.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{BrowserDriver, PageSnapshot};
use crate::error::ExploreError;
use crate::model::Action;

/// Configuration for mock browser behavior.
#[derive(Clone, Default)]
pub struct MockBrowserConfig {
    /// Selectors whose actions fail with `ActionExecutionFailed`.
    pub fail_selectors: HashSet<String>,
    /// Selectors whose actions stall until the caller's timeout fires.
    pub stall_selectors: HashSet<String>,
    /// Make every navigation fail.
    pub fail_navigation: bool,
}

impl MockBrowserConfig {
    pub fn failing_selector(mut self, selector: impl Into<String>) -> Self {
        self.fail_selectors.insert(selector.into());
        self
    }

    pub fn stalling_selector(mut self, selector: impl Into<String>) -> Self {
        self.stall_selectors.insert(selector.into());
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }
}

struct MockState {
    pages: HashMap<String, PageSnapshot>,
    /// `(page key, route key)` -> destination page key.
    routes: HashMap<(String, String), String>,
    /// URL -> page key; first registration per URL wins, so a reset to
    /// the entry URL always lands on the entry page.
    urls: HashMap<String, String>,
    current: Option<String>,
    executed: Vec<Action>,
    navigations: Vec<String>,
}

/// Scripted [`BrowserDriver`] for tests.
pub struct MockBrowser {
    state: Mutex<MockState>,
    config: MockBrowserConfig,
}

impl MockBrowser {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                pages: HashMap::new(),
                routes: HashMap::new(),
                urls: HashMap::new(),
                current: None,
                executed: Vec::new(),
                navigations: Vec::new(),
            }),
            config: MockBrowserConfig::default(),
        }
    }

    pub fn with_config(mut self, config: MockBrowserConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a page under a key. The page's URL is also registered
    /// for `navigate` unless an earlier page claimed it.
    pub fn with_page(self, key: impl Into<String>, page: PageSnapshot) -> Self {
        let key = key.into();
        {
            let mut state = self.state.lock();
            state.urls.entry(page.url.clone()).or_insert_with(|| key.clone());
            state.pages.insert(key, page);
        }
        self
    }

    /// Script that performing `action_type|selector` on page `from`
    /// lands on page `to`.
    pub fn with_route(
        self,
        from: impl Into<String>,
        route_key: impl Into<String>,
        to: impl Into<String>,
    ) -> Self {
        self.state
            .lock()
            .routes
            .insert((from.into(), route_key.into()), to.into());
        self
    }

    /// Actions captured by `execute`, in order.
    pub fn executed_actions(&self) -> Vec<Action> {
        self.state.lock().executed.clone()
    }

    /// URLs passed to `navigate`, in order.
    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().navigations.clone()
    }

    /// Key of the page the mock is currently on.
    pub fn current_page(&self) -> Option<String> {
        self.state.lock().current.clone()
    }

    fn route_keys(action: &Action) -> [String; 2] {
        let base = format!(
            "{}|{}",
            action.action_type.as_str(),
            action.element_selector
        );
        let with_value = format!("{}|{}", base, action.value.as_deref().unwrap_or(""));
        [with_value, base]
    }
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrowserDriver for MockBrowser {
    async fn navigate(&self, url: &str) -> Result<(), ExploreError> {
        if self.config.fail_navigation {
            return Err(ExploreError::NavigationFailure {
                url: url.to_string(),
                reason: "scripted navigation failure".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.navigations.push(url.to_string());
        match state.urls.get(url).cloned() {
            Some(key) => {
                state.current = Some(key);
                Ok(())
            }
            None => Err(ExploreError::NavigationFailure {
                url: url.to_string(),
                reason: "no scripted page for URL".to_string(),
            }),
        }
    }

    async fn snapshot(&self) -> Result<PageSnapshot, ExploreError> {
        let state = self.state.lock();
        let key = state.current.as_ref().ok_or_else(|| ExploreError::NavigationFailure {
            url: String::new(),
            reason: "no page loaded".to_string(),
        })?;
        state
            .pages
            .get(key)
            .cloned()
            .ok_or_else(|| ExploreError::NavigationFailure {
                url: String::new(),
                reason: format!("unknown page key {key}"),
            })
    }

    async fn execute(&self, action: &Action) -> Result<(), ExploreError> {
        if self.config.stall_selectors.contains(&action.element_selector) {
            // Longer than any test timeout; the caller's tokio timeout fires first.
            tokio::time::sleep(Duration::from_secs(600)).await;
        }
        if self.config.fail_selectors.contains(&action.element_selector) {
            return Err(ExploreError::ActionExecutionFailed {
                selector: action.element_selector.clone(),
                reason: "scripted failure".to_string(),
            });
        }

        let mut state = self.state.lock();
        state.executed.push(action.clone());

        let current = match state.current.clone() {
            Some(c) => c,
            None => {
                return Err(ExploreError::ActionExecutionFailed {
                    selector: action.element_selector.clone(),
                    reason: "no page loaded".to_string(),
                })
            }
        };

        for route_key in Self::route_keys(action) {
            if let Some(dest) = state.routes.get(&(current.clone(), route_key)).cloned() {
                state.current = Some(dest);
                break;
            }
        }
        Ok(())
    }
}
