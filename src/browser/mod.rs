//! Browser driver boundary.
//!
//! The driver owns all DOM access: it navigates, captures structural
//! page snapshots, and performs element interactions. Everything
//! downstream of the snapshot (discovery, identity, graph, engines) is
//! pure and driver-agnostic, which is what makes the core testable
//! against [`mock::MockBrowser`].

pub mod mock;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::ExploreError;
use crate::model::Action;

/// Raw structural capture of one DOM element, as evaluated in-page.
#[derive(Debug, Clone)]
pub struct RawElement {
    pub tag_name: String,
    pub attributes: BTreeMap<String, String>,
    pub text: String,
    /// Computed `display` style.
    pub display: String,
    /// Computed `visibility` style.
    pub visibility: String,
    /// Computed opacity.
    pub opacity: f64,
    /// Rendered size.
    pub width: f64,
    pub height: f64,
    pub checked: bool,
    pub disabled: bool,
    /// Number of options for `select` elements; zero otherwise.
    pub option_count: usize,
    /// 1-based position among same-tag siblings, for the structural
    /// selector fallback.
    pub nth_of_type: usize,
}

impl RawElement {
    /// A visible element with sensible defaults. Primarily a test and
    /// driver-implementation convenience.
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            attributes: BTreeMap::new(),
            text: String::new(),
            display: "block".to_string(),
            visibility: "visible".to_string(),
            opacity: 1.0,
            width: 100.0,
            height: 24.0,
            checked: false,
            disabled: false,
            option_count: 0,
            nth_of_type: 1,
        }
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_options(mut self, option_count: usize) -> Self {
        self.option_count = option_count;
        self
    }

    pub fn with_nth_of_type(mut self, nth: usize) -> Self {
        self.nth_of_type = nth;
        self
    }

    pub fn checked(mut self) -> Self {
        self.checked = true;
        self
    }

    pub fn hidden(mut self) -> Self {
        self.display = "none".to_string();
        self
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// Structural capture of the current page.
#[derive(Debug, Clone)]
pub struct PageSnapshot {
    pub url: String,
    /// Short human-readable description of the page content.
    pub description: String,
    pub elements: Vec<RawElement>,
    /// Count of visible list items, one of the two scalar fingerprint
    /// summaries.
    pub list_item_count: usize,
    /// Active filter/selection marker text, if the page has one.
    pub active_marker: Option<String>,
}

impl PageSnapshot {
    pub fn new(url: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            description: description.into(),
            elements: Vec::new(),
            list_item_count: 0,
            active_marker: None,
        }
    }

    pub fn with_elements(mut self, elements: Vec<RawElement>) -> Self {
        self.elements = elements;
        self
    }

    pub fn with_list_items(mut self, count: usize) -> Self {
        self.list_item_count = count;
        self
    }

    pub fn with_active_marker(mut self, marker: impl Into<String>) -> Self {
        self.active_marker = Some(marker.into());
        self
    }
}

/// Browser automation collaborator.
///
/// Implementations wrap a real automation backend (CDP, Playwright,
/// WebDriver). `navigate` must resolve only once the page is
/// network-idle; `execute` is responsible for element-level waits and
/// for deciding whether an input action should submit its enclosing
/// form after filling.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate to a URL, resolving once the page has settled.
    async fn navigate(&self, url: &str) -> Result<(), ExploreError>;

    /// Capture a structural snapshot of the current page.
    async fn snapshot(&self) -> Result<PageSnapshot, ExploreError>;

    /// Perform one action against the current page.
    async fn execute(&self, action: &Action) -> Result<(), ExploreError>;
}
