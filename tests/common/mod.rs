#![allow(dead_code)]

use std::time::Duration;

use statescout::browser::mock::MockBrowser;
use statescout::{ExplorerConfig, PageSnapshot, RawElement};

pub const APP_URL: &str = "http://app.test/";

pub fn button(id: &str, label: &str) -> RawElement {
    RawElement::new("button")
        .with_attr("id", id)
        .with_text(label)
}

/// Config tuned for tests: no settle wait worth speaking of, short
/// action timeout.
pub fn fast_config() -> ExplorerConfig {
    ExplorerConfig::default()
        .with_settle_delay(Duration::from_millis(1))
        .with_action_timeout(Duration::from_secs(1))
}

/// Two-view filter app at a single URL. Clicking "Active" on the home
/// view lands on a filtered view distinguished only by its scalar
/// summaries; "All" leads back. Both views expose the same buttons.
pub fn filter_app() -> MockBrowser {
    let buttons = || vec![button("filter-active", "Active"), button("filter-all", "All")];
    let home = PageSnapshot::new(APP_URL, "task list")
        .with_elements(buttons())
        .with_list_items(3);
    let active = PageSnapshot::new(APP_URL, "task list, active only")
        .with_elements(buttons())
        .with_list_items(2)
        .with_active_marker("active");

    MockBrowser::new()
        .with_page("home", home)
        .with_page("active", active)
        .with_route("home", "click|#filter-active", "active")
        .with_route("active", "click|#filter-all", "home")
}

/// Three-level app: home -> level one -> level two, one button per hop.
pub fn three_level_app() -> MockBrowser {
    let home =
        PageSnapshot::new(APP_URL, "home").with_elements(vec![button("to-one", "Level one")]);
    let one = PageSnapshot::new(APP_URL, "level one")
        .with_elements(vec![button("to-two", "Level two")]);
    let two = PageSnapshot::new(APP_URL, "level two").with_list_items(5);

    MockBrowser::new()
        .with_page("home", home)
        .with_page("one", one)
        .with_page("two", two)
        .with_route("home", "click|#to-one", "one")
        .with_route("one", "click|#to-two", "two")
}
