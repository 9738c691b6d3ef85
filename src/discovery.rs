//! Action discovery: visible interactive elements and the candidate
//! actions they support.
//!
//! Selector derivation order is a core contract: replay resolves
//! elements by selector, so an unstable selector breaks path replay
//! even when state deduplication still works.

use crate::browser::{PageSnapshot, RawElement};
use crate::config::InputValueTable;
use crate::model::{Action, ActionType, ElementKind, InteractiveElement};

/// Maximum label length taken from element text content.
const MAX_LABEL_LEN: usize = 50;
/// Label used when no derivation source yields anything.
const UNKNOWN_LABEL: &str = "<unknown>";

/// Synthetic attribute carrying a select's option count, so action
/// generation stays a pure function of the element.
const OPTION_COUNT_ATTR: &str = "data-option-count";

/// Enumerate the visible interactive elements of a captured page.
pub fn discover_elements(snapshot: &PageSnapshot) -> Vec<InteractiveElement> {
    snapshot
        .elements
        .iter()
        .filter(|raw| is_visible(raw))
        .filter_map(|raw| {
            let kind = classify(raw)?;
            let mut attributes = raw.attributes.clone();
            if kind == ElementKind::Select {
                attributes.insert(OPTION_COUNT_ATTR.to_string(), raw.option_count.to_string());
            }
            Some(InteractiveElement {
                selector: derive_selector(raw),
                kind,
                label: derive_label(raw),
                tag_name: raw.tag_name.clone(),
                attributes,
            })
        })
        .collect()
}

/// Derive the candidate actions for one element.
pub fn actions_for(element: &InteractiveElement, values: &InputValueTable) -> Vec<Action> {
    match element.kind {
        ElementKind::Button | ElementKind::Link => vec![action(element, ActionType::Click, None)],
        ElementKind::Checkbox => vec![action(element, ActionType::Check, None)],
        ElementKind::Input => {
            let declared = element
                .attributes
                .get("type")
                .map(String::as_str)
                .unwrap_or("text");
            let value = values.value_for(declared).to_string();
            vec![action(element, ActionType::Input, Some(value))]
        }
        ElementKind::Select => {
            let option_count: usize = element
                .attributes
                .get(OPTION_COUNT_ATTR)
                .and_then(|v| v.parse().ok())
                .unwrap_or(0);
            if option_count < 2 {
                return Vec::new();
            }
            // Option index 1, never the currently-selected first option,
            // so the action is guaranteed to change the value.
            vec![action(element, ActionType::Select, Some("1".to_string()))]
        }
    }
}

fn action(element: &InteractiveElement, action_type: ActionType, value: Option<String>) -> Action {
    Action {
        action_type,
        element_selector: element.selector.clone(),
        element_label: element.label.clone(),
        value,
    }
}

/// Visibility filter: elements failing this are invisible to every
/// downstream stage.
pub fn is_visible(raw: &RawElement) -> bool {
    raw.display != "none"
        && raw.visibility != "hidden"
        && raw.opacity > 0.0
        && raw.width > 0.0
        && raw.height > 0.0
}

fn classify(raw: &RawElement) -> Option<ElementKind> {
    let input_type = raw.attr("type").unwrap_or("text").to_lowercase();
    match raw.tag_name.to_lowercase().as_str() {
        "button" => Some(ElementKind::Button),
        "a" => Some(ElementKind::Link),
        "select" => Some(ElementKind::Select),
        "textarea" => Some(ElementKind::Input),
        "input" => match input_type.as_str() {
            "checkbox" | "radio" => Some(ElementKind::Checkbox),
            "button" | "submit" | "reset" => Some(ElementKind::Button),
            "hidden" => None,
            _ => Some(ElementKind::Input),
        },
        _ => None,
    }
}

/// Selector priority: test identifier, then id, then name, then a
/// structural nth-of-type fallback.
pub fn derive_selector(raw: &RawElement) -> String {
    if let Some(testid) = non_empty(raw.attr("data-testid")) {
        return format!("[data-testid=\"{testid}\"]");
    }
    if let Some(id) = non_empty(raw.attr("id")) {
        return format!("#{id}");
    }
    if let Some(name) = non_empty(raw.attr("name")) {
        return format!("{}[name=\"{name}\"]", raw.tag_name.to_lowercase());
    }
    format!("{}:nth-of-type({})", raw.tag_name.to_lowercase(), raw.nth_of_type)
}

/// Label fallback chain: accessible label, title, trimmed text, value,
/// placeholder, else the unknown marker.
pub fn derive_label(raw: &RawElement) -> String {
    if let Some(label) = non_empty(raw.attr("aria-label")) {
        return label.to_string();
    }
    if let Some(title) = non_empty(raw.attr("title")) {
        return title.to_string();
    }
    let text = raw.text.trim();
    if !text.is_empty() {
        return text.chars().take(MAX_LABEL_LEN).collect();
    }
    if let Some(value) = non_empty(raw.attr("value")) {
        return value.to_string();
    }
    if let Some(placeholder) = non_empty(raw.attr("placeholder")) {
        return placeholder.to_string();
    }
    UNKNOWN_LABEL.to_string()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::PageSnapshot;

    #[test]
    fn test_visibility_filter() {
        assert!(is_visible(&RawElement::new("button")));
        assert!(!is_visible(&RawElement::new("button").hidden()));

        let mut invisible = RawElement::new("button");
        invisible.visibility = "hidden".to_string();
        assert!(!is_visible(&invisible));

        let mut transparent = RawElement::new("button");
        transparent.opacity = 0.0;
        assert!(!is_visible(&transparent));

        let mut zero_size = RawElement::new("button");
        zero_size.width = 0.0;
        assert!(!is_visible(&zero_size));
    }

    #[test]
    fn test_selector_priority() {
        let raw = RawElement::new("button")
            .with_attr("data-testid", "save")
            .with_attr("id", "save-btn")
            .with_attr("name", "save");
        assert_eq!(derive_selector(&raw), "[data-testid=\"save\"]");

        let raw = RawElement::new("button")
            .with_attr("id", "save-btn")
            .with_attr("name", "save");
        assert_eq!(derive_selector(&raw), "#save-btn");

        let raw = RawElement::new("input").with_attr("name", "email");
        assert_eq!(derive_selector(&raw), "input[name=\"email\"]");

        let raw = RawElement::new("button").with_nth_of_type(3);
        assert_eq!(derive_selector(&raw), "button:nth-of-type(3)");
    }

    #[test]
    fn test_label_fallback_chain() {
        let raw = RawElement::new("button")
            .with_attr("aria-label", "Save changes")
            .with_text("Save");
        assert_eq!(derive_label(&raw), "Save changes");

        let raw = RawElement::new("button").with_text("  Save  ");
        assert_eq!(derive_label(&raw), "Save");

        let raw = RawElement::new("input").with_attr("placeholder", "Your email");
        assert_eq!(derive_label(&raw), "Your email");

        let raw = RawElement::new("button");
        assert_eq!(derive_label(&raw), UNKNOWN_LABEL);
    }

    #[test]
    fn test_label_text_is_bounded() {
        let raw = RawElement::new("a").with_text("x".repeat(200));
        assert_eq!(derive_label(&raw).len(), MAX_LABEL_LEN);
    }

    #[test]
    fn test_hidden_elements_are_not_discovered() {
        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("button").with_attr("id", "visible"),
            RawElement::new("button").with_attr("id", "gone").hidden(),
            RawElement::new("input").with_attr("type", "hidden").with_attr("id", "csrf"),
        ]);
        let elements = discover_elements(&snapshot);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].selector, "#visible");
    }

    #[test]
    fn test_button_and_link_produce_click() {
        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("button").with_attr("id", "go"),
            RawElement::new("a").with_attr("id", "away"),
        ]);
        let table = InputValueTable::default();
        for element in discover_elements(&snapshot) {
            let actions = actions_for(&element, &table);
            assert_eq!(actions.len(), 1);
            assert_eq!(actions[0].action_type, ActionType::Click);
        }
    }

    #[test]
    fn test_input_value_from_table() {
        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("input").with_attr("type", "email").with_attr("id", "email")
        ]);
        let table = InputValueTable::default();
        let elements = discover_elements(&snapshot);
        let actions = actions_for(&elements[0], &table);
        assert_eq!(actions[0].action_type, ActionType::Input);
        assert_eq!(actions[0].value.as_deref(), Some("test@example.com"));
    }

    #[test]
    fn test_checkbox_is_toggle() {
        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("input").with_attr("type", "checkbox").with_attr("id", "done").checked(),
        ]);
        let table = InputValueTable::default();
        let elements = discover_elements(&snapshot);
        let actions = actions_for(&elements[0], &table);
        assert_eq!(actions[0].action_type, ActionType::Check);
        assert!(actions[0].value.is_none());
    }

    #[test]
    fn test_select_picks_second_option() {
        let table = InputValueTable::default();

        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("select").with_attr("id", "sort").with_options(3)
        ]);
        let elements = discover_elements(&snapshot);
        let actions = actions_for(&elements[0], &table);
        assert_eq!(actions.len(), 1);
        assert_eq!(actions[0].action_type, ActionType::Select);
        assert_eq!(actions[0].value.as_deref(), Some("1"));

        // A single-option select cannot change value; no action.
        let snapshot = PageSnapshot::new("http://app.test/", "page").with_elements(vec![
            RawElement::new("select").with_attr("id", "only").with_options(1)
        ]);
        let elements = discover_elements(&snapshot);
        assert!(actions_for(&elements[0], &table).is_empty());
    }
}
