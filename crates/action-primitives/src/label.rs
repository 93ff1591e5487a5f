//! Text-label lookup helpers
//!
//! The controlled application's structural classes churn, its visible labels
//! much less so. Matching is a case-sensitive substring test on the trimmed
//! text content.

use dom_tree::{Document, Element};

use crate::errors::ActionError;

/// Whether `text` contains any of `labels`.
pub fn includes_any_text<S: AsRef<str>>(text: &str, labels: &[S]) -> bool {
    labels.iter().any(|label| text.contains(label.as_ref()))
}

/// First descendant of `root` whose text contains a label.
///
/// Tag-major: every element of the first tag kind is tried before any element
/// of the second.
pub fn find_in_root<T, S>(root: Option<&Element>, tags: &[T], labels: &[S]) -> Option<Element>
where
    T: AsRef<str>,
    S: AsRef<str>,
{
    let root = root?;
    let descendants = root.descendants();
    for tag in tags {
        let tag = tag.as_ref();
        let hit = descendants
            .iter()
            .filter(|node| node.tag().eq_ignore_ascii_case(tag))
            .find(|node| includes_any_text(node.text_content().trim(), labels));
        if hit.is_some() {
            return hit.cloned();
        }
    }
    None
}

/// [`find_in_root`] over the region with the given id.
pub fn find_in_id<T, S>(doc: &Document, id: &str, tags: &[T], labels: &[S]) -> Option<Element>
where
    T: AsRef<str>,
    S: AsRef<str>,
{
    find_in_root(doc.get_element_by_id(id).as_ref(), tags, labels)
}

/// First `tag` element inside region `id` whose text contains `title`.
pub fn get_el(doc: &Document, id: &str, tag: &str, title: &str) -> Option<Element> {
    let parent = doc.get_element_by_id(id)?;
    parent
        .descendants()
        .into_iter()
        .filter(|node| node.tag().eq_ignore_ascii_case(tag))
        .find(|node| node.text_content().contains(title))
}

/// Where [`create_button`] inserts into its container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Placement {
    #[default]
    Append,
    Prepend,
}

/// Create a `<button>` labelled `label` inside `container`.
pub fn create_button(
    container: &Element,
    label: &str,
    placement: Placement,
) -> Result<Element, ActionError> {
    let doc = container
        .document()
        .ok_or_else(|| ActionError::Tree(format!("{container} has no document")))?;
    let button = doc.create_element("button");
    button.set_text(label);
    match placement {
        Placement::Append => container.append_child(&button)?,
        Placement::Prepend => container.prepend_child(&button)?,
    }
    Ok(button)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Document {
        let doc = Document::new();
        let region = doc.create_element("div");
        region.set_id("calendarSetting");
        doc.body().append_child(&region).unwrap();

        let tab = doc.create_element("a");
        tab.set_text("会議室");
        region.append_child(&tab).unwrap();

        let clear = doc.create_element("span");
        clear.set_text("選択を解除");
        region.append_child(&clear).unwrap();

        let reset = doc.create_element("button");
        reset.set_text("リセット");
        region.append_child(&reset).unwrap();
        doc
    }

    #[test]
    fn includes_any_text_is_substring_and_case_sensitive() {
        assert!(includes_any_text("全てを選択する", &["全てを選択"]));
        assert!(!includes_any_text("Save", &["save"]));
        assert!(!includes_any_text("anything", &[] as &[&str]));
    }

    #[test]
    fn find_in_root_is_tag_major() {
        let doc = settings();
        let labels = ["選択を解除", "リセット"];
        let hit = find_in_id(&doc, "calendarSetting", &["button", "span"], &labels).unwrap();
        assert_eq!(hit.tag(), "button");
        let hit = find_in_id(&doc, "calendarSetting", &["span", "button"], &labels).unwrap();
        assert_eq!(hit.tag(), "span");
    }

    #[test]
    fn missing_region_finds_nothing() {
        let doc = settings();
        assert!(find_in_id(&doc, "nope", &["a"], &["会議室"]).is_none());
        assert!(find_in_root(None, &["a"], &["会議室"]).is_none());
    }

    #[test]
    fn get_el_and_create_button() {
        let doc = settings();
        let region = doc.get_element_by_id("calendarSetting").unwrap();
        let first = create_button(&region, "日", Placement::Prepend).unwrap();
        assert_eq!(region.children()[0], first);
        assert_eq!(get_el(&doc, "calendarSetting", "button", "日"), Some(first));
        assert!(get_el(&doc, "missing", "button", "日").is_none());
    }
}
