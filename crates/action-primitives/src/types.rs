//! Core data types for action primitives

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dom_tree::Element;
use serde::{Deserialize, Serialize};

use crate::errors::ActionError;
use crate::label::{find_in_id, find_in_root};

/// Text-label lookup restricted to a set of tag kinds.
///
/// `within` names an id-scoped region of the document; without it the lookup
/// runs over the wait scope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LabelQuery {
    #[serde(default)]
    pub within: Option<String>,
    pub tags: Vec<String>,
    pub labels: Vec<String>,
}

impl LabelQuery {
    pub fn new<T, L>(tags: T, labels: L) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        L: IntoIterator,
        L::Item: Into<String>,
    {
        Self {
            within: None,
            tags: tags.into_iter().map(Into::into).collect(),
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    pub fn within(mut self, region_id: impl Into<String>) -> Self {
        self.within = Some(region_id.into());
        self
    }
}

/// Predicate evaluated against a scope element.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Structural query
    Css(String),

    /// Text-label match
    Label(LabelQuery),

    /// Priority-ordered candidates; the first one that matches wins
    AnyOf(Vec<Condition>),
}

impl Condition {
    pub fn css(selector: impl Into<String>) -> Self {
        Condition::Css(selector.into())
    }

    /// Evaluate once. `Ok(None)` means "not yet".
    pub fn evaluate(&self, scope: &Element) -> Result<Option<Element>, ActionError> {
        match self {
            Condition::Css(selector) => Ok(scope.query_selector(selector)?),
            Condition::Label(query) => match &query.within {
                Some(region) => {
                    let Some(doc) = scope.document() else {
                        return Ok(None);
                    };
                    Ok(find_in_id(&doc, region, &query.tags, &query.labels))
                }
                None => Ok(find_in_root(Some(scope), &query.tags, &query.labels)),
            },
            Condition::AnyOf(candidates) => {
                for candidate in candidates {
                    if let Some(found) = candidate.evaluate(scope)? {
                        return Ok(Some(found));
                    }
                }
                Ok(None)
            }
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::Css(selector) => write!(f, "{selector}"),
            Condition::Label(query) => {
                write!(f, "label[{}]", query.tags.join("|"))?;
                if let Some(region) = &query.within {
                    write!(f, " in #{region}")?;
                }
                write!(f, " ~ {}", query.labels.join("|"))
            }
            Condition::AnyOf(candidates) => {
                let parts: Vec<String> = candidates.iter().map(ToString::to_string).collect();
                write!(f, "any({})", parts.join(" ; "))
            }
        }
    }
}

impl From<LabelQuery> for Condition {
    fn from(query: LabelQuery) -> Self {
        Condition::Label(query)
    }
}

/// What an interaction operates on.
#[derive(Debug, Clone)]
pub enum Target {
    /// Already resolved element
    Element(Element),

    /// Wait for the condition first, then act on the match
    Condition(Condition),
}

impl From<Element> for Target {
    fn from(element: Element) -> Self {
        Target::Element(element)
    }
}

impl From<&Element> for Target {
    fn from(element: &Element) -> Self {
        Target::Element(element.clone())
    }
}

impl From<Condition> for Target {
    fn from(condition: Condition) -> Self {
        Target::Condition(condition)
    }
}

/// One observation request. Scope defaults to the document element, timeout to
/// the observer's low-level budget.
#[derive(Debug, Clone)]
pub struct WaitRequest {
    pub condition: Condition,
    pub scope: Option<Element>,
    pub timeout: Option<Duration>,
}

impl WaitRequest {
    pub fn new(condition: impl Into<Condition>) -> Self {
        Self {
            condition: condition.into(),
            scope: None,
            timeout: None,
        }
    }

    pub fn css(selector: impl Into<String>) -> Self {
        Self::new(Condition::Css(selector.into()))
    }

    pub fn in_scope(mut self, scope: Element) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Wait budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObserverConfig {
    /// Budget for low-level waits
    pub wait_timeout_ms: u64,

    /// Budget for flow-level waits
    pub flow_timeout_ms: u64,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 3_000,
            flow_timeout_ms: 12_000,
        }
    }
}

impl ObserverConfig {
    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn flow_timeout(&self) -> Duration {
        Duration::from_millis(self.flow_timeout_ms)
    }
}

/// Outcome of one synthetic click.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClickReport {
    /// Unique identifier for this action
    pub action_id: String,

    /// Display form of the clicked element
    pub element: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub started_at: DateTime<Utc>,

    /// Time spent waiting for the target plus dispatch
    pub latency_ms: u64,

    /// Listener invocations across the three signals
    pub listeners_invoked: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use dom_tree::Document;

    #[test]
    fn any_of_respects_priority() {
        let doc = Document::new();
        let a = doc.create_element("button");
        a.set_class_name("fc-showScheduleOfOtherMember-button");
        let b = doc.create_element("button");
        b.set_attr("data-original-title", "一覧表示");
        doc.body().append_child(&a).unwrap();
        doc.body().append_child(&b).unwrap();

        let condition = Condition::AnyOf(vec![
            Condition::css("[data-original-title='一覧表示']"),
            Condition::css(".fc-showScheduleOfOtherMember-button"),
        ]);
        assert_eq!(condition.evaluate(&doc.root()).unwrap(), Some(b));
    }

    #[test]
    fn label_condition_scoped_to_region() {
        let doc = Document::new();
        let outside = doc.create_element("button");
        outside.set_text("保存");
        let region = doc.create_element("div");
        region.set_id("calendarSetting");
        let inside = doc.create_element("button");
        inside.set_text(" 設定 ");
        region.append_child(&inside).unwrap();
        doc.body().append_child(&outside).unwrap();
        doc.body().append_child(&region).unwrap();

        let query = LabelQuery::new(["button"], ["設定", "保存"]).within("calendarSetting");
        let condition = Condition::from(query);
        assert_eq!(condition.evaluate(&doc.root()).unwrap(), Some(inside));
        assert_eq!(
            condition.to_string(),
            "label[button] in #calendarSetting ~ 設定|保存"
        );
    }

    #[test]
    fn malformed_selector_is_invalid_condition() {
        let doc = Document::new();
        let err = Condition::css("div >").evaluate(&doc.root()).unwrap_err();
        assert!(matches!(err, ActionError::InvalidCondition(_)));
    }
}
