//! Core types for locator system

use action_primitives::{Condition, LabelQuery};
use serde::{Deserialize, Serialize};

/// How a candidate locates its element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocatorStrategy {
    /// Structural query
    Css,

    /// Visible text match
    Label,

    /// Nested chain
    Chain,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Css => "css",
            LocatorStrategy::Label => "label",
            LocatorStrategy::Chain => "chain",
        }
    }

    pub fn of(condition: &Condition) -> Self {
        match condition {
            Condition::Css(_) => LocatorStrategy::Css,
            Condition::Label(_) => LocatorStrategy::Label,
            Condition::AnyOf(_) => LocatorStrategy::Chain,
        }
    }
}

/// Ordered candidates for one logical control; the first that matches wins.
///
/// Any single candidate may be stale as the controlled markup drifts, so
/// chains are data rather than code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorChain {
    pub name: String,
    pub candidates: Vec<Condition>,
}

impl LocatorChain {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            candidates: Vec::new(),
        }
    }

    /// Chain of structural queries, in priority order.
    pub fn css<I, S>(name: impl Into<String>, selectors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            candidates: selectors
                .into_iter()
                .map(|s| Condition::Css(s.into()))
                .collect(),
        }
    }

    pub fn then(mut self, candidate: impl Into<Condition>) -> Self {
        self.candidates.push(candidate.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// The whole chain as one observable condition.
    pub fn to_condition(&self) -> Condition {
        match self.candidates.as_slice() {
            [single] => single.clone(),
            _ => Condition::AnyOf(self.candidates.clone()),
        }
    }
}

/// A label and the synonyms accepted in its place, tried in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LabelSet(Vec<String>);

impl LabelSet {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(labels.into_iter().map(Into::into).collect())
    }

    pub fn labels(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Label query over `tags` inside the region `within`.
    pub fn query<T>(&self, tags: &[T], within: Option<&str>) -> LabelQuery
    where
        T: AsRef<str>,
    {
        let query = LabelQuery::new(tags.iter().map(|t| t.as_ref().to_string()), self.0.clone());
        match within {
            Some(region) => query.within(region),
            None => query,
        }
    }
}

impl<S: Into<String>> FromIterator<S> for LabelSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Result of resolving a chain.
#[derive(Debug, Clone)]
pub struct ResolutionResult {
    pub element: dom_tree::Element,
    /// Zero-based index of the winning candidate
    pub candidate_index: usize,
    pub strategy: LocatorStrategy,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_candidate_chain_is_not_wrapped() {
        let chain = LocatorChain::css("settings", ["#calendarSetting"]);
        assert_eq!(chain.to_condition(), Condition::css("#calendarSetting"));

        let chain = chain.then(Condition::css(".fallback"));
        assert!(matches!(chain.to_condition(), Condition::AnyOf(ref c) if c.len() == 2));
    }

    #[test]
    fn label_set_builds_a_scoped_query() {
        let save: LabelSet = ["設定", "保存"].into_iter().collect();
        assert_eq!(save.labels(), ["設定", "保存"]);

        let query = save.query(&["button"], Some("calendarSetting"));
        assert_eq!(query.within.as_deref(), Some("calendarSetting"));
        assert_eq!(query.tags, vec!["button".to_string()]);
    }

    #[test]
    fn label_set_is_a_plain_list_on_the_wire() {
        let set: LabelSet = serde_json::from_str(r#"["全てを選択","全選択"]"#).unwrap();
        assert_eq!(set.labels().len(), 2);
    }
}
