//! Error types for action primitives

use dom_tree::{DomError, SelectorError};
use thiserror::Error;

/// Errors surfaced by observation and interaction.
///
/// `Clone` because one observation outcome is handed to every caller sharing it.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActionError {
    /// An awaited condition never became true within budget
    #[error("{condition} : Timeout after {timeout_ms}ms")]
    Timeout { condition: String, timeout_ms: u64 },

    /// Evaluating the condition itself failed (malformed selector)
    #[error("Invalid condition: {0}")]
    InvalidCondition(String),

    /// An action was asked to operate on no element
    #[error("Missing target: {0}")]
    MissingTarget(String),

    /// The tree rejected a structural change
    #[error("Tree operation failed: {0}")]
    Tree(String),
}

impl ActionError {
    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(self, ActionError::Timeout { .. } | ActionError::MissingTarget(_))
    }

    /// Get error severity level (1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            ActionError::Tree(_) => 3,
            ActionError::InvalidCondition(_) => 2,
            ActionError::Timeout { .. } | ActionError::MissingTarget(_) => 1,
        }
    }
}

impl From<SelectorError> for ActionError {
    fn from(err: SelectorError) -> Self {
        ActionError::InvalidCondition(err.to_string())
    }
}

impl From<DomError> for ActionError {
    fn from(err: DomError) -> Self {
        ActionError::Tree(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_message_names_the_condition() {
        let err = ActionError::Timeout {
            condition: "#calendarSetting".into(),
            timeout_ms: 3000,
        };
        assert_eq!(err.to_string(), "#calendarSetting : Timeout after 3000ms");
        assert!(err.is_retryable());
    }

    #[test]
    fn selector_errors_become_invalid_condition() {
        let err: ActionError = SelectorError::Unsupported(":hover".into()).into();
        assert!(matches!(err, ActionError::InvalidCondition(_)));
        assert!(!err.is_retryable());
        assert_eq!(err.severity(), 2);
    }
}
