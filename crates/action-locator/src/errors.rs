//! Error types for locator system

use action_primitives::ActionError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone)]
pub enum LocatorError {
    /// No candidate matched
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    /// A chain with no candidates cannot match anything
    #[error("Empty locator chain: {0}")]
    EmptyChain(String),

    /// A candidate could not be evaluated
    #[error("Invalid locator in '{chain}': {reason}")]
    InvalidLocator { chain: String, reason: String },

    /// Waiting for the chain failed
    #[error(transparent)]
    Wait(#[from] ActionError),
}

impl LocatorError {
    /// Check if error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            LocatorError::ElementNotFound(_) => true,
            LocatorError::Wait(inner) => inner.is_retryable(),
            _ => false,
        }
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::EmptyChain(_) | LocatorError::InvalidLocator { .. } => 2,
            LocatorError::ElementNotFound(_) => 1,
            LocatorError::Wait(inner) => inner.severity(),
        }
    }
}
