//! Error types for the element tree

use thiserror::Error;

/// Selector parse failures. Matching itself never fails.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectorError {
    #[error("empty selector")]
    Empty,

    #[error("unsupported selector: {0}")]
    Unsupported(String),
}

/// Tree manipulation failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomError {
    /// The insertion would make a node its own ancestor
    #[error("hierarchy request error: {0}")]
    HierarchyRequest(String),

    /// The node belongs to another document
    #[error("wrong document: {0}")]
    WrongDocument(String),

    /// The document owning the node has been dropped
    #[error("document detached")]
    DocumentGone,
}
