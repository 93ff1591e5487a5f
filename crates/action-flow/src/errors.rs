//! Flow execution error types

use action_locator::LocatorError;
use action_primitives::ActionError;
use thiserror::Error;

/// Flow execution errors
#[derive(Debug, Error, Clone)]
pub enum FlowError {
    /// A stage inside a flow rejected
    #[error("Stage '{stage}' failed: {source}")]
    StageFailed {
        stage: String,
        #[source]
        source: ActionError,
    },

    /// Locating a control failed
    #[error("Locator error in stage '{stage}': {source}")]
    Locator {
        stage: String,
        #[source]
        source: LocatorError,
    },

    /// The lookup tables cannot drive the flows
    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),
}

impl FlowError {
    pub fn stage(&self) -> Option<&str> {
        match self {
            FlowError::StageFailed { stage, .. } | FlowError::Locator { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

/// Attach a stage name to primitive failures.
pub trait StageExt<T> {
    fn stage(self, stage: &str) -> Result<T, FlowError>;
}

impl<T> StageExt<T> for Result<T, ActionError> {
    fn stage(self, stage: &str) -> Result<T, FlowError> {
        self.map_err(|source| FlowError::StageFailed {
            stage: stage.to_string(),
            source,
        })
    }
}

impl<T> StageExt<T> for Result<T, LocatorError> {
    fn stage(self, stage: &str) -> Result<T, FlowError> {
        self.map_err(|source| FlowError::Locator {
            stage: stage.to_string(),
            source,
        })
    }
}
