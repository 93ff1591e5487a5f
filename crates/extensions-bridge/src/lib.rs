//! Host bridge for the schedassist automation layer.
//!
//! Two intakes from the hosting browser land here: tab lifecycle transitions,
//! which drive the [`InjectionTracker`], and cross-context messages, which the
//! [`MessageRouter`] hands to the automation of the addressed context.

pub mod config;
pub mod messages;
pub mod tracker;

use async_trait::async_trait;
use schedassist_core_types::ContextId;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

pub use config::InjectionConfig;
pub use messages::{AutomationHandler, BridgeMessage, MessageAck, MessageRouter};
pub use tracker::{IgnoreReason, InjectionTracker, TransitionOutcome, TransitionPhase};

/// Errors surfaced by the bridge.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum BridgeError {
    #[error("host injection failed: {0}")]
    Host(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("unknown message type: {0}")]
    UnknownMessage(String),
    #[error("malformed message: {0}")]
    MalformedMessage(String),
    #[error("unknown lifecycle phase: {0}")]
    UnknownPhase(String),
    #[error("no automation registered for {0}")]
    NoHandler(ContextId),
    #[error("handler for {expected} received a message for {actual}")]
    ContextMismatch {
        expected: ContextId,
        actual: ContextId,
    },
}

/// Which half of the injection plan a host call belonged to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjectionStage {
    Styles,
    Scripts,
}

/// Why a per-context record went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClearReason {
    Navigating,
    Removed,
}

pub type BridgeEventBus = broadcast::Sender<BridgeEvent>;

/// Events emitted by the bridge to observers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BridgeEvent {
    InjectionStarted {
        context: ContextId,
        state: String,
    },
    InjectionFailed {
        context: ContextId,
        stage: InjectionStage,
        error: String,
    },
    RecordCleared {
        context: ContextId,
        reason: ClearReason,
    },
}

/// Script/style injection capability of the host.
#[async_trait]
pub trait InjectionHost: Send + Sync {
    async fn insert_styles(&self, context: ContextId, files: &[String])
        -> Result<(), BridgeError>;
    async fn execute_scripts(
        &self,
        context: ContextId,
        files: &[String],
    ) -> Result<(), BridgeError>;
}
