//! Cross-context message intake.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use schedassist_core_types::ContextId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::BridgeError;

/// Messages the host forwards to the core.
///
/// Only `InitializeAutomation` is acted on here; the traversal and download
/// triggers belong to other content scripts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum BridgeMessage {
    BeginTraversal(Value),
    BeginSinglePass(Value),
    BeginBatchDownload(Value),
    InitializeAutomation,
}

impl BridgeMessage {
    pub fn parse(kind: &str, payload: Value) -> Result<Self, BridgeError> {
        match kind {
            "begin_traversal" => Ok(Self::BeginTraversal(payload)),
            "begin_single_pass" => Ok(Self::BeginSinglePass(payload)),
            "begin_batch_download" => Ok(Self::BeginBatchDownload(payload)),
            "initialize_automation" => Ok(Self::InitializeAutomation),
            other => Err(BridgeError::UnknownMessage(other.to_string())),
        }
    }

    /// Parse a `{"type": ..., "payload": ...}` envelope.
    pub fn from_json(envelope: &Value) -> Result<Self, BridgeError> {
        let kind = envelope
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| BridgeError::MalformedMessage("missing string `type`".into()))?;
        let payload = envelope.get("payload").cloned().unwrap_or(Value::Null);
        Self::parse(kind, payload)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::BeginTraversal(_) => "begin_traversal",
            Self::BeginSinglePass(_) => "begin_single_pass",
            Self::BeginBatchDownload(_) => "begin_batch_download",
            Self::InitializeAutomation => "initialize_automation",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageAck {
    Handled,
    NotHandled,
}

/// Receiver of the "initialize automation" signal for one context.
#[async_trait]
pub trait AutomationHandler: Send + Sync {
    async fn initialize_automation(&self, context: ContextId) -> Result<(), BridgeError>;
}

#[derive(Default)]
pub struct MessageRouter {
    handlers: DashMap<ContextId, Arc<dyn AutomationHandler>>,
}

impl MessageRouter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn register(&self, context: ContextId, handler: Arc<dyn AutomationHandler>) {
        debug!(context = %context, "automation handler registered");
        self.handlers.insert(context, handler);
    }

    pub fn unregister(&self, context: ContextId) -> bool {
        self.handlers.remove(&context).is_some()
    }

    pub fn is_registered(&self, context: ContextId) -> bool {
        self.handlers.contains_key(&context)
    }

    pub async fn on_message(
        &self,
        context: ContextId,
        message: BridgeMessage,
    ) -> Result<MessageAck, BridgeError> {
        match message {
            BridgeMessage::InitializeAutomation => {
                // clone out so no map guard is held across the await
                let handler = self
                    .handlers
                    .get(&context)
                    .map(|entry| entry.value().clone())
                    .ok_or(BridgeError::NoHandler(context))?;
                info!(context = %context, "initialize automation");
                handler.initialize_automation(context).await?;
                Ok(MessageAck::Handled)
            }
            other => {
                debug!(context = %context, kind = other.kind(), "message left to other scripts");
                Ok(MessageAck::NotHandled)
            }
        }
    }
}
