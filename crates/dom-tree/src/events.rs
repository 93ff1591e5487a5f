//! Mutation records and synthetic interaction events

use std::fmt;
use std::sync::Arc;

use schedassist_core_types::NodeKey;

use crate::node::{Element, WeakElement};

/// What changed on the mutation target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

/// One change notification. The target is held weakly so a queued record never
/// keeps a removed subtree alive.
#[derive(Clone)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target_key: NodeKey,
    pub target: WeakElement,
}

impl MutationRecord {
    pub fn target(&self) -> Option<Element> {
        self.target.upgrade()
    }
}

impl fmt::Debug for MutationRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutationRecord")
            .field("kind", &self.kind)
            .field("target", &self.target_key)
            .finish()
    }
}

/// Flags used when dispatching a synthetic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EventInit {
    pub bubbles: bool,
    pub cancelable: bool,
}

impl Default for EventInit {
    fn default() -> Self {
        Self {
            bubbles: true,
            cancelable: true,
        }
    }
}

/// Event delivered to listeners. `current_target` is the node whose listener is
/// running; it differs from `target` while bubbling.
#[derive(Debug, Clone)]
pub struct DomEvent {
    pub event_type: String,
    pub init: EventInit,
    pub target: Element,
    pub current_target: Element,
}

pub type Listener = Arc<dyn Fn(&DomEvent) + Send + Sync>;
