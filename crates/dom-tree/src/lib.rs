//! In-memory UI element tree.
//!
//! Stands in for the controlled application's page: a tree of reference-counted
//! element nodes that can be queried with structural selectors, receive
//! synthetic interaction events, and publish a mutation record on the document
//! bus for every structural, attribute or text change.

pub mod errors;
pub mod events;
mod node;
pub mod selector;

pub use errors::*;
pub use events::*;
pub use node::*;
pub use selector::Selector;
