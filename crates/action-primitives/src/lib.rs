//! Action primitives: element observation and synthetic interaction
//!
//! This crate provides the building blocks every automation flow is made of:
//! - an element observer that deduplicates identical concurrent waits
//! - the click primitive (press, release, activate), optionally waiting first
//! - text-label lookup helpers for markup whose classes are unstable

mod click;
pub mod errors;
pub mod label;
mod observer;
mod primitives;
pub mod types;

pub use click::*;
pub use errors::*;
pub use label::*;
pub use observer::*;
pub use primitives::*;
pub use types::*;
