//! Locator chains and label synonym sets
//!
//! Markup in the controlled application drifts, so every control is described
//! by an ordered list of candidate locators tried first-match-wins, and every
//! label by a set of accepted synonyms.

pub mod errors;
pub mod resolver;
pub mod types;

pub use errors::*;
pub use resolver::*;
pub use types::*;
