//! schedassist library
//!
//! Configuration, the simulated scheduler page and browser host, and the CLI.

pub mod cli;
pub mod config;
pub mod host;
pub mod simulator;

pub use config::{AssistConfig, ConfigError};
pub use host::{RuntimeHandler, SimulatedBrowser};
pub use simulator::{PageOptions, PageState, ResourceSelection, SchedulerPage};
