pub mod app;
pub mod commands;
pub mod config;
pub mod context;
pub mod demo;
pub mod dispatch;
pub mod env;
pub mod output;
pub mod replay;
pub mod runtime;

pub use app::run;
pub use demo::{cmd_demo, run_demo, DemoArgs, DemoSummary, GroupSummary};
pub use replay::{cmd_replay, replay_script, ReplayArgs, ReplayReport, ReplayStep};
