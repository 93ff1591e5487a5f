use clap::Subcommand;

use super::config::ConfigArgs;
use super::demo::DemoArgs;
use super::replay::ReplayArgs;

#[derive(Subcommand, Clone)]
pub enum Commands {
    /// Run the automation against the simulated scheduler page
    Demo(DemoArgs),

    /// Feed a lifecycle transition script through the injection tracker
    Replay(ReplayArgs),

    /// Inspect or validate the configuration
    Config(ConfigArgs),
}
