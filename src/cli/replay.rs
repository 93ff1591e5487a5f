//! Replay a recorded sequence of tab lifecycle transitions.
//!
//! The script is a JSON array of steps such as
//! `{"context": 1, "phase": "completed", "state": "https://..."}`; the phase is
//! one of `navigating`, `completed`, `discarded` or `removed`.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use extensions_bridge::{InjectionTracker, TransitionOutcome, TransitionPhase};
use schedassist_core_types::ContextId;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;
use crate::config::AssistConfig;
use crate::host::SimulatedBrowser;

#[derive(Args, Clone, Debug)]
pub struct ReplayArgs {
    /// JSON file holding the transition steps
    pub script: PathBuf,

    /// Wait for each tab's automation to finish initializing after an injection
    #[arg(long)]
    pub settle: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplayStep {
    pub context: u64,
    #[serde(flatten)]
    pub event: ReplayEvent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum ReplayEvent {
    Navigating {
        #[serde(default)]
        state: String,
    },
    Completed {
        state: String,
    },
    Discarded,
    Removed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub steps: usize,
    pub injections: usize,
    pub ignored: usize,
    /// Failed host calls across all injections
    pub host_failures: usize,
    pub per_context: BTreeMap<u64, usize>,
}

pub async fn cmd_replay(args: ReplayArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let raw = fs::read_to_string(&args.script)
        .await
        .with_context(|| format!("reading {}", args.script.display()))?;
    let steps: Vec<ReplayStep> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", args.script.display()))?;

    let report = replay_script(&steps, ctx.config(), args.settle).await;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&report)?),
        OutputFormat::Human => {
            println!(
                "{} steps: {} injections, {} ignored completions, {} failed host calls",
                report.steps, report.injections, report.ignored, report.host_failures
            );
            for (context, count) in &report.per_context {
                println!("  ctx#{context}: {count} injection(s)");
            }
        }
    }
    Ok(())
}

/// Drive the steps through an injection tracker backed by the simulated browser.
pub async fn replay_script(steps: &[ReplayStep], config: &AssistConfig, settle: bool) -> ReplayReport {
    let browser = SimulatedBrowser::new(config.automation_settings(), config.demo.clone());
    let (bus, _) = broadcast::channel(64);
    let tracker = InjectionTracker::new(config.injection.clone(), browser.clone(), bus);

    let mut report = ReplayReport::default();
    for step in steps {
        report.steps += 1;
        let context = ContextId(step.context);
        match &step.event {
            ReplayEvent::Navigating { state } => {
                browser.navigate(context);
                tracker
                    .on_context_transition(context, TransitionPhase::Navigating, state)
                    .await;
            }
            ReplayEvent::Completed { state } => {
                if browser.page(context).is_none() {
                    browser.navigate(context);
                }
                let outcome = tracker
                    .on_context_transition(context, TransitionPhase::Completed, state)
                    .await;
                debug!(context = %context, ?outcome, "completion replayed");
                match outcome {
                    TransitionOutcome::Injected { failures } => {
                        report.injections += 1;
                        report.host_failures += usize::from(failures);
                        *report.per_context.entry(step.context).or_default() += 1;
                        if settle {
                            browser.settle(context).await;
                        }
                    }
                    TransitionOutcome::Ignored(_) => report.ignored += 1,
                    TransitionOutcome::Cleared | TransitionOutcome::MarkedDiscarded => {}
                }
            }
            ReplayEvent::Discarded => {
                tracker
                    .on_context_transition(context, TransitionPhase::Discarded, "")
                    .await;
            }
            ReplayEvent::Removed => {
                tracker.on_context_removed(context);
                browser.close_tab(context);
            }
        }
    }

    info!(
        steps = report.steps,
        injections = report.injections,
        "replay finished"
    );
    report
}
