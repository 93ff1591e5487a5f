//! End-to-end run against the simulated scheduler page.

use anyhow::{Context, Result};
use clap::Args;
use extensions_bridge::{BridgeEvent, InjectionTracker, TransitionPhase};
use schedassist_core_types::ContextId;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::cli::context::CliContext;
use crate::cli::output::OutputFormat;
use crate::config::AssistConfig;
use crate::host::SimulatedBrowser;
use crate::simulator::PageState;

#[derive(Args, Clone, Debug, Default)]
pub struct DemoArgs {
    /// Group headings rendered on the settings surface (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<String>,

    /// Delay before the settings surface renders, e.g. "300ms"
    #[arg(long)]
    pub surface_delay: Option<humantime::Duration>,

    /// Activate every generated group control once after setup
    #[arg(long)]
    pub activate_groups: bool,

    /// Switch the meeting-room control on after setup
    #[arg(long)]
    pub toggle_resource: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupSummary {
    pub title: String,
    pub active: bool,
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct DemoSummary {
    pub context: String,
    pub injections: usize,
    pub styles: Vec<String>,
    pub groups: Vec<GroupSummary>,
    /// `None` when the meeting-room control was not created
    pub resource_active: Option<bool>,
    pub bridge_events: usize,
    pub page: PageState,
}

pub async fn cmd_demo(args: DemoArgs, ctx: &CliContext, output: OutputFormat) -> Result<()> {
    let summary = run_demo(ctx.config(), &args).await?;
    match output {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&summary)?),
        OutputFormat::Yaml => println!("{}", serde_yaml::to_string(&summary)?),
        OutputFormat::Human => print_summary(&summary),
    }
    Ok(())
}

/// Load the page, deliver the lifecycle notifications a browser sends for it
/// (completion twice), then optionally drive the generated controls.
pub async fn run_demo(config: &AssistConfig, args: &DemoArgs) -> Result<DemoSummary> {
    let mut page = config.demo.clone();
    if !args.groups.is_empty() {
        page.groups = args.groups.clone();
    }
    if let Some(delay) = args.surface_delay {
        page.surface_delay = delay.into();
    }

    let browser = SimulatedBrowser::new(config.automation_settings(), page);
    let (bus, mut events) = broadcast::channel(64);
    let tracker = InjectionTracker::new(config.injection.clone(), browser.clone(), bus);

    let state = config
        .injection
        .allow_prefixes
        .first()
        .cloned()
        .context("injection.allow_prefixes is empty")?;
    let context = ContextId(1);

    browser.navigate(context);
    tracker
        .on_context_transition(context, TransitionPhase::Navigating, &state)
        .await;
    for _ in 0..2 {
        let outcome = tracker
            .on_context_transition(context, TransitionPhase::Completed, &state)
            .await;
        info!(context = %context, ?outcome, "page load completed");
    }
    browser.settle(context).await;

    let runtime = browser
        .runtime(context)
        .context("no automation runtime was created")?;
    if args.activate_groups {
        for (index, control) in runtime.groups().controls().iter().enumerate() {
            runtime
                .groups()
                .activate(control.element(), index)
                .await
                .with_context(|| format!("activating group control {index}"))?;
        }
    }
    if args.toggle_resource {
        runtime
            .resource()
            .activate()
            .await
            .context("activating the meeting-room control")?;
    }

    let mut bridge_events = 0;
    while let Ok(event) = events.try_recv() {
        if let BridgeEvent::InjectionFailed { .. } = event {
            info!(?event, "injection failure reported");
        } else {
            debug!(?event, "bridge event");
        }
        bridge_events += 1;
    }

    let page = browser
        .page(context)
        .context("demo tab disappeared")?
        .state();
    let groups = runtime
        .groups()
        .controls()
        .iter()
        .enumerate()
        .map(|(index, control)| GroupSummary {
            title: control.element().text_content(),
            active: control.is_active(),
            visible: page.group_visible.get(index).copied().unwrap_or(false),
        })
        .collect();

    Ok(DemoSummary {
        context: context.to_string(),
        injections: browser.script_runs(context),
        styles: browser.styles(context),
        groups,
        resource_active: runtime.resource().control().map(|c| c.is_active()),
        bridge_events,
        page,
    })
}

fn print_summary(summary: &DemoSummary) {
    println!("Context {}", summary.context);
    println!(
        "  injections: {} (styles: {})",
        summary.injections,
        summary.styles.join(", ")
    );
    println!("  group controls:");
    for group in &summary.groups {
        println!(
            "    {:<16} active={:<5} visible={}",
            group.title, group.active, group.visible
        );
    }
    match summary.resource_active {
        Some(active) => println!("  meeting-room control: active={active}"),
        None => println!("  meeting-room control: not created"),
    }
    println!(
        "  surface opened {} time(s), {} settings commit(s), {} resource commit(s)",
        summary.page.surface_opens, summary.page.settings_commits, summary.page.resource_commits
    );
}
