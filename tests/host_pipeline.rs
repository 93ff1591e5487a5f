//! Lifecycle notifications through the tracker into the simulated browser.

use std::sync::Arc;

use extensions_bridge::{
    BridgeEvent, InjectionConfig, InjectionTracker, TransitionOutcome, TransitionPhase,
};
use schedassist_cli::{AssistConfig, PageOptions, SimulatedBrowser};
use schedassist_core_types::ContextId;
use tokio::sync::broadcast;

const PAGE: &str = "https://miyabi381.github.io/Scheduler-test.html";

fn pipeline() -> (
    Arc<SimulatedBrowser>,
    Arc<InjectionTracker>,
    broadcast::Receiver<BridgeEvent>,
) {
    let config = AssistConfig::default();
    let browser = SimulatedBrowser::new(config.automation_settings(), PageOptions::default());
    let (bus, events) = broadcast::channel(64);
    let tracker = InjectionTracker::new(InjectionConfig::default(), browser.clone(), bus);
    (browser, tracker, events)
}

#[tokio::test]
async fn repeated_completion_initializes_automation_once() {
    let (browser, tracker, _events) = pipeline();
    let ctx = ContextId(1);
    browser.navigate(ctx);

    tracker
        .on_context_transition(ctx, TransitionPhase::Navigating, PAGE)
        .await;
    tracker
        .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
        .await;
    let second = tracker
        .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
        .await;
    assert!(matches!(second, TransitionOutcome::Ignored(_)));
    browser.settle(ctx).await;

    assert_eq!(browser.script_runs(ctx), 1);
    assert_eq!(browser.styles(ctx), vec!["main.css".to_string()]);
    let runtime = browser.runtime(ctx).unwrap();
    assert_eq!(runtime.groups().controls().len(), 3);
    assert!(runtime.resource().control().is_some());

    let page = browser.page(ctx).unwrap();
    assert_eq!(
        page.document()
            .query_selector_all("#GroupViewToggleBottons > button")
            .unwrap()
            .len(),
        3
    );
}

#[tokio::test]
async fn navigation_between_completions_injects_into_the_new_page() {
    let (browser, tracker, _events) = pipeline();
    let ctx = ContextId(2);

    browser.navigate(ctx);
    tracker
        .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
        .await;
    browser.settle(ctx).await;
    let first = browser.runtime(ctx).unwrap();

    browser.navigate(ctx);
    tracker
        .on_context_transition(ctx, TransitionPhase::Navigating, PAGE)
        .await;
    let outcome = tracker
        .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
        .await;
    assert_eq!(outcome, TransitionOutcome::Injected { failures: 0 });
    browser.settle(ctx).await;

    let second = browser.runtime(ctx).unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(first.is_shut_down());
    assert_eq!(second.groups().controls().len(), 3);
}

#[tokio::test]
async fn injection_into_a_closed_tab_is_reported() {
    let (browser, tracker, mut events) = pipeline();
    let ctx = ContextId(3);

    let outcome = tracker
        .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
        .await;
    assert_eq!(outcome, TransitionOutcome::Injected { failures: 2 });
    assert!(browser.runtime(ctx).is_none());

    let mut failures = 0;
    while let Ok(event) = events.try_recv() {
        if matches!(event, BridgeEvent::InjectionFailed { .. }) {
            failures += 1;
        }
    }
    assert_eq!(failures, 2);
}
