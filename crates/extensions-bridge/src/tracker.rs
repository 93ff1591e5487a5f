//! Per-context injection dedup.
//!
//! Completion notifications for one page view can arrive more than once. The
//! tracker remembers the last injected state per context and only injects
//! again after a navigation clears it.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use schedassist_core_types::ContextId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{is_web_scheme, InjectionConfig};
use crate::{
    BridgeError, BridgeEvent, BridgeEventBus, ClearReason, InjectionHost, InjectionStage,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionPhase {
    Navigating,
    Completed,
    Discarded,
}

impl FromStr for TransitionPhase {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "navigating" | "loading" => Ok(Self::Navigating),
            "completed" | "complete" => Ok(Self::Completed),
            "discarded" => Ok(Self::Discarded),
            other => Err(BridgeError::UnknownPhase(other.to_string())),
        }
    }
}

impl fmt::Display for TransitionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Navigating => "navigating",
            Self::Completed => "completed",
            Self::Discarded => "discarded",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IgnoreReason {
    Discarded,
    NotWeb,
    NotTargeted,
    AlreadyInjected,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionOutcome {
    Cleared,
    MarkedDiscarded,
    Ignored(IgnoreReason),
    /// Both host calls were attempted; `failures` of them failed
    Injected { failures: u8 },
}

pub struct InjectionTracker {
    config: InjectionConfig,
    host: Arc<dyn InjectionHost>,
    events: BridgeEventBus,
    records: DashMap<ContextId, String>,
    discarded: DashSet<ContextId>,
}

impl InjectionTracker {
    pub fn new(
        config: InjectionConfig,
        host: Arc<dyn InjectionHost>,
        events: BridgeEventBus,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            host,
            events,
            records: DashMap::new(),
            discarded: DashSet::new(),
        })
    }

    pub fn config(&self) -> &InjectionConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BridgeEvent> {
        self.events.subscribe()
    }

    /// State last injected into `context`, if any.
    pub fn record(&self, context: ContextId) -> Option<String> {
        self.records.get(&context).map(|entry| entry.value().clone())
    }

    pub fn is_discarded(&self, context: ContextId) -> bool {
        self.discarded.contains(&context)
    }

    pub fn tracked_contexts(&self) -> usize {
        self.records.len()
    }

    pub async fn on_context_transition(
        &self,
        context: ContextId,
        phase: TransitionPhase,
        state: &str,
    ) -> TransitionOutcome {
        match phase {
            TransitionPhase::Navigating => {
                self.discarded.remove(&context);
                self.clear(context, ClearReason::Navigating);
                TransitionOutcome::Cleared
            }
            TransitionPhase::Discarded => {
                debug!(context = %context, "context discarded");
                self.discarded.insert(context);
                TransitionOutcome::MarkedDiscarded
            }
            TransitionPhase::Completed => match self.claim(context, state) {
                Err(reason) => {
                    debug!(context = %context, state, ?reason, "completion ignored");
                    TransitionOutcome::Ignored(reason)
                }
                Ok(()) => TransitionOutcome::Injected {
                    failures: self.inject(context, state).await,
                },
            },
        }
    }

    pub fn on_context_removed(&self, context: ContextId) {
        self.discarded.remove(&context);
        self.clear(context, ClearReason::Removed);
    }

    /// Record `state` for `context` unless the completion must be ignored.
    /// Nothing here suspends, so the record is whole before any host call.
    fn claim(&self, context: ContextId, state: &str) -> Result<(), IgnoreReason> {
        if self.discarded.contains(&context) {
            return Err(IgnoreReason::Discarded);
        }
        match Url::parse(state) {
            Ok(url) if is_web_scheme(&url) => {}
            _ => return Err(IgnoreReason::NotWeb),
        }
        if !self.config.is_target(state) {
            return Err(IgnoreReason::NotTargeted);
        }
        match self.records.entry(context) {
            Entry::Occupied(entry) if entry.get() == state => Err(IgnoreReason::AlreadyInjected),
            Entry::Occupied(mut entry) => {
                entry.insert(state.to_string());
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(state.to_string());
                Ok(())
            }
        }
    }

    async fn inject(&self, context: ContextId, state: &str) -> u8 {
        info!(context = %context, state, "injecting behavior");
        let _ = self.events.send(BridgeEvent::InjectionStarted {
            context,
            state: state.to_string(),
        });

        let mut failures = 0;
        if let Err(err) = self.host.insert_styles(context, &self.config.styles).await {
            self.report(context, InjectionStage::Styles, err);
            failures += 1;
        }
        if let Err(err) = self.host.execute_scripts(context, &self.config.scripts).await {
            self.report(context, InjectionStage::Scripts, err);
            failures += 1;
        }
        failures
    }

    fn report(&self, context: ContextId, stage: InjectionStage, err: BridgeError) {
        warn!(context = %context, ?stage, error = %err, "injection failed");
        let _ = self.events.send(BridgeEvent::InjectionFailed {
            context,
            stage,
            error: err.to_string(),
        });
    }

    fn clear(&self, context: ContextId, reason: ClearReason) {
        if self.records.remove(&context).is_some() {
            debug!(context = %context, ?reason, "injection record cleared");
            let _ = self
                .events
                .send(BridgeEvent::RecordCleared { context, reason });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    const PAGE: &str = "https://miyabi381.github.io/Scheduler-test.html";

    #[derive(Default)]
    struct RecordingHost {
        calls: Mutex<Vec<(ContextId, InjectionStage, Vec<String>)>>,
        fail_styles: bool,
    }

    #[async_trait]
    impl InjectionHost for RecordingHost {
        async fn insert_styles(
            &self,
            context: ContextId,
            files: &[String],
        ) -> Result<(), BridgeError> {
            self.calls
                .lock()
                .push((context, InjectionStage::Styles, files.to_vec()));
            if self.fail_styles {
                return Err(BridgeError::Host("tab closed".into()));
            }
            Ok(())
        }

        async fn execute_scripts(
            &self,
            context: ContextId,
            files: &[String],
        ) -> Result<(), BridgeError> {
            self.calls
                .lock()
                .push((context, InjectionStage::Scripts, files.to_vec()));
            Ok(())
        }
    }

    fn tracker(host: Arc<RecordingHost>) -> Arc<InjectionTracker> {
        let (bus, _) = broadcast::channel(16);
        InjectionTracker::new(InjectionConfig::default(), host, bus)
    }

    #[tokio::test]
    async fn styles_precede_scripts() {
        let host = Arc::new(RecordingHost::default());
        let tracker = tracker(host.clone());
        let outcome = tracker
            .on_context_transition(ContextId(1), TransitionPhase::Completed, PAGE)
            .await;
        assert_eq!(outcome, TransitionOutcome::Injected { failures: 0 });

        let calls = host.calls.lock();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0].1, InjectionStage::Styles);
        assert_eq!(calls[0].2, vec!["main.css".to_string()]);
        assert_eq!(calls[1].1, InjectionStage::Scripts);
        assert_eq!(calls[1].2, vec!["common.js".to_string(), "main.js".to_string()]);
    }

    #[tokio::test]
    async fn repeated_completion_injects_once() {
        let host = Arc::new(RecordingHost::default());
        let tracker = tracker(host.clone());
        let ctx = ContextId(7);
        tracker
            .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
            .await;
        let again = tracker
            .on_context_transition(ctx, TransitionPhase::Completed, PAGE)
            .await;
        assert_eq!(again, TransitionOutcome::Ignored(IgnoreReason::AlreadyInjected));
        assert_eq!(host.calls.lock().len(), 2);
        assert_eq!(tracker.record(ctx).as_deref(), Some(PAGE));
    }

    #[tokio::test]
    async fn discarded_and_foreign_states_are_ignored() {
        let host = Arc::new(RecordingHost::default());
        let tracker = tracker(host.clone());

        let outcome = tracker
            .on_context_transition(ContextId(1), TransitionPhase::Completed, "chrome://newtab")
            .await;
        assert_eq!(outcome, TransitionOutcome::Ignored(IgnoreReason::NotWeb));

        let outcome = tracker
            .on_context_transition(ContextId(1), TransitionPhase::Completed, "https://example.com/")
            .await;
        assert_eq!(outcome, TransitionOutcome::Ignored(IgnoreReason::NotTargeted));

        tracker
            .on_context_transition(ContextId(2), TransitionPhase::Discarded, "")
            .await;
        let outcome = tracker
            .on_context_transition(ContextId(2), TransitionPhase::Completed, PAGE)
            .await;
        assert_eq!(outcome, TransitionOutcome::Ignored(IgnoreReason::Discarded));

        // navigation lifts the discarded mark
        tracker
            .on_context_transition(ContextId(2), TransitionPhase::Navigating, PAGE)
            .await;
        assert!(!tracker.is_discarded(ContextId(2)));
        assert!(host.calls.lock().is_empty());
    }

    #[tokio::test]
    async fn host_failures_are_reported_not_retried() {
        let host = Arc::new(RecordingHost {
            fail_styles: true,
            ..Default::default()
        });
        let tracker = tracker(host.clone());
        let mut events = tracker.subscribe();

        let outcome = tracker
            .on_context_transition(ContextId(3), TransitionPhase::Completed, PAGE)
            .await;
        assert_eq!(outcome, TransitionOutcome::Injected { failures: 1 });
        // the script call is still attempted
        assert_eq!(host.calls.lock().len(), 2);

        assert!(matches!(
            events.recv().await.unwrap(),
            BridgeEvent::InjectionStarted { .. }
        ));
        match events.recv().await.unwrap() {
            BridgeEvent::InjectionFailed { context, stage, .. } => {
                assert_eq!(context, ContextId(3));
                assert_eq!(stage, InjectionStage::Styles);
            }
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[test]
    fn phases_parse_from_host_names() {
        assert_eq!("loading".parse::<TransitionPhase>().unwrap(), TransitionPhase::Navigating);
        assert_eq!("complete".parse::<TransitionPhase>().unwrap(), TransitionPhase::Completed);
        assert!("unloaded".parse::<TransitionPhase>().is_err());
    }
}
