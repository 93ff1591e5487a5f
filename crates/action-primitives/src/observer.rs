//! Element observer
//!
//! Turns "does an element matching C exist now, or soon" into a single
//! outcome. Identical concurrent waits, keyed by `(scope identity, condition)`,
//! share one subscription, one deadline and one result.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use dom_tree::{Document, Element, MutationRecord, WeakElement};
use futures::future::{BoxFuture, FutureExt, WeakShared};
use parking_lot::Mutex;
use schedassist_core_types::{NodeKey, ScopeId};
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::errors::ActionError;
use crate::types::{Condition, ObserverConfig, WaitRequest};

type WaitOutcome = Result<Element, ActionError>;

/// Lazily assigns stable ids to scope elements without owning them.
#[derive(Default)]
pub struct ScopeRegistry {
    entries: Mutex<HashMap<NodeKey, (WeakElement, ScopeId)>>,
    next: AtomicU64,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identify(&self, scope: &Element) -> ScopeId {
        let mut entries = self.entries.lock();
        entries.retain(|_, (weak, _)| weak.upgrade().is_some());
        if let Some((_, id)) = entries.get(&scope.key()) {
            return *id;
        }
        let id = ScopeId(self.next.fetch_add(1, Ordering::Relaxed) + 1);
        entries.insert(scope.key(), (scope.downgrade(), id));
        id
    }

    /// Number of scopes still alive.
    pub fn len(&self) -> usize {
        let mut entries = self.entries.lock();
        entries.retain(|_, (weak, _)| weak.upgrade().is_some());
        entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Counters for observation bookkeeping.
#[derive(Debug, Default)]
pub struct ObserverStats {
    subscriptions: AtomicUsize,
    timers: AtomicUsize,
    shared: AtomicUsize,
}

/// Point-in-time copy of [`ObserverStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ObserverStatsSnapshot {
    /// Change subscriptions created
    pub subscriptions: usize,
    /// Deadlines armed
    pub timers: usize,
    /// Calls that joined an observation already in flight
    pub shared: usize,
}

impl ObserverStats {
    pub fn snapshot(&self) -> ObserverStatsSnapshot {
        ObserverStatsSnapshot {
            subscriptions: self.subscriptions.load(Ordering::SeqCst),
            timers: self.timers.load(Ordering::SeqCst),
            shared: self.shared.load(Ordering::SeqCst),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct WaitKey {
    scope: ScopeId,
    condition: Condition,
}

struct PendingWait {
    generation: u64,
    // Weak so that a wait abandoned by every caller is dropped, not parked.
    future: WeakShared<BoxFuture<'static, WaitOutcome>>,
}

type PendingMap = Arc<Mutex<HashMap<WaitKey, PendingWait>>>;

/// Removes the pending entry when the observation settles or every waiter
/// goes away, whichever comes first.
struct SettleGuard {
    pending: PendingMap,
    key: WaitKey,
    generation: u64,
}

impl Drop for SettleGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        if pending
            .get(&self.key)
            .map(|entry| entry.generation == self.generation)
            .unwrap_or(false)
        {
            pending.remove(&self.key);
        }
    }
}

/// Observer bound to one document.
pub struct ElementObserver {
    document: Document,
    config: ObserverConfig,
    scopes: ScopeRegistry,
    pending: PendingMap,
    stats: Arc<ObserverStats>,
    generation: AtomicU64,
}

impl ElementObserver {
    pub fn new(document: Document, config: ObserverConfig) -> Self {
        Self {
            document,
            config,
            scopes: ScopeRegistry::new(),
            pending: Arc::new(Mutex::new(HashMap::new())),
            stats: Arc::new(ObserverStats::default()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn stats(&self) -> ObserverStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn scopes(&self) -> &ScopeRegistry {
        &self.scopes
    }

    /// Observations currently in flight.
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }

    /// Resolve `request` to the first matching element.
    ///
    /// An already satisfied condition resolves without subscribing. Malformed
    /// conditions fail with `InvalidCondition` instead of being retried.
    pub async fn observe(&self, request: WaitRequest) -> WaitOutcome {
        let scope = request.scope.unwrap_or_else(|| self.document.root());
        let timeout = request.timeout.unwrap_or_else(|| self.config.wait_timeout());
        let key = WaitKey {
            scope: self.scopes.identify(&scope),
            condition: request.condition,
        };

        let shared = {
            let mut pending = self.pending.lock();
            let joined = pending.get(&key).and_then(|entry| entry.future.upgrade());
            if let Some(existing) = joined {
                self.stats.shared.fetch_add(1, Ordering::SeqCst);
                debug!(scope = %key.scope, condition = %key.condition, "joining pending observation");
                existing
            } else {
                if let Some(found) = key.condition.evaluate(&scope)? {
                    return Ok(found);
                }

                let rx = self.document.subscribe();
                self.stats.subscriptions.fetch_add(1, Ordering::SeqCst);
                let deadline = Instant::now() + timeout;
                self.stats.timers.fetch_add(1, Ordering::SeqCst);

                let generation = self.generation.fetch_add(1, Ordering::Relaxed);
                let guard = SettleGuard {
                    pending: self.pending.clone(),
                    key: key.clone(),
                    generation,
                };
                let condition = key.condition.clone();
                let timeout_ms = timeout.as_millis() as u64;
                debug!(scope = %key.scope, condition = %condition, timeout_ms, "observing");

                let future = async move {
                    let outcome = match tokio::time::timeout_at(
                        deadline,
                        watch(rx, &scope, &condition),
                    )
                    .await
                    {
                        Ok(result) => result,
                        Err(_) => {
                            let err = ActionError::Timeout {
                                condition: condition.to_string(),
                                timeout_ms,
                            };
                            warn!("{err}");
                            Err(err)
                        }
                    };
                    drop(guard);
                    outcome
                }
                .boxed()
                .shared();

                if let Some(weak) = future.downgrade() {
                    pending.insert(
                        key,
                        PendingWait {
                            generation,
                            future: weak,
                        },
                    );
                }
                future
            }
        };

        shared.await
    }

    /// Observe a structural query under the document element.
    pub async fn wait_for(&self, selector: &str) -> WaitOutcome {
        self.observe(WaitRequest::css(selector)).await
    }
}

async fn watch(
    mut rx: broadcast::Receiver<MutationRecord>,
    scope: &Element,
    condition: &Condition,
) -> WaitOutcome {
    // A mutation may have landed between the first check and the subscription.
    if let Some(found) = condition.evaluate(scope)? {
        return Ok(found);
    }
    loop {
        match rx.recv().await {
            Ok(record) => {
                let in_scope = record
                    .target()
                    .map(|target| scope.contains(&target))
                    .unwrap_or(false);
                if !in_scope {
                    continue;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "mutation stream lagged; re-evaluating");
            }
            Err(RecvError::Closed) => {
                // No further changes can arrive; the deadline decides.
                std::future::pending::<()>().await;
            }
        }
        if let Some(found) = condition.evaluate(scope)? {
            return Ok(found);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn observer() -> (Document, Arc<ElementObserver>) {
        let doc = Document::new();
        let observer = Arc::new(ElementObserver::new(doc.clone(), ObserverConfig::default()));
        (doc, observer)
    }

    #[tokio::test]
    async fn satisfied_condition_does_not_subscribe() {
        let (doc, observer) = observer();
        let panel = doc.create_element("div");
        panel.set_id("calendarSetting");
        doc.body().append_child(&panel).unwrap();

        let found = observer.wait_for("#calendarSetting").await.unwrap();
        assert_eq!(found, panel);
        assert_eq!(observer.stats(), ObserverStatsSnapshot::default());
        assert_eq!(doc.mutation_subscribers(), 0);
    }

    #[tokio::test]
    async fn resolves_when_element_is_inserted_later() {
        let (doc, observer) = observer();
        let page = doc.downgrade();
        let insert = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let doc = page.upgrade().unwrap();
            let panel = doc.create_element("div");
            panel.set_id("calendarSetting");
            doc.body().append_child(&panel).unwrap();
        });

        let found = observer.wait_for("#calendarSetting").await.unwrap();
        insert.await.unwrap();
        assert_eq!(found.id().as_deref(), Some("calendarSetting"));
        assert_eq!(observer.pending(), 0);
        assert_eq!(doc.mutation_subscribers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_at_the_deadline() {
        let (doc, observer) = observer();
        let started = Instant::now();
        let err = observer
            .observe(WaitRequest::css(".never").timeout(Duration::from_millis(500)))
            .await
            .unwrap_err();
        let elapsed = started.elapsed();

        assert_eq!(
            err,
            ActionError::Timeout {
                condition: ".never".into(),
                timeout_ms: 500
            }
        );
        assert!(elapsed >= Duration::from_millis(500));
        assert!(elapsed < Duration::from_millis(510));
        assert_eq!(observer.pending(), 0);
        assert_eq!(doc.mutation_subscribers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_identical_waits_share_one_outcome() {
        let (_doc, observer) = observer();
        let request = || WaitRequest::css(".never").timeout(Duration::from_millis(100));

        let (a, b) = tokio::join!(observer.observe(request()), observer.observe(request()));
        assert_eq!(a.unwrap_err(), b.unwrap_err());

        let stats = observer.stats();
        assert_eq!(stats.subscriptions, 1);
        assert_eq!(stats.timers, 1);
        assert_eq!(stats.shared, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn settled_entries_are_not_replayed() {
        let (doc, observer) = observer();
        let request = || WaitRequest::css("#late").timeout(Duration::from_millis(50));
        assert!(observer.observe(request()).await.is_err());

        let late = doc.create_element("p");
        late.set_id("late");
        doc.body().append_child(&late).unwrap();
        assert_eq!(observer.observe(request()).await.unwrap(), late);
    }

    #[tokio::test]
    async fn invalid_selector_rejects_immediately() {
        let (_doc, observer) = observer();
        let err = observer.wait_for("div:hover").await.unwrap_err();
        assert!(matches!(err, ActionError::InvalidCondition(_)));
        assert_eq!(observer.stats().subscriptions, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn different_scopes_do_not_share() {
        let (doc, observer) = observer();
        let left = doc.create_element("div");
        let right = doc.create_element("div");
        doc.body().append_child(&left).unwrap();
        doc.body().append_child(&right).unwrap();

        let wait = |scope: &Element| {
            WaitRequest::css("span")
                .in_scope(scope.clone())
                .timeout(Duration::from_millis(10))
        };
        let (a, b) = tokio::join!(observer.observe(wait(&left)), observer.observe(wait(&right)));
        assert!(a.is_err() && b.is_err());
        assert_eq!(observer.stats().subscriptions, 2);
    }

    #[tokio::test]
    async fn lagged_stream_still_sees_the_element() {
        let doc = Document::with_bus_capacity(1);
        let observer = Arc::new(ElementObserver::new(doc.clone(), ObserverConfig::default()));
        let waiter = {
            let observer = observer.clone();
            tokio::spawn(async move { observer.wait_for("i#t").await })
        };
        while doc.mutation_subscribers() == 0 {
            tokio::task::yield_now().await;
        }

        // The waiter cannot run until we yield, so the burst overflows its stream.
        let target = doc.create_element("i");
        target.set_id("t");
        doc.body().append_child(&target).unwrap();
        for _ in 0..9 {
            doc.body().append_child(&doc.create_element("span")).unwrap();
        }

        let found = waiter.await.unwrap().unwrap();
        assert_eq!(found, target);
        assert_eq!(found.to_string(), "<i#t>");
        assert_eq!(observer.pending(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn removed_scope_leaves_the_deadline_to_decide() {
        let (doc, observer) = observer();
        let scope = doc.create_element("span");
        doc.body().append_child(&scope).unwrap();

        let waiter = {
            let observer = observer.clone();
            let request = WaitRequest::css("b")
                .in_scope(scope.clone())
                .timeout(Duration::from_millis(300));
            tokio::spawn(async move { observer.observe(request).await })
        };
        while doc.mutation_subscribers() == 0 {
            tokio::task::yield_now().await;
        }
        scope.remove();
        doc.body().append_child(&doc.create_element("b")).unwrap();

        let started = Instant::now();
        let err = waiter.await.unwrap().unwrap_err();
        assert!(started.elapsed() <= Duration::from_millis(300));
        assert_eq!(
            err,
            ActionError::Timeout {
                condition: "b".into(),
                timeout_ms: 300
            }
        );
        assert_eq!(observer.pending(), 0);
        assert_eq!(doc.mutation_subscribers(), 0);
    }

    #[test]
    fn scope_registry_does_not_keep_scopes_alive() {
        let doc = Document::new();
        let registry = ScopeRegistry::new();
        let scope = doc.create_element("div");
        let id = registry.identify(&scope);
        assert_eq!(registry.identify(&scope), id);
        assert_eq!(registry.len(), 1);

        let weak = scope.downgrade();
        drop(scope);
        assert!(weak.upgrade().is_none());
        assert!(registry.is_empty());
    }
}
