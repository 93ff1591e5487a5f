//! Action primitives implementation
//!
//! Two primitives drive every automation flow:
//! 1. wait_for - observe until a condition holds
//! 2. click - dispatch the press/release/activate sequence, waiting first when
//!    handed a condition

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use dom_tree::{Document, Element};
use tracing::{debug, info};

use crate::click::dispatch_click;
use crate::errors::ActionError;
use crate::observer::ElementObserver;
use crate::types::{ClickReport, Condition, LabelQuery, ObserverConfig, Target, WaitRequest};

/// Action primitives trait
#[async_trait]
pub trait ActionPrimitives: Send + Sync {
    /// Wait until the request's condition holds
    async fn wait_for(&self, request: WaitRequest) -> Result<Element, ActionError>;

    /// Click a resolved element, or the element a condition resolves to.
    /// `None` fails with `MissingTarget`.
    async fn click(&self, target: Option<Target>) -> Result<ClickReport, ActionError>;

    /// Click, then log what was clicked.
    async fn click_logged(&self, target: Option<Target>) -> Result<ClickReport, ActionError> {
        let report = self.click(target).await?;
        info!(element = %report.element, latency_ms = report.latency_ms, "clicked");
        Ok(report)
    }
}

/// Default implementation backed by an [`ElementObserver`].
pub struct DefaultActionPrimitives {
    observer: Arc<ElementObserver>,
}

impl DefaultActionPrimitives {
    pub fn new(observer: Arc<ElementObserver>) -> Self {
        Self { observer }
    }

    /// Build an observer over `document` and wrap it.
    pub fn for_document(document: Document, config: ObserverConfig) -> Self {
        Self::new(Arc::new(ElementObserver::new(document, config)))
    }

    pub fn observer(&self) -> &Arc<ElementObserver> {
        &self.observer
    }

    pub fn document(&self) -> &Document {
        self.observer.document()
    }

    pub async fn click_element(&self, element: &Element) -> Result<ClickReport, ActionError> {
        self.click(Some(Target::from(element))).await
    }

    pub async fn click_when(&self, condition: Condition) -> Result<ClickReport, ActionError> {
        self.click(Some(Target::Condition(condition))).await
    }

    /// Wait for a label match inside the region `id`, then click it.
    pub async fn click_in_id<T, S>(
        &self,
        id: &str,
        tags: &[T],
        labels: &[S],
        timeout: Duration,
    ) -> Result<ClickReport, ActionError>
    where
        T: AsRef<str>,
        S: AsRef<str>,
    {
        let query = LabelQuery::new(
            tags.iter().map(|t| t.as_ref().to_string()),
            labels.iter().map(|l| l.as_ref().to_string()),
        )
        .within(id);
        let element = self
            .wait_for(WaitRequest::new(query).timeout(timeout))
            .await?;
        self.click_element(&element).await
    }
}

#[async_trait]
impl ActionPrimitives for DefaultActionPrimitives {
    async fn wait_for(&self, request: WaitRequest) -> Result<Element, ActionError> {
        self.observer.observe(request).await
    }

    async fn click(&self, target: Option<Target>) -> Result<ClickReport, ActionError> {
        let started_at = Utc::now();
        let start_instant = Instant::now();

        let element = match target {
            None => return Err(ActionError::MissingTarget("click target is absent".into())),
            Some(Target::Element(element)) => element,
            Some(Target::Condition(condition)) => {
                debug!(condition = %condition, "waiting for click target");
                self.observer.observe(WaitRequest::new(condition)).await?
            }
        };

        let listeners_invoked = dispatch_click(Some(&element))?;
        let report = ClickReport {
            action_id: uuid::Uuid::new_v4().to_string(),
            element: element.to_string(),
            started_at,
            latency_ms: start_instant.elapsed().as_millis() as u64,
            listeners_invoked,
        };
        debug!(action_id = %report.action_id, element = %report.element, "click dispatched");
        Ok(report)
    }
}

/// Run `operation`, logging how long it took.
pub async fn timed<F, T>(label: &str, operation: F) -> T
where
    F: Future<Output = T>,
{
    let started = Instant::now();
    let output = operation.await;
    info!(
        operation = label,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "{label} finished"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn primitives() -> (Document, DefaultActionPrimitives) {
        let doc = Document::new();
        let primitives = DefaultActionPrimitives::for_document(doc.clone(), ObserverConfig::default());
        (doc, primitives)
    }

    #[tokio::test]
    async fn click_without_target_fails() {
        let (_doc, primitives) = primitives();
        let err = primitives.click(None).await.unwrap_err();
        assert!(matches!(err, ActionError::MissingTarget(_)));
    }

    #[tokio::test]
    async fn click_waits_for_condition() {
        let (doc, primitives) = primitives();
        let clicks = Arc::new(AtomicUsize::new(0));
        let page = doc.downgrade();
        let counter = clicks.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            let Some(doc) = page.upgrade() else { return };
            let button = doc.create_element("button");
            button.set_class_name("go");
            button.on("click", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
            doc.body().append_child(&button).unwrap();
        });

        let report = primitives.click_when(Condition::css("button.go")).await.unwrap();
        assert_eq!(report.listeners_invoked, 1);
        assert_eq!(report.element, "<button.go>");
        assert_eq!(clicks.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn click_in_id_times_out_when_label_never_appears() {
        let (doc, primitives) = primitives();
        let region = doc.create_element("div");
        region.set_id("calendarSetting");
        doc.body().append_child(&region).unwrap();

        let err = primitives
            .click_in_id(
                "calendarSetting",
                &["button"],
                &["全てを選択", "全選択"],
                Duration::from_millis(200),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::Timeout { timeout_ms: 200, .. }));
    }

    #[tokio::test]
    async fn click_logged_dispatches_and_reports() {
        let (doc, primitives) = primitives();
        let clicks = Arc::new(AtomicUsize::new(0));
        let button = doc.create_element("button");
        button.set_id("save");
        let counter = clicks.clone();
        button.on("click", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        doc.body().append_child(&button).unwrap();

        let report = primitives
            .click_logged(Some(Target::from(&button)))
            .await
            .unwrap();
        assert_eq!(report.element, "<button#save>");
        assert_eq!(report.listeners_invoked, 1);
        assert_eq!(clicks.load(Ordering::SeqCst), 1);

        let err = primitives.click_logged(None).await.unwrap_err();
        assert!(matches!(err, ActionError::MissingTarget(_)));
    }

    #[tokio::test]
    async fn timed_returns_the_inner_output() {
        let value = timed("answer", async { 42 }).await;
        assert_eq!(value, 42);
    }
}
