//! Simulated browser host
//!
//! Owns one [`SchedulerPage`] per tab and plays the host side of the bridge:
//! style/script injection lands here, and running the behavior script builds
//! the tab's [`AutomationRuntime`] and signals it through the message router.

use std::sync::Arc;

use action_flow::{AutomationRuntime, AutomationSettings};
use async_trait::async_trait;
use dashmap::DashMap;
use extensions_bridge::{
    AutomationHandler, BridgeError, BridgeMessage, InjectionHost, MessageRouter,
};
use parking_lot::Mutex;
use schedassist_core_types::ContextId;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::simulator::{PageOptions, SchedulerPage};

/// Routes "initialize automation" to a runtime and keeps the launched tasks.
pub struct RuntimeHandler {
    runtime: Arc<AutomationRuntime>,
    launches: Mutex<Vec<JoinHandle<()>>>,
}

impl RuntimeHandler {
    pub fn new(runtime: Arc<AutomationRuntime>) -> Arc<Self> {
        Arc::new(Self {
            runtime,
            launches: Mutex::new(Vec::new()),
        })
    }

    pub fn runtime(&self) -> &Arc<AutomationRuntime> {
        &self.runtime
    }

    /// Wait for every launched initialization to finish.
    pub async fn settle(&self) {
        let launches = std::mem::take(&mut *self.launches.lock());
        for launch in launches {
            if let Err(err) = launch.await {
                warn!(context = %self.runtime.context(), error = %err, "initialization task aborted");
            }
        }
    }
}

#[async_trait]
impl AutomationHandler for RuntimeHandler {
    async fn initialize_automation(&self, context: ContextId) -> Result<(), BridgeError> {
        if context != self.runtime.context() {
            return Err(BridgeError::ContextMismatch {
                expected: self.runtime.context(),
                actual: context,
            });
        }
        let launch = self.runtime.launch();
        self.launches.lock().push(launch);
        Ok(())
    }
}

struct BrowserTab {
    page: SchedulerPage,
    automation: Option<Arc<RuntimeHandler>>,
    styles: Vec<String>,
    script_runs: usize,
}

impl BrowserTab {
    fn new(page: SchedulerPage) -> Self {
        Self {
            page,
            automation: None,
            styles: Vec::new(),
            script_runs: 0,
        }
    }
}

pub struct SimulatedBrowser {
    tabs: DashMap<ContextId, BrowserTab>,
    router: Arc<MessageRouter>,
    settings: AutomationSettings,
    page: PageOptions,
}

impl SimulatedBrowser {
    pub fn new(settings: AutomationSettings, page: PageOptions) -> Arc<Self> {
        Arc::new(Self {
            tabs: DashMap::new(),
            router: MessageRouter::new(),
            settings,
            page,
        })
    }

    pub fn router(&self) -> &Arc<MessageRouter> {
        &self.router
    }

    /// Load a fresh page into `context`, replacing whatever was there.
    pub fn navigate(&self, context: ContextId) -> SchedulerPage {
        self.close_tab(context);
        let page = SchedulerPage::new(self.page.clone());
        self.tabs.insert(context, BrowserTab::new(page.clone()));
        debug!(context = %context, "simulated page loaded");
        page
    }

    pub fn close_tab(&self, context: ContextId) -> bool {
        let Some((_, tab)) = self.tabs.remove(&context) else {
            return false;
        };
        if let Some(handler) = tab.automation {
            handler.runtime().shutdown();
            self.router.unregister(context);
        }
        true
    }

    pub fn page(&self, context: ContextId) -> Option<SchedulerPage> {
        self.tabs.get(&context).map(|tab| tab.page.clone())
    }

    pub fn runtime(&self, context: ContextId) -> Option<Arc<AutomationRuntime>> {
        self.tabs
            .get(&context)
            .and_then(|tab| tab.automation.as_ref().map(|h| h.runtime().clone()))
    }

    pub fn script_runs(&self, context: ContextId) -> usize {
        self.tabs.get(&context).map(|tab| tab.script_runs).unwrap_or(0)
    }

    pub fn styles(&self, context: ContextId) -> Vec<String> {
        self.tabs
            .get(&context)
            .map(|tab| tab.styles.clone())
            .unwrap_or_default()
    }

    /// Wait for the tab's launched initializations.
    pub async fn settle(&self, context: ContextId) {
        let handler = self
            .tabs
            .get(&context)
            .and_then(|tab| tab.automation.clone());
        if let Some(handler) = handler {
            handler.settle().await;
        }
    }

    /// The tab's automation handler, created on first use.
    fn automation(&self, context: ContextId) -> Result<Arc<RuntimeHandler>, BridgeError> {
        let mut tab = self
            .tabs
            .get_mut(&context)
            .ok_or_else(|| BridgeError::Host(format!("no tab for {context}")))?;
        tab.script_runs += 1;
        if let Some(handler) = &tab.automation {
            return Ok(handler.clone());
        }

        let runtime = AutomationRuntime::new(
            context,
            tab.page.document().clone(),
            self.settings.clone(),
        );
        let handler = RuntimeHandler::new(runtime);
        tab.automation = Some(handler.clone());
        self.router.register(context, handler.clone());
        info!(context = %context, "automation runtime created");
        Ok(handler)
    }
}

#[async_trait]
impl InjectionHost for SimulatedBrowser {
    async fn insert_styles(&self, context: ContextId, files: &[String]) -> Result<(), BridgeError> {
        let mut tab = self
            .tabs
            .get_mut(&context)
            .ok_or_else(|| BridgeError::Host(format!("no tab for {context}")))?;
        tab.styles.extend(files.iter().cloned());
        Ok(())
    }

    async fn execute_scripts(
        &self,
        context: ContextId,
        files: &[String],
    ) -> Result<(), BridgeError> {
        if files.is_empty() {
            return Ok(());
        }
        self.automation(context)?;
        debug!(context = %context, scripts = ?files, "behavior scripts evaluated");
        self.router
            .on_message(context, BridgeMessage::InitializeAutomation)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripts_without_a_tab_fail() {
        let browser = SimulatedBrowser::new(AutomationSettings::default(), PageOptions::default());
        let err = browser
            .execute_scripts(ContextId(1), &["main.js".to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Host(_)));
    }

    #[tokio::test]
    async fn reevaluated_scripts_reuse_the_runtime() {
        let browser = SimulatedBrowser::new(AutomationSettings::default(), PageOptions::default());
        browser.navigate(ContextId(1));
        let scripts = vec!["common.js".to_string(), "main.js".to_string()];
        browser.execute_scripts(ContextId(1), &scripts).await.unwrap();
        let first = browser.runtime(ContextId(1)).unwrap();
        browser.execute_scripts(ContextId(1), &scripts).await.unwrap();
        let second = browser.runtime(ContextId(1)).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(browser.script_runs(ContextId(1)), 2);
        browser.settle(ContextId(1)).await;
        assert!(first.is_initialized());
    }

    #[tokio::test]
    async fn handler_rejects_a_foreign_context() {
        let runtime = AutomationRuntime::new(
            ContextId(3),
            SchedulerPage::new(PageOptions::default()).document().clone(),
            AutomationSettings::default(),
        );
        let handler = RuntimeHandler::new(runtime.clone());

        let err = handler
            .initialize_automation(ContextId(4))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::ContextMismatch {
                expected: ContextId(3),
                actual: ContextId(4),
            }
        );
        handler.settle().await;
        assert!(!runtime.is_initialized());
    }

    #[tokio::test]
    async fn navigation_shuts_the_old_runtime_down() {
        let browser = SimulatedBrowser::new(AutomationSettings::default(), PageOptions::default());
        browser.navigate(ContextId(2));
        browser
            .execute_scripts(ContextId(2), &["main.js".to_string()])
            .await
            .unwrap();
        let old = browser.runtime(ContextId(2)).unwrap();
        browser.settle(ContextId(2)).await;

        browser.navigate(ContextId(2));
        assert!(old.is_shut_down());
        assert!(browser.runtime(ContextId(2)).is_none());
        assert!(!browser.router().is_registered(ContextId(2)));
    }
}
