//! Per-context automation runtime

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use action_primitives::{
    ActionPrimitives, DefaultActionPrimitives, ElementObserver, ObserverConfig,
};
use dom_tree::Document;
use futures::FutureExt;
use schedassist_core_types::{ContextId, RuntimeId};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::errors::FlowError;
use crate::group_toggle::GroupToggleFlow;
use crate::resource_toggle::ResourceToggleFlow;
use crate::retry::{run_steps, RetryError, RetryPolicy, RetrySettings, RetryStep};
use crate::surface::SettingsSurface;
use crate::tasks::FlowTasks;
use crate::types::SurfaceCatalog;

/// Inputs for one runtime.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutomationSettings {
    pub catalog: SurfaceCatalog,
    pub timeouts: ObserverConfig,
    pub retry: RetrySettings,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// Setup completed after this many attempts
    Completed { attempts: u32 },
    /// An earlier call already ran (or is running) setup
    AlreadyInitialized,
}

/// Owns the observer, primitives and flows for one execution context.
///
/// Wait-cache and controls live here rather than in globals, so each context
/// (and each test) starts clean.
pub struct AutomationRuntime {
    id: RuntimeId,
    context: ContextId,
    primitives: Arc<DefaultActionPrimitives>,
    groups: Arc<GroupToggleFlow>,
    resource: Arc<ResourceToggleFlow>,
    retry: RetryPolicy,
    initialized: AtomicBool,
    cancel: CancellationToken,
}

impl AutomationRuntime {
    pub fn new(context: ContextId, document: Document, settings: AutomationSettings) -> Arc<Self> {
        let cancel = CancellationToken::new();
        let observer = Arc::new(ElementObserver::new(document.clone(), settings.timeouts));
        let primitives = Arc::new(DefaultActionPrimitives::new(observer));
        let surface = Arc::new(SettingsSurface::new(
            primitives.clone() as Arc<dyn ActionPrimitives>,
            document,
            Arc::new(settings.catalog),
            settings.timeouts,
        ));
        let tasks = FlowTasks::new(cancel.clone());

        Arc::new(Self {
            id: RuntimeId::new(),
            context,
            primitives,
            groups: GroupToggleFlow::new(surface.clone(), tasks.clone()),
            resource: ResourceToggleFlow::new(surface, tasks),
            retry: settings.retry.policy(),
            initialized: AtomicBool::new(false),
            cancel,
        })
    }

    pub fn id(&self) -> &RuntimeId {
        &self.id
    }

    pub fn context(&self) -> ContextId {
        self.context
    }

    pub fn primitives(&self) -> &Arc<DefaultActionPrimitives> {
        &self.primitives
    }

    pub fn groups(&self) -> &Arc<GroupToggleFlow> {
        &self.groups
    }

    pub fn resource(&self) -> &Arc<ResourceToggleFlow> {
        &self.resource
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::SeqCst)
    }

    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run group setup then resource setup under the retry policy.
    ///
    /// Runs at most once per runtime; later calls report
    /// [`InitOutcome::AlreadyInitialized`].
    pub async fn initialize(&self) -> Result<InitOutcome, RetryError<FlowError>> {
        if self.initialized.swap(true, Ordering::SeqCst) {
            info!(context = %self.context, "automation already initialized");
            return Ok(InitOutcome::AlreadyInitialized);
        }
        info!(context = %self.context, runtime = %self.id, "initializing automation");

        let groups = self.groups.clone();
        let resource = self.resource.clone();
        let steps = [
            RetryStep::new("group-toggle-setup", move || {
                let groups = groups.clone();
                async move { groups.setup().await.map(|_| ()) }.boxed()
            }),
            RetryStep::new("resource-toggle-setup", move || {
                let resource = resource.clone();
                async move { resource.setup().await.map(|_| ()) }.boxed()
            }),
        ];

        let outcome = tokio::select! {
            _ = self.cancel.cancelled() => Err(RetryError::Cancelled),
            outcome = run_steps(&self.retry, &steps) => outcome,
        };
        match outcome {
            Ok(attempts) => {
                info!(context = %self.context, attempts, "automation ready");
                Ok(InitOutcome::Completed { attempts })
            }
            Err(err) => {
                warn!(context = %self.context, error = %err, "automation setup gave up");
                Err(err)
            }
        }
    }

    /// Initialize in the background. Failure is logged and goes no further;
    /// the host page must stay usable.
    pub fn launch(self: &Arc<Self>) -> JoinHandle<()> {
        let runtime = self.clone();
        tokio::spawn(async move {
            if let Err(err) = runtime.initialize().await {
                error!(context = %runtime.context, error = %err, "automation failed to initialize");
            }
        })
    }

    /// Cancel in-flight user-triggered flows and any running setup.
    pub fn shutdown(&self) {
        if !self.cancel.is_cancelled() {
            info!(context = %self.context, "shutting down automation");
            self.cancel.cancel();
        }
    }
}

impl Drop for AutomationRuntime {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
