//! Fire-and-forget execution of user-triggered flows

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::errors::FlowError;

/// Spawns flow tasks that stop when the owning runtime shuts down.
///
/// Failures are logged only; the control's own rollback path has already
/// restored its indicator by the time the error arrives here.
#[derive(Clone)]
pub struct FlowTasks {
    handle: Option<Handle>,
    cancel: CancellationToken,
}

impl FlowTasks {
    /// Capture the current tokio runtime, if any.
    pub fn new(cancel: CancellationToken) -> Self {
        Self {
            handle: Handle::try_current().ok(),
            cancel,
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn spawn<F, T>(&self, name: &'static str, flow: F) -> Option<JoinHandle<()>>
    where
        F: Future<Output = Result<T, FlowError>> + Send + 'static,
        T: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            debug!(flow = name, "runtime shut down; ignoring activation");
            return None;
        }
        let handle = self
            .handle
            .clone()
            .or_else(|| Handle::try_current().ok());
        let Some(handle) = handle else {
            warn!(flow = name, "no async runtime available; activation dropped");
            return None;
        };

        let cancel = self.cancel.clone();
        Some(handle.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(flow = name, "cancelled");
                }
                outcome = flow => {
                    if let Err(err) = outcome {
                        warn!(flow = name, error = %err, "user-triggered flow failed");
                    }
                }
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn failures_are_swallowed() {
        let tasks = FlowTasks::new(CancellationToken::new());
        let handle = tasks
            .spawn("failing", async { Err::<(), _>(FlowError::InvalidCatalog("no rows".into())) })
            .unwrap();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_running_flows() {
        let token = CancellationToken::new();
        let tasks = FlowTasks::new(token.clone());
        let handle = tasks
            .spawn("slow", async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok::<_, FlowError>(())
            })
            .unwrap();
        token.cancel();
        handle.await.unwrap();
        assert!(tasks.spawn("late", async { Ok::<_, FlowError>(()) }).is_none());
    }
}
