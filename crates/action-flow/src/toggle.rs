//! On/off controls whose only state is their visual indicator

use std::future::Future;

use dom_tree::Element;
use tracing::warn;

use crate::errors::FlowError;

/// A generated control button. The indicator is a class on the element.
#[derive(Debug, Clone)]
pub struct ToggleControl {
    element: Element,
    active_class: String,
}

impl ToggleControl {
    pub fn new(element: Element, active_class: impl Into<String>) -> Self {
        Self {
            element,
            active_class: active_class.into(),
        }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    pub fn is_active(&self) -> bool {
        self.element.has_class(&self.active_class)
    }

    pub fn set_active(&self, active: bool) {
        self.element.toggle_class(&self.active_class, Some(active));
    }

    /// Flip the indicator, then run `flow` towards the new state.
    ///
    /// If the flow fails, or is dropped before finishing, the indicator goes
    /// back to its value before the flip; the control never shows a state it
    /// failed to reach.
    pub async fn switch<F, Fut>(&self, flow: F) -> Result<bool, FlowError>
    where
        F: FnOnce(bool) -> Fut,
        Fut: Future<Output = Result<(), FlowError>>,
    {
        let before = self.is_active();
        let target = !before;
        self.set_active(target);
        let mut rollback = Rollback {
            control: self,
            restore: Some(before),
        };
        match flow(target).await {
            Ok(()) => {
                rollback.restore = None;
                Ok(target)
            }
            Err(err) => {
                drop(rollback);
                warn!(
                    control = %self.element,
                    restored = before,
                    error = %err,
                    "toggle failed; indicator rolled back"
                );
                Err(err)
            }
        }
    }
}

struct Rollback<'a> {
    control: &'a ToggleControl,
    restore: Option<bool>,
}

impl Drop for Rollback<'_> {
    fn drop(&mut self) {
        if let Some(before) = self.restore.take() {
            self.control.set_active(before);
        }
    }
}
