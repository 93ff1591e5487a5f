//! Synthetic click: the natural press, release, activate sequence

use dom_tree::{Element, EventInit};
use tracing::trace;

use crate::errors::ActionError;

/// Signals dispatched, in order, for one click.
pub const CLICK_SEQUENCE: [&str; 3] = ["mousedown", "mouseup", "click"];

/// Dispatch [`CLICK_SEQUENCE`] on `target` synchronously.
///
/// Returns the number of listener invocations.
pub fn dispatch_click(target: Option<&Element>) -> Result<usize, ActionError> {
    let target =
        target.ok_or_else(|| ActionError::MissingTarget("click target is absent".to_string()))?;
    let init = EventInit {
        bubbles: true,
        cancelable: true,
    };
    let mut invoked = 0;
    for signal in CLICK_SEQUENCE {
        invoked += target.dispatch_event(signal, init);
        trace!(element = %target, signal, "dispatched");
    }
    Ok(invoked)
}
