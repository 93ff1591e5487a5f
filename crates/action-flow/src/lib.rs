//! Automation flows over the scheduler's settings surface
//!
//! Each flow opens the settings surface, performs label-matched activations
//! and commits. Setup of both flows runs under a bounded retry policy, once per
//! execution context.

pub mod errors;
pub mod group_toggle;
pub mod resource_toggle;
pub mod retry;
pub mod runtime;
pub mod surface;
pub mod tasks;
pub mod toggle;
pub mod types;

pub use errors::{FlowError, StageExt};
pub use group_toggle::{GroupSetupReport, GroupToggleFlow};
pub use resource_toggle::ResourceToggleFlow;
pub use retry::{run_steps, RetryError, RetryPolicy, RetrySettings, RetryStep};
pub use runtime::{AutomationRuntime, AutomationSettings, InitOutcome};
pub use surface::SettingsSurface;
pub use tasks::FlowTasks;
pub use toggle::ToggleControl;
pub use types::{
    CatalogIds, CatalogLabels, CatalogSelectors, ControlSettings, SurfaceCatalog, SurfaceDisplay,
};
