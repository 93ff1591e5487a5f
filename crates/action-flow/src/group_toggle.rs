//! Group-visibility toggle
//!
//! Setup reads every group heading on the settings surface and materialises
//! one on/off control per group in the host toolbar. Activating a control
//! re-opens the surface, clicks the matching row and commits.

use std::sync::{Arc, Weak};

use action_primitives::{create_button, ActionError, Placement};
use dom_tree::Element;
use tracing::{debug, info};

use crate::errors::{FlowError, StageExt};
use crate::surface::SettingsSurface;
use crate::tasks::FlowTasks;
use crate::toggle::ToggleControl;
use crate::types::SurfaceDisplay;

/// What one setup pass did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSetupReport {
    pub titles: Vec<String>,
    /// Controls created by this pass; zero when they already existed
    pub created: usize,
}

pub struct GroupToggleFlow {
    surface: Arc<SettingsSurface>,
    tasks: FlowTasks,
}

impl GroupToggleFlow {
    pub fn new(surface: Arc<SettingsSurface>, tasks: FlowTasks) -> Arc<Self> {
        Arc::new(Self { surface, tasks })
    }

    /// Idempotent: control creation is skipped entirely when the container
    /// already has children.
    pub async fn setup(self: &Arc<Self>) -> Result<GroupSetupReport, FlowError> {
        let catalog = self.surface.catalog();
        let doc = self.surface.document();

        self.surface.open(SurfaceDisplay::Hidden).await?;
        self.surface
            .wait(&catalog.selectors.group_title, "group-titles")
            .await?;
        let titles: Vec<String> = doc
            .query_selector_all(&catalog.selectors.group_title)
            .map_err(|err| FlowError::InvalidCatalog(err.to_string()))?
            .iter()
            .map(|el| el.text_content().trim().to_string())
            .collect();

        let container = match doc.get_element_by_id(&catalog.ids.group_container) {
            Some(existing) => existing,
            None => {
                let container = doc.create_element("div");
                container.set_id(catalog.ids.group_container.as_str());
                let chunk = self
                    .surface
                    .wait(&catalog.selectors.toolbar_chunk, "group-container")
                    .await?;
                chunk
                    .append_child(&container)
                    .map_err(ActionError::from)
                    .stage("group-container")?;
                container
            }
        };

        let mut created = 0;
        if container.child_element_count() == 0 {
            for (index, title) in titles.iter().enumerate() {
                let button =
                    create_button(&container, title, Placement::Append).stage("group-controls")?;
                button.set_class_name(catalog.controls.control_class.as_str());
                self.bind(&button, index);
                created += 1;
            }
        } else {
            debug!(
                existing = container.child_element_count(),
                "group controls already present"
            );
        }

        self.surface.close().await?;
        info!(groups = titles.len(), created, "group toggle setup complete");
        Ok(GroupSetupReport { titles, created })
    }

    /// Controls currently present in the toolbar container, in order.
    pub fn controls(&self) -> Vec<ToggleControl> {
        let catalog = self.surface.catalog();
        self.surface
            .document()
            .get_element_by_id(&catalog.ids.group_container)
            .map(|container| {
                container
                    .children()
                    .into_iter()
                    .map(|el| ToggleControl::new(el, catalog.controls.active_class.as_str()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// User-facing activation of the control for group `index`: flip its
    /// indicator, run the toggle, roll back on failure.
    pub async fn activate(&self, control: &Element, index: usize) -> Result<bool, FlowError> {
        let control = ToggleControl::new(
            control.clone(),
            self.surface.catalog().controls.active_class.as_str(),
        );
        control.switch(|_| self.toggle_group(index)).await
    }

    /// Open the surface, click the group's row, commit.
    pub async fn toggle_group(&self, index: usize) -> Result<(), FlowError> {
        let row = self.surface.catalog().group_row_selector(index);
        self.surface.open(SurfaceDisplay::Hidden).await?;
        let target = self.surface.wait(&row, "group-row").await?;
        self.surface.click(&target, "group-row").await?;
        self.surface.close().await?;
        Ok(())
    }

    fn bind(self: &Arc<Self>, button: &Element, index: usize) {
        let flow: Weak<Self> = Arc::downgrade(self);
        let control = button.downgrade();
        let tasks = self.tasks.clone();
        button.on("click", move |_| {
            let (Some(flow), Some(control)) = (flow.upgrade(), control.upgrade()) else {
                return;
            };
            tasks.spawn("group-toggle", async move {
                flow.activate(&control, index).await
            });
        });
    }
}
