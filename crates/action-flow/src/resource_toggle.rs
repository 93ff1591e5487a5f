//! Shared-resource (meeting room) toggle
//!
//! A single control prepended next to the toolbar's day button. "On" selects
//! every facility in the resource sub-surface and commits; "off" clears the
//! selection and commits.

use std::sync::{Arc, Weak};

use action_primitives::{create_button, get_el, ActionError, Placement};
use action_locator::LabelSet;
use dom_tree::Element;
use tracing::{debug, info};

use crate::errors::{FlowError, StageExt};
use crate::surface::SettingsSurface;
use crate::tasks::FlowTasks;
use crate::toggle::ToggleControl;
use crate::types::SurfaceDisplay;

/// Tags scanned for a clear control; the application renders it as any of these.
const CLEAR_TAGS: [&str; 3] = ["button", "a", "span"];

pub struct ResourceToggleFlow {
    surface: Arc<SettingsSurface>,
    tasks: FlowTasks,
}

impl ResourceToggleFlow {
    pub fn new(surface: Arc<SettingsSurface>, tasks: FlowTasks) -> Arc<Self> {
        Arc::new(Self { surface, tasks })
    }

    /// Insert the control. Returns `false` when it already exists or the
    /// toolbar has no day button with a grandparent to host it.
    pub async fn setup(self: &Arc<Self>) -> Result<bool, FlowError> {
        let catalog = self.surface.catalog();
        let doc = self.surface.document();

        self.surface
            .wait(&catalog.selectors.toolbar_chunk, "resource-setup")
            .await?;
        if doc.get_element_by_id(&catalog.ids.resource_button).is_some() {
            debug!("resource control already present");
            return Ok(false);
        }

        let host = get_el(doc, &catalog.ids.calendar_main, "button", &catalog.labels.day)
            .and_then(|day| day.parent())
            .and_then(|parent| parent.parent());
        let Some(host) = host else {
            debug!("day button has no grandparent; resource control skipped");
            return Ok(false);
        };

        let button = create_button(&host, &catalog.labels.meeting_room, Placement::Prepend)
            .stage("resource-setup")?;
        button.set_id(catalog.ids.resource_button.as_str());
        button.set_class_name(catalog.controls.control_class.as_str());
        self.bind(&button);
        info!("resource toggle setup complete");
        Ok(true)
    }

    pub fn control(&self) -> Option<ToggleControl> {
        let catalog = self.surface.catalog();
        self.surface
            .document()
            .get_element_by_id(&catalog.ids.resource_button)
            .map(|el| ToggleControl::new(el, catalog.controls.active_class.as_str()))
    }

    /// User-facing activation: flip, run show or hide, roll back on failure.
    pub async fn activate(&self) -> Result<bool, FlowError> {
        let control = self
            .control()
            .ok_or_else(|| ActionError::MissingTarget("resource control".into()))
            .stage("resource-toggle")?;
        control
            .switch(|show| async move {
                if show {
                    self.show().await
                } else {
                    self.hide().await
                }
            })
            .await
    }

    pub async fn show(&self) -> Result<(), FlowError> {
        let catalog = self.surface.catalog();
        let labels = &catalog.labels;
        let ids = &catalog.ids;

        self.surface.open(SurfaceDisplay::Shown).await?;
        self.surface
            .click_label(&ids.settings, &["a"], &single(&labels.meeting_room), "resource-tab")
            .await?;
        self.surface
            .wait(&catalog.selectors.facility_series, "facility-series")
            .await?;
        self.surface
            .click_label(&ids.settings, &["button"], &labels.select_all, "select-all")
            .await?;
        self.surface
            .click_label(&ids.meeting_search_modal, &["button"], &labels.save, "resource-save")
            .await?;
        self.surface.close().await?;
        info!("resource view shown");
        Ok(())
    }

    pub async fn hide(&self) -> Result<(), FlowError> {
        let catalog = self.surface.catalog();
        let labels = &catalog.labels;
        let ids = &catalog.ids;

        self.surface.open(SurfaceDisplay::Shown).await?;
        self.surface
            .click_label(&ids.settings, &["a"], &single(&labels.meeting_room), "resource-tab")
            .await?;
        self.surface
            .click_label(
                &ids.calendar_modal,
                &["button"],
                &labels.search_meeting_room,
                "resource-search",
            )
            .await?;
        self.surface
            .wait(&catalog.selectors.facility_series, "facility-series")
            .await?;
        self.surface
            .click_label(&ids.meeting_search_modal, &CLEAR_TAGS, &labels.clear, "clear")
            .await?;
        self.surface
            .click_label(&ids.meeting_search_modal, &["button"], &labels.save, "resource-save")
            .await?;
        self.surface.close().await?;
        info!("resource view hidden");
        Ok(())
    }

    fn bind(self: &Arc<Self>, button: &Element) {
        let flow: Weak<Self> = Arc::downgrade(self);
        let tasks = self.tasks.clone();
        button.on("click", move |_| {
            let Some(flow) = flow.upgrade() else {
                return;
            };
            tasks.spawn("resource-toggle", async move { flow.activate().await });
        });
    }
}

fn single(label: &str) -> LabelSet {
    LabelSet::new([label])
}
