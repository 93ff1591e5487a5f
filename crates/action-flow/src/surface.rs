//! Configuration surface stages: open, act, commit/close

use std::sync::Arc;
use std::time::Duration;

use action_locator::{ChainResolver, ElementResolver, LabelSet};
use action_primitives::{
    find_in_id, ActionPrimitives, ClickReport, Condition, LabelQuery, ObserverConfig, Target,
    WaitRequest,
};
use dom_tree::{Document, Element};
use tracing::debug;

use crate::errors::{FlowError, StageExt};
use crate::types::{SurfaceCatalog, SurfaceDisplay};

/// The application's settings surface, driven through the action primitives.
pub struct SettingsSurface {
    primitives: Arc<dyn ActionPrimitives>,
    resolver: ChainResolver<dyn ActionPrimitives>,
    document: Document,
    catalog: Arc<SurfaceCatalog>,
    timeouts: ObserverConfig,
}

impl SettingsSurface {
    pub fn new(
        primitives: Arc<dyn ActionPrimitives>,
        document: Document,
        catalog: Arc<SurfaceCatalog>,
        timeouts: ObserverConfig,
    ) -> Self {
        Self {
            resolver: ChainResolver::new(primitives.clone()),
            primitives,
            document,
            catalog,
            timeouts,
        }
    }

    pub fn catalog(&self) -> &SurfaceCatalog {
        &self.catalog
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn flow_timeout(&self) -> Duration {
        self.timeouts.flow_timeout()
    }

    /// Activate the entry point and wait for the surface root.
    pub async fn open(&self, display: SurfaceDisplay) -> Result<Element, FlowError> {
        let entry = self
            .resolver
            .resolve(&self.catalog.all_view_chain(), self.flow_timeout())
            .await
            .stage("open")?;
        self.click(&entry.element, "open").await?;

        let root = self
            .wait(&self.catalog.selectors.settings_root, "open")
            .await?;
        let mode = display.as_css();
        root.set_style("display", mode);
        debug!(display = mode, "settings surface open");
        Ok(root)
    }

    /// Activate the save control if the surface has one. Returns whether it did.
    pub async fn close(&self) -> Result<bool, FlowError> {
        let save = find_in_id(
            &self.document,
            &self.catalog.ids.settings,
            &["button"],
            self.catalog.labels.save.labels(),
        );
        match save {
            Some(button) => {
                self.click(&button, "close").await?;
                debug!("settings surface committed");
                Ok(true)
            }
            None => {
                debug!("no save control; surface auto-commits");
                Ok(false)
            }
        }
    }

    /// Wait for a structural query with the flow-level budget.
    pub async fn wait(&self, selector: &str, stage: &str) -> Result<Element, FlowError> {
        self.primitives
            .wait_for(WaitRequest::css(selector).timeout(self.flow_timeout()))
            .await
            .stage(stage)
    }

    /// Wait for a label match inside region `id`, then click it.
    pub async fn click_label(
        &self,
        id: &str,
        tags: &[&str],
        labels: &LabelSet,
        stage: &str,
    ) -> Result<ClickReport, FlowError> {
        let query: LabelQuery = labels.query(tags, Some(id));
        let target = Condition::Label(query);
        let element = self
            .primitives
            .wait_for(WaitRequest::new(target).timeout(self.flow_timeout()))
            .await
            .stage(stage)?;
        self.click(&element, stage).await
    }

    pub async fn click(&self, element: &Element, stage: &str) -> Result<ClickReport, FlowError> {
        let report = self
            .primitives
            .click_logged(Some(Target::from(element)))
            .await
            .stage(stage)?;
        debug!(stage, action_id = %report.action_id, "stage activated");
        Ok(report)
    }
}
