//! Lookup tables consumed by the flows
//!
//! Labels, selectors and region ids are data supplied from outside. The
//! defaults reproduce the deployed scheduler's markup.

use action_locator::{LabelSet, LocatorChain};
use dom_tree::Selector;
use serde::{Deserialize, Serialize};

use crate::errors::FlowError;

/// Placeholder for the one-based row position in
/// [`CatalogSelectors::group_row_template`].
pub const ROW_PLACEHOLDER: &str = "{n}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogLabels {
    pub all_view: String,
    pub save: LabelSet,
    pub day: String,
    pub meeting_room: String,
    pub select_all: LabelSet,
    pub clear: LabelSet,
    pub search_meeting_room: LabelSet,
}

impl Default for CatalogLabels {
    fn default() -> Self {
        Self {
            all_view: "一覧表示".into(),
            save: LabelSet::new(["設定", "保存"]),
            day: "日".into(),
            meeting_room: "会議室".into(),
            select_all: LabelSet::new(["全てを選択", "全選択"]),
            clear: LabelSet::new([
                "選択を解除",
                "選択解除",
                "解除",
                "全てを解除",
                "全解除",
                "表示スケジュールをリセット",
                "リセット",
            ]),
            search_meeting_room: LabelSet::new(["会議室を検索", "会議室を解除", "会議室解除"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSelectors {
    /// Entry-point control, most specific first
    pub all_view_candidates: Vec<String>,
    pub settings_root: String,
    pub group_title: String,
    pub toolbar_chunk: String,
    pub facility_series: String,
    /// Row inside the settings surface; `{n}` is the one-based child position
    pub group_row_template: String,
}

impl Default for CatalogSelectors {
    fn default() -> Self {
        Self {
            all_view_candidates: vec![
                "[data-original-title='一覧表示']".into(),
                ".fc-showScheduleOfOtherMember-button".into(),
                "[class*='showScheduleOfOtherMember']".into(),
            ],
            settings_root: "#calendarSetting".into(),
            group_title: "#calendarSetting .titleHeadline".into(),
            toolbar_chunk: ".fc-toolbar-chunk".into(),
            facility_series: ".containerSeriesFacility, .seriesFacility.input-group".into(),
            group_row_template: ".mb-5 > div:nth-child({n}) span".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogIds {
    pub settings: String,
    pub calendar_modal: String,
    pub meeting_search_modal: String,
    pub calendar_main: String,
    pub group_container: String,
    pub resource_button: String,
}

impl Default for CatalogIds {
    fn default() -> Self {
        Self {
            settings: "calendarSetting".into(),
            calendar_modal: "containerRegisterSchedule_0-ModalCalensarSetting".into(),
            meeting_search_modal: "containerRegisterSchedule_1-meetingRoomSearchFromCalendarSetting"
                .into(),
            calendar_main: "calendarMain".into(),
            group_container: "GroupViewToggleBottons".into(),
            resource_button: "KaigiToggleButton".into(),
        }
    }
}

/// Classes and offsets of the generated toggle controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    pub control_class: String,
    pub active_class: String,
    /// Child position of the first group row
    pub group_row_offset: usize,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            control_class: "groupBtn".into(),
            active_class: "isActive".into(),
            group_row_offset: 3,
        }
    }
}

/// Everything the flows look up in the controlled application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SurfaceCatalog {
    pub labels: CatalogLabels,
    pub selectors: CatalogSelectors,
    pub ids: CatalogIds,
    pub controls: ControlSettings,
}

impl SurfaceCatalog {
    /// Entry-point candidates: the structural selectors, then the label
    /// inside the calendar region as a last resort.
    pub fn all_view_chain(&self) -> LocatorChain {
        LocatorChain::css("all-view", self.selectors.all_view_candidates.iter().cloned()).then(
            LabelSet::new([self.labels.all_view.as_str()])
                .query(&["button"], Some(self.ids.calendar_main.as_str())),
        )
    }

    /// Row selector for the group at zero-based `index`.
    pub fn group_row_selector(&self, index: usize) -> String {
        let position = index + self.controls.group_row_offset;
        self.selectors
            .group_row_template
            .replace(ROW_PLACEHOLDER, &position.to_string())
    }

    pub fn validate(&self) -> Result<(), FlowError> {
        if self.selectors.all_view_candidates.is_empty() {
            return Err(FlowError::InvalidCatalog(
                "selectors.all_view_candidates is empty".into(),
            ));
        }
        if !self.selectors.group_row_template.contains(ROW_PLACEHOLDER) {
            return Err(FlowError::InvalidCatalog(format!(
                "selectors.group_row_template lacks {ROW_PLACEHOLDER}"
            )));
        }

        let mut selectors: Vec<(&str, String)> = vec![
            ("settings_root", self.selectors.settings_root.clone()),
            ("group_title", self.selectors.group_title.clone()),
            ("toolbar_chunk", self.selectors.toolbar_chunk.clone()),
            ("facility_series", self.selectors.facility_series.clone()),
            ("group_row_template", self.group_row_selector(0)),
        ];
        selectors.extend(
            self.selectors
                .all_view_candidates
                .iter()
                .map(|s| ("all_view_candidates", s.clone())),
        );
        for (field, selector) in selectors {
            Selector::parse(&selector).map_err(|err| {
                FlowError::InvalidCatalog(format!("selectors.{field}: {err}"))
            })?;
        }

        let label_sets = [
            ("save", &self.labels.save),
            ("select_all", &self.labels.select_all),
            ("clear", &self.labels.clear),
            ("search_meeting_room", &self.labels.search_meeting_room),
        ];
        for (field, set) in label_sets {
            if set.is_empty() {
                return Err(FlowError::InvalidCatalog(format!("labels.{field} is empty")));
            }
        }
        Ok(())
    }
}

/// Display mode forced on the settings surface once it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceDisplay {
    /// Unattended flows
    Hidden,
    /// Flows the user should see
    Shown,
}

impl SurfaceDisplay {
    pub fn as_css(&self) -> &'static str {
        match self {
            SurfaceDisplay::Hidden => "none",
            SurfaceDisplay::Shown => "block",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use action_primitives::Condition;

    #[test]
    fn defaults_validate() {
        SurfaceCatalog::default().validate().unwrap();
    }

    #[test]
    fn group_rows_start_at_the_offset() {
        let catalog = SurfaceCatalog::default();
        assert_eq!(
            catalog.group_row_selector(0),
            ".mb-5 > div:nth-child(3) span"
        );
        assert_eq!(
            catalog.group_row_selector(2),
            ".mb-5 > div:nth-child(5) span"
        );
    }

    #[test]
    fn entry_chain_ends_with_the_label_fallback() {
        let chain = SurfaceCatalog::default().all_view_chain();
        assert_eq!(chain.candidates.len(), 4);
        assert!(matches!(chain.candidates[3], Condition::Label(_)));
    }

    #[test]
    fn template_without_placeholder_is_rejected() {
        let mut catalog = SurfaceCatalog::default();
        catalog.selectors.group_row_template = ".mb-5 span".into();
        assert!(matches!(
            catalog.validate(),
            Err(FlowError::InvalidCatalog(_))
        ));
    }

    #[test]
    fn unsupported_selector_is_rejected() {
        let mut catalog = SurfaceCatalog::default();
        catalog.selectors.settings_root = "#calendarSetting:hover".into();
        let err = catalog.validate().unwrap_err();
        assert!(err.to_string().contains("settings_root"));
    }

    #[test]
    fn partial_overrides_keep_defaults() {
        let catalog: SurfaceCatalog =
            serde_json::from_str(r#"{"ids": {"settings": "otherSetting"}}"#).unwrap();
        assert_eq!(catalog.ids.settings, "otherSetting");
        assert_eq!(catalog.ids.calendar_main, "calendarMain");
        assert_eq!(catalog.labels.save.labels(), ["設定", "保存"]);
    }
}
