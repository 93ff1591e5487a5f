//! Simulated scheduler page
//!
//! Builds the markup the automation drives (toolbar, all-view entry, settings
//! surface, meeting-room sub-surfaces) on an in-memory document and reacts to
//! clicks the way the deployed application does. Used by the `demo` command
//! and the integration tests.

use std::sync::Arc;
use std::time::Duration;

use dom_tree::{Document, Element, WeakDocument};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tracing::debug;

const SETTINGS_ID: &str = "calendarSetting";
const CALENDAR_MODAL_ID: &str = "containerRegisterSchedule_0-ModalCalensarSetting";
const MEETING_MODAL_ID: &str = "containerRegisterSchedule_1-meetingRoomSearchFromCalendarSetting";

/// Shape and behavior of the simulated page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PageOptions {
    pub groups: Vec<String>,
    /// Delay before the settings surface renders after the entry click
    #[serde(with = "duration_text")]
    pub surface_delay: Duration,
    /// Render the facility series when the meeting-room tab is opened
    pub facility_series: bool,
    /// Render the day button in the toolbar
    pub day_button: bool,
}

impl Default for PageOptions {
    fn default() -> Self {
        Self {
            groups: vec!["Alpha".into(), "Beta".into(), "Gamma".into()],
            surface_delay: Duration::ZERO,
            facility_series: true,
            day_button: true,
        }
    }
}

mod duration_text {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceSelection {
    #[default]
    Untouched,
    All,
    Cleared,
}

/// What the page has seen so far.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PageState {
    pub surface_opens: usize,
    /// Saves on the settings surface
    pub settings_commits: usize,
    /// Saves inside the meeting-room search sub-surface
    pub resource_commits: usize,
    pub group_visible: Vec<bool>,
    pub pending_selection: ResourceSelection,
    pub committed_selection: ResourceSelection,
}

type SharedState = Arc<Mutex<PageState>>;

#[derive(Clone)]
pub struct SchedulerPage {
    document: Document,
    state: SharedState,
    options: Arc<PageOptions>,
}

impl SchedulerPage {
    pub fn new(options: PageOptions) -> Self {
        let document = Document::new();
        let state = Arc::new(Mutex::new(PageState {
            group_visible: vec![true; options.groups.len()],
            ..Default::default()
        }));
        let page = Self {
            document,
            state,
            options: Arc::new(options),
        };
        page.build_toolbar();
        page
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn options(&self) -> &PageOptions {
        &self.options
    }

    pub fn state(&self) -> PageState {
        self.state.lock().clone()
    }

    pub fn is_surface_open(&self) -> bool {
        self.document.get_element_by_id(SETTINGS_ID).is_some()
    }

    fn build_toolbar(&self) {
        let doc = &self.document;
        let main = element(doc, "div", &[("id", "calendarMain")], None);
        let toolbar = element(doc, "div", &[("class", "fc-header-toolbar fc-toolbar")], None);
        attach(&doc.body(), &main);
        attach(&main, &toolbar);

        let title_chunk = element(doc, "div", &[("class", "fc-toolbar-chunk")], None);
        attach(&toolbar, &title_chunk);
        attach(
            &title_chunk,
            &element(doc, "h2", &[("class", "fc-toolbar-title")], Some("2024年5月")),
        );

        let view_chunk = element(doc, "div", &[("class", "fc-toolbar-chunk")], None);
        let views = element(doc, "div", &[("class", "fc-button-group")], None);
        attach(&toolbar, &view_chunk);
        attach(&view_chunk, &views);
        attach(
            &views,
            &element(doc, "button", &[("class", "fc-dayGridMonth-button")], Some("月")),
        );
        attach(
            &views,
            &element(doc, "button", &[("class", "fc-timeGridWeek-button")], Some("週")),
        );
        if self.options.day_button {
            attach(
                &views,
                &element(doc, "button", &[("class", "fc-timeGridDay-button")], Some("日")),
            );
        }

        let entry_chunk = element(doc, "div", &[("class", "fc-toolbar-chunk")], None);
        let entry = element(
            doc,
            "button",
            &[
                ("class", "fc-showScheduleOfOtherMember-button fc-button"),
                ("data-original-title", "一覧表示"),
            ],
            Some("一覧表示"),
        );
        attach(&toolbar, &entry_chunk);
        attach(&entry_chunk, &entry);

        let weak = doc.downgrade();
        let state = self.state.clone();
        let options = self.options.clone();
        entry.on("click", move |_| {
            let delay = options.surface_delay;
            if delay.is_zero() {
                open_surface(&weak, &state, &options);
                return;
            }
            let Ok(handle) = Handle::try_current() else {
                return;
            };
            let (weak, state, options) = (weak.clone(), state.clone(), options.clone());
            handle.spawn(async move {
                tokio::time::sleep(delay).await;
                open_surface(&weak, &state, &options);
            });
        });
    }
}

fn open_surface(weak: &WeakDocument, state: &SharedState, options: &Arc<PageOptions>) {
    let Some(doc) = weak.upgrade() else {
        return;
    };
    if doc.get_element_by_id(SETTINGS_ID).is_some() {
        return;
    }
    state.lock().surface_opens += 1;

    let surface = element(&doc, "div", &[("id", SETTINGS_ID), ("class", "modal")], None);
    attach(
        &surface,
        &element(&doc, "h5", &[("class", "modal-title")], Some("カレンダー設定")),
    );

    let tabs = element(&doc, "ul", &[("class", "nav nav-tabs")], None);
    attach(&surface, &tabs);
    attach(&tabs, &element(&doc, "a", &[("class", "nav-link")], Some("グループ")));
    let meeting_tab = element(&doc, "a", &[("class", "nav-link")], Some("会議室"));
    attach(&tabs, &meeting_tab);

    // first two rows are headers; group rows start at the third child
    let rows = element(&doc, "div", &[("class", "mb-5")], None);
    attach(&surface, &rows);
    attach(&rows, &element(&doc, "div", &[("class", "rowHeader")], Some("表示グループ")));
    attach(&rows, &element(&doc, "div", &[("class", "rowHeader")], Some("全員")));
    for (index, title) in options.groups.iter().enumerate() {
        let row = element(&doc, "div", &[("class", "groupRow")], None);
        let label = element(&doc, "span", &[("class", "titleHeadline")], Some(title.as_str()));
        attach(&rows, &row);
        attach(&row, &label);
        let state = state.clone();
        label.on("click", move |_| {
            if let Some(visible) = state.lock().group_visible.get_mut(index) {
                *visible = !*visible;
            }
        });
    }

    let calendar_modal = element(&doc, "div", &[("id", CALENDAR_MODAL_ID)], None);
    let search = element(&doc, "button", &[("class", "btn")], Some("会議室を検索"));
    attach(&surface, &calendar_modal);
    attach(&calendar_modal, &search);

    let save = element(&doc, "button", &[("class", "btn btn-primary")], Some("設定"));
    attach(&surface, &save);
    attach(&doc.body(), &surface);

    let (weak_tab, tab_state, tab_options) = (weak.clone(), state.clone(), options.clone());
    meeting_tab.on("click", move |_| {
        render_meeting_room(&weak_tab, &tab_state, &tab_options);
    });
    let (weak_search, search_state, search_options) = (weak.clone(), state.clone(), options.clone());
    search.on("click", move |_| {
        render_meeting_room(&weak_search, &search_state, &search_options);
    });

    let (weak_save, save_state) = (weak.clone(), state.clone());
    save.on("click", move |_| {
        let Some(doc) = weak_save.upgrade() else {
            return;
        };
        save_state.lock().settings_commits += 1;
        for id in [SETTINGS_ID, MEETING_MODAL_ID] {
            if let Some(node) = doc.get_element_by_id(id) {
                node.remove();
            }
        }
        debug!("simulated settings surface saved");
    });
}

fn render_meeting_room(weak: &WeakDocument, state: &SharedState, options: &Arc<PageOptions>) {
    let Some(doc) = weak.upgrade() else {
        return;
    };
    let Some(surface) = doc.get_element_by_id(SETTINGS_ID) else {
        return;
    };
    if !options.facility_series {
        return;
    }

    if surface
        .query_selector(".containerSeriesFacility")
        .ok()
        .flatten()
        .is_none()
    {
        let series = element(&doc, "div", &[("class", "containerSeriesFacility")], None);
        let select_all = element(&doc, "button", &[("class", "btn")], Some("全てを選択"));
        attach(&surface, &series);
        attach(&series, &select_all);
        let state = state.clone();
        select_all.on("click", move |_| {
            state.lock().pending_selection = ResourceSelection::All;
        });
    }

    if doc.get_element_by_id(MEETING_MODAL_ID).is_none() {
        let modal = element(&doc, "div", &[("id", MEETING_MODAL_ID)], None);
        let clear = element(&doc, "span", &[("class", "link")], Some("全解除"));
        let save = element(&doc, "button", &[("class", "btn btn-primary")], Some("設定"));
        attach(&modal, &clear);
        attach(&modal, &save);
        attach(&doc.body(), &modal);

        let clear_state = state.clone();
        clear.on("click", move |_| {
            clear_state.lock().pending_selection = ResourceSelection::Cleared;
        });
        let save_state = state.clone();
        save.on("click", move |_| {
            let mut state = save_state.lock();
            state.resource_commits += 1;
            state.committed_selection = state.pending_selection;
        });
    }
}

fn element(doc: &Document, tag: &str, attrs: &[(&str, &str)], text: Option<&str>) -> Element {
    let node = doc.create_element(tag);
    for (name, value) in attrs {
        node.set_attr(name, *value);
    }
    if let Some(text) = text {
        node.set_text(text);
    }
    node
}

/// Append within the page's own document; a failure is only logged.
fn attach(parent: &Element, child: &Element) {
    if let Err(err) = parent.append_child(child) {
        debug!(error = %err, "simulated page append failed");
    }
}
