//! Browser events and metadata lookups consumed by the tracker.

use serde::{Deserialize, Serialize};

use crate::session::{TabId, WindowId};

/// Tab metadata as reported by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tab {
    /// Missing for tabs that have no usable id (e.g. devtools).
    pub id: Option<TabId>,
    pub window_id: Option<WindowId>,
    pub url: Option<String>,
    #[serde(default)]
    pub active: bool,
}

/// Window metadata, including its tabs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
    #[serde(default)]
    pub focused: bool,
    #[serde(default)]
    pub tabs: Vec<Tab>,
}

impl Window {
    /// The window's active tab, if it has one.
    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.active)
    }
}

/// Lookups the tracker performs against the browser while handling an event.
///
/// A failed lookup (the tab closed in the meantime, the window is gone) is
/// reported as `None`.
pub trait BrowserEnvironment {
    /// The last focused window, populated with its tabs.
    fn focused_window(&self) -> Option<Window>;

    /// The active tab in `window_id`.
    fn active_tab(&self, window_id: WindowId) -> Option<Tab>;

    /// Looks up a tab by id.
    fn tab(&self, tab_id: TabId) -> Option<Tab>;
}

/// A point-in-time picture of the browser's windows.
///
/// The default snapshot has no windows, so every lookup misses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowserSnapshot {
    #[serde(default)]
    pub windows: Vec<Window>,
}

impl BrowserSnapshot {
    pub const fn new(windows: Vec<Window>) -> Self {
        Self { windows }
    }
}

impl BrowserEnvironment for BrowserSnapshot {
    fn focused_window(&self) -> Option<Window> {
        self.windows
            .iter()
            .find(|window| window.focused)
            .or_else(|| self.windows.first())
            .cloned()
    }

    fn active_tab(&self, window_id: WindowId) -> Option<Tab> {
        self.windows
            .iter()
            .find(|window| window.id == window_id)
            .and_then(Window::active_tab)
            .cloned()
    }

    fn tab(&self, tab_id: TabId) -> Option<Tab> {
        self.windows
            .iter()
            .flat_map(|window| &window.tabs)
            .find(|tab| tab.id == Some(tab_id))
            .cloned()
    }
}

/// A discrete signal from the browser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BrowserEvent {
    /// The extension host started or was installed.
    ProcessStart,
    /// A tab became the active tab of its window.
    TabActivated { tab_id: TabId, window_id: WindowId },
    /// A tab's properties changed. Only URL changes matter.
    TabUpdated {
        tab_id: TabId,
        #[serde(default)]
        url: Option<String>,
        tab: Tab,
    },
    /// OS focus moved to a window, or to no browser window (`None`).
    WindowFocusChanged {
        #[serde(default)]
        window_id: Option<WindowId>,
    },
    /// A tab was closed.
    TabRemoved { tab_id: TabId },
}

impl BrowserEvent {
    /// Short name used in logs.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::ProcessStart => "process_start",
            Self::TabActivated { .. } => "tab_activated",
            Self::TabUpdated { .. } => "tab_updated",
            Self::WindowFocusChanged { .. } => "window_focus_changed",
            Self::TabRemoved { .. } => "tab_removed",
        }
    }
}
