//! The persisted session state record.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::store::{ObjectStore, SESSION_STATE_KEY, StoreError, read_or_default, write_json};

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

/// Browser window identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WindowId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What, if anything, is being timed right now.
///
/// `started_at` is only set while time is accruing for `active_url`. A record
/// with a URL but no `started_at` is a tracked target whose timer is paused,
/// usually because its window lost focus.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub active_tab_id: Option<TabId>,
    pub active_window_id: Option<WindowId>,
    /// Normalized URL being timed.
    pub active_url: Option<String>,
    /// Epoch milliseconds when the current interval began.
    pub started_at: Option<i64>,
    pub window_focused: bool,
}

impl SessionState {
    /// Whether a timer is currently running.
    pub const fn is_running(&self) -> bool {
        self.started_at.is_some() && self.active_url.is_some()
    }

    /// Milliseconds accrued so far in the open interval, if any.
    pub fn elapsed_ms(&self, now_ms: i64) -> Option<i64> {
        if self.active_url.is_none() {
            return None;
        }
        self.started_at.map(|start| (now_ms - start).max(0))
    }
}

/// Load/save of the single [`SessionState`] record.
///
/// Implemented for every [`ObjectStore`].
pub trait SessionStore: ObjectStore {
    fn load_session_state(&self) -> Result<SessionState, StoreError> {
        read_or_default(self, SESSION_STATE_KEY)
    }

    fn save_session_state(&mut self, state: &SessionState) -> Result<(), StoreError> {
        write_json(self, SESSION_STATE_KEY, state)
    }
}

impl<S: ObjectStore + ?Sized> SessionStore for S {}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::store::MemoryStore;

    #[test]
    fn absent_state_is_fresh_default() {
        let store = MemoryStore::new();
        let state = store.load_session_state().unwrap();
        assert_eq!(state, SessionState::default());
        assert!(!state.window_focused);
        assert!(!state.is_running());
    }

    #[test]
    fn state_persists_in_camel_case() {
        let mut store = MemoryStore::new();
        let state = SessionState {
            active_tab_id: Some(TabId(12)),
            active_window_id: Some(WindowId(3)),
            active_url: Some("https://a.com/".to_string()),
            started_at: Some(1_704_153_598_000),
            window_focused: true,
        };
        store.save_session_state(&state).unwrap();

        let json = store.read_object(SESSION_STATE_KEY).unwrap().unwrap();
        assert_eq!(
            json,
            r#"{"activeTabId":12,"activeWindowId":3,"activeUrl":"https://a.com/","startedAt":1704153598000,"windowFocused":true}"#
        );
        assert_eq!(store.load_session_state().unwrap(), state);
    }

    #[test]
    fn partial_state_fills_defaults() {
        let state: SessionState = serde_json::from_str(r#"{"activeUrl":"https://a.com/"}"#).unwrap();
        assert_eq!(state.active_url.as_deref(), Some("https://a.com/"));
        assert_eq!(state.started_at, None);
        assert!(!state.window_focused);
    }

    #[test]
    fn elapsed_requires_running_timer() {
        let mut state = SessionState {
            active_url: Some("https://a.com/".to_string()),
            ..SessionState::default()
        };
        assert_eq!(state.elapsed_ms(10_000), None);

        state.started_at = Some(4_000);
        assert_eq!(state.elapsed_ms(10_000), Some(6_000));
        assert_eq!(state.elapsed_ms(1_000), Some(0));
    }
}
