//! The session-tracking state machine.
//!
//! At most one session is open at a time. Every event handler first closes
//! the current session, committing its elapsed time to the aggregation store,
//! and only then considers opening a new one. Committed time is split at
//! local midnights so no single `add_time` call spans two days.
//!
//! Handlers take `&mut self`, so a single [`Tracker`] serializes its own
//! read-modify-write cycles. Hosts that share one backend between processes
//! must add their own exclusion around each event.

use std::fmt;

use chrono::TimeZone;

use crate::browser::{BrowserEnvironment, BrowserEvent, Tab, Window};
use crate::clock::Clock;
use crate::codec::{is_trackable_url, normalize_url};
use crate::day::{DayKey, split_interval};
use crate::session::{SessionState, SessionStore, TabId, WindowId};
use crate::store::{AggregationStore, ObjectStore, StoreError};

/// Retention window applied when none is configured.
pub const DEFAULT_RETAIN_DAYS: u32 = 31;

/// Why a session was closed. Only used for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    TabActivated,
    UrlUpdated,
    WindowBlur,
    WindowFocusSwitch,
    TabClosed,
}

impl CloseReason {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TabActivated => "tab_activated",
            Self::UrlUpdated => "url_updated",
            Self::WindowBlur => "window_blur",
            Self::WindowFocusSwitch => "window_focus_switch",
            Self::TabClosed => "tab_closed",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decides when URL sessions start and stop and records their time.
pub struct Tracker<S, C, Tz> {
    store: S,
    clock: C,
    tz: Tz,
    retain_days: u32,
}

impl<S, C, Tz> Tracker<S, C, Tz>
where
    S: ObjectStore,
    C: Clock,
    Tz: TimeZone,
{
    /// Creates a tracker computing day keys in `tz`.
    pub const fn new(store: S, clock: C, tz: Tz) -> Self {
        Self {
            store,
            clock,
            tz,
            retain_days: DEFAULT_RETAIN_DAYS,
        }
    }

    /// Sets how many days of history survive pruning.
    #[must_use]
    pub fn with_retain_days(mut self, retain_days: u32) -> Self {
        self.retain_days = retain_days;
        self
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    /// The time zone day keys are computed in.
    pub const fn time_zone(&self) -> &Tz {
        &self.tz
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// The current persisted session state.
    pub fn state(&self) -> Result<SessionState, StoreError> {
        self.store.load_session_state()
    }

    /// Today's day key according to the tracker's clock and time zone.
    pub fn today(&self) -> Option<DayKey> {
        DayKey::from_epoch_ms(self.clock.now_ms(), &self.tz)
    }

    /// Dispatches one browser event.
    pub fn handle<E>(&mut self, event: &BrowserEvent, env: &E) -> Result<(), StoreError>
    where
        E: BrowserEnvironment + ?Sized,
    {
        tracing::debug!(event = event.kind(), "handling browser event");
        match event {
            BrowserEvent::ProcessStart => self.on_process_start(env),
            BrowserEvent::TabActivated { tab_id, window_id } => {
                self.on_tab_activated(*tab_id, *window_id, env)
            }
            BrowserEvent::TabUpdated { tab_id, url, tab } => {
                self.on_tab_updated(*tab_id, url.as_deref(), tab)
            }
            BrowserEvent::WindowFocusChanged { window_id } => {
                self.on_window_focus_changed(*window_id, env)
            }
            BrowserEvent::TabRemoved { tab_id } => self.on_tab_removed(*tab_id),
        }
    }

    /// Resets state from the focused window; no timer survives a restart.
    pub fn on_process_start<E>(&mut self, env: &E) -> Result<(), StoreError>
    where
        E: BrowserEnvironment + ?Sized,
    {
        self.prune()?;

        let previous = self.store.load_session_state()?;
        if previous.is_running() {
            tracing::info!(
                url = previous.active_url.as_deref(),
                "discarding timer left over from previous run"
            );
        }

        let window = env.focused_window();
        let focused = window.as_ref().is_some_and(|w| w.focused);
        let tab = window.as_ref().and_then(Window::active_tab);
        let window_id = window.as_ref().map(|w| w.id);

        let state = SessionState {
            active_tab_id: tab.and_then(|t| t.id),
            active_window_id: window_id,
            active_url: tab.and_then(|t| t.url.as_deref()).and_then(trackable_url),
            started_at: None,
            window_focused: focused,
        };
        self.store.save_session_state(&state)?;

        if focused && tab.is_some() {
            self.open_if_eligible(tab, true, window_id)?;
        }
        Ok(())
    }

    /// A tab became active in some window.
    pub fn on_tab_activated<E>(
        &mut self,
        tab_id: TabId,
        window_id: WindowId,
        env: &E,
    ) -> Result<(), StoreError>
    where
        E: BrowserEnvironment + ?Sized,
    {
        let state = self.store.load_session_state()?;
        let focused = state.window_focused && state.active_window_id == Some(window_id);
        let tab = env.tab(tab_id);
        self.transition_to(
            tab.as_ref(),
            focused,
            Some(window_id),
            CloseReason::TabActivated,
        )
    }

    /// A tab's URL changed. Only the tracked tab matters.
    pub fn on_tab_updated(
        &mut self,
        tab_id: TabId,
        url: Option<&str>,
        tab: &Tab,
    ) -> Result<(), StoreError> {
        let Some(url) = url else {
            return Ok(());
        };
        let mut state = self.store.load_session_state()?;
        if state.active_tab_id != Some(tab_id) {
            tracing::debug!(%tab_id, "ignoring update for untracked tab");
            return Ok(());
        }

        if !state.window_focused {
            // No timer is running; remember the URL for the next focus.
            state.active_url = trackable_url(url);
            return self.store.save_session_state(&state);
        }

        self.transition_to(Some(tab), true, tab.window_id, CloseReason::UrlUpdated)
    }

    /// OS focus moved to `window_id`, or away from the browser when `None`.
    pub fn on_window_focus_changed<E>(
        &mut self,
        window_id: Option<WindowId>,
        env: &E,
    ) -> Result<(), StoreError>
    where
        E: BrowserEnvironment + ?Sized,
    {
        let Some(window_id) = window_id else {
            let mut state = self.close_session(CloseReason::WindowBlur)?;
            state.window_focused = false;
            state.active_window_id = None;
            state.started_at = None;
            return self.store.save_session_state(&state);
        };

        let tab = env.active_tab(window_id);
        let mut state = self.close_session(CloseReason::WindowFocusSwitch)?;
        state.window_focused = true;
        state.active_window_id = Some(window_id);
        state.started_at = None;
        self.store.save_session_state(&state)?;
        self.open_if_eligible(tab.as_ref(), true, Some(window_id))?;
        Ok(())
    }

    /// A tab was closed.
    pub fn on_tab_removed(&mut self, tab_id: TabId) -> Result<(), StoreError> {
        let state = self.store.load_session_state()?;
        if state.active_tab_id != Some(tab_id) {
            return Ok(());
        }

        let mut state = self.close_session(CloseReason::TabClosed)?;
        state.active_tab_id = None;
        state.active_url = None;
        state.started_at = None;
        self.store.save_session_state(&state)
    }

    /// Closes the current session, then opens one for `tab` if eligible.
    pub fn transition_to(
        &mut self,
        tab: Option<&Tab>,
        window_focused: bool,
        window_id: Option<WindowId>,
        reason: CloseReason,
    ) -> Result<(), StoreError> {
        self.close_session(reason)?;
        self.open_if_eligible(tab, window_focused, window_id)?;
        Ok(())
    }

    /// Commits the open session's elapsed time and stops its timer.
    ///
    /// Does nothing if no timer is running. Returns the state as saved.
    pub fn close_session(&mut self, reason: CloseReason) -> Result<SessionState, StoreError> {
        let state = self.store.load_session_state()?;
        let (Some(start), Some(url)) = (state.started_at, state.active_url.clone()) else {
            return Ok(state);
        };

        let stopped = SessionState {
            started_at: None,
            ..state
        };
        let end = self.clock.now_ms();
        if end <= start {
            tracing::warn!(start, end, %reason, "clock went backwards, discarding interval");
            self.store.save_session_state(&stopped)?;
            return Ok(stopped);
        }

        let mut recorded_ms: i64 = 0;
        for (day, ms) in split_interval(start, end, &self.tz) {
            self.store.add_time(&day, &url, ms)?;
            recorded_ms = recorded_ms.saturating_add(ms);
        }
        tracing::info!(url = url.as_str(), recorded_ms, %reason, "committed session");

        self.prune()?;
        self.store.save_session_state(&stopped)?;
        Ok(stopped)
    }

    /// Starts timing `tab` if the window is focused and its URL is trackable.
    ///
    /// Returns whether a session was opened.
    pub fn open_if_eligible(
        &mut self,
        tab: Option<&Tab>,
        window_focused: bool,
        window_id: Option<WindowId>,
    ) -> Result<bool, StoreError> {
        if !window_focused {
            return Ok(false);
        }
        let Some(tab) = tab else {
            return Ok(false);
        };
        let Some(tab_id) = tab.id else {
            return Ok(false);
        };
        let Some(url) = tab.url.as_deref().and_then(trackable_url) else {
            tracing::debug!(%tab_id, "tab is not trackable");
            return Ok(false);
        };

        let previous = self.store.load_session_state()?;
        let state = SessionState {
            active_tab_id: Some(tab_id),
            active_window_id: window_id.or(tab.window_id).or(previous.active_window_id),
            active_url: Some(url),
            started_at: Some(self.clock.now_ms()),
            window_focused: true,
        };
        tracing::debug!(%tab_id, url = state.active_url.as_deref(), "opened session");
        self.store.save_session_state(&state)?;
        Ok(true)
    }

    /// Applies the retention window relative to today.
    pub fn prune(&mut self) -> Result<Vec<DayKey>, StoreError> {
        let Some(today) = self.today() else {
            return Ok(Vec::new());
        };
        self.store.cleanup_old_days(self.retain_days, today)
    }
}

/// Normalized form of `raw` if it should be timed.
fn trackable_url(raw: &str) -> Option<String> {
    if is_trackable_url(raw) {
        normalize_url(raw)
    } else {
        None
    }
}
