//! Session-wide mutable content state

use crate::types::navigation;
use crate::types::{NavEntry, Status, Tab, UserInfo};
use crate::utils::timer::TimerHandle;

/// The session-wide mutable state: current page, navigation tree, tabs,
/// popup, timers and session identity.
///
/// Constructed once per session; a reload discards it. Collaborators read
/// it as a model; mutation goes through the operations below (and the
/// session controller) so that derived flags never go stale.
#[derive(Debug, Default)]
pub struct ContentState {
    /// Current page identifier
    pub page: Option<String>,
    /// Navigation tree; `active` flags are recomputed, never stale
    pub nav_entries: Vec<NavEntry>,
    /// Open tabs in display order; at most one is active
    pub tabs: Vec<Tab>,
    /// Modal popup, mutually exclusive with the single-tab "top" placement
    /// as a response target
    pub popup: Option<Tab>,
    /// Authenticated user
    pub user: Option<UserInfo>,
    /// Current status banner
    pub status: Option<Status>,
    /// Session token attached to mutating requests
    pub rtoken: Option<String>,
    /// External URL the routing collaborator should leave the app for
    pub redirect: Option<String>,
    /// Whether a request is in flight
    pub is_loading: bool,
    pub(crate) ping_timer: Option<TimerHandle>,
    pub(crate) refresh_timer: Option<TimerHandle>,
}

impl ContentState {
    /// Creates an empty session state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Recomputes the navigation tree's `active` flags from the current
    /// page. Idempotent.
    pub fn recompute_active_state(&mut self) {
        navigation::recompute_active_state(&mut self.nav_entries, self.page.as_deref());
    }

    /// Whether `key` appears in the flattened navigation tree.
    #[must_use]
    pub fn nav_contains(&self, key: &str) -> bool {
        navigation::contains_key(&self.nav_entries, key)
    }

    /// The currently active tab, if any.
    #[must_use]
    pub fn active_tab(&self) -> Option<&Tab> {
        self.tabs.iter().find(|t| t.active)
    }

    /// Whether the tab bar is shown (more than one open tab).
    #[must_use]
    pub fn show_tabs(&self) -> bool {
        self.tabs.len() > 1
    }

    /// Activates the tab at `index` and deactivates all others.
    pub fn activate_tab(&mut self, index: usize) {
        if index >= self.tabs.len() {
            log::warn!("activate_tab: index {index} out of range");
            return;
        }
        for tab in &mut self.tabs {
            tab.active = false;
        }
        self.tabs[index].active = true;
    }

    /// Closes the tab at `index`. If the active tab was closed, the last
    /// remaining tab becomes active.
    pub fn close_tab(&mut self, index: usize) {
        if index >= self.tabs.len() {
            log::warn!("close_tab: index {index} out of range");
            return;
        }
        self.tabs.remove(index);
        if self.tabs.iter().all(|t| !t.active) {
            if let Some(last) = self.tabs.last_mut() {
                last.active = true;
            }
        }
    }

    /// Discards the popup.
    pub fn clear_popup(&mut self) {
        self.popup = None;
    }

    /// Hands the pending external redirect to the routing collaborator.
    #[must_use]
    pub fn take_redirect(&mut self) -> Option<String> {
        self.redirect.take()
    }

    pub(crate) fn cancel_ping_timer(&mut self) {
        if let Some(timer) = self.ping_timer.take() {
            timer.cancel();
        }
    }

    pub(crate) fn cancel_refresh_timer(&mut self) {
        if let Some(timer) = self.refresh_timer.take() {
            timer.cancel();
        }
    }
}
