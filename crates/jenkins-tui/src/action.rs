//! Actions: every state change in the app flows through one of these.
//!
//! Terminal events become actions, background fetches finish as actions,
//! and the refresh scheduler ticks as an action.

use std::sync::Arc;

use jenkins_api::{Client, RootInfo};
use jenkins_config::Profile;

use crate::screen::TabId;
use crate::tabs::builds::BuildsMsg;
use crate::tabs::dashboard::DashboardMsg;
use crate::tabs::views::ViewsMsg;

/// Outcome of a background API call. The error is shared so messages stay
/// cheap to move around and log.
pub type ApiResult<T> = Result<T, Arc<jenkins_api::Error>>;

#[derive(Debug)]
pub enum Action {
    // ── Lifecycle ────────────────────────────────────────────
    Quit,
    Tick,
    Render,
    Resize(u16, u16),

    // ── Global UI ────────────────────────────────────────────
    ToggleHelp,
    ToggleAutoRefresh,
    SwitchTab(TabId),
    /// Reconnect after a failure.
    Retry,
    Notify(Notification),

    // ── Connection ───────────────────────────────────────────
    /// The setup wizard produced a valid profile.
    SetupComplete(Box<Profile>),
    /// Connection check succeeded.
    ClientReady(Arc<Client>, Box<RootInfo>),
    ClientFailed(Arc<jenkins_api::Error>),
    /// Auto-refresh fired; carries the scheduler generation that produced it.
    AutoRefreshTick(u64),

    // ── Tab data ─────────────────────────────────────────────
    Dashboard(DashboardMsg),
    Views(ViewsMsg),
    Builds(BuildsMsg),
}

impl Action {
    /// The tab a data message belongs to, if any.
    pub fn target_tab(&self) -> Option<TabId> {
        match self {
            Self::Dashboard(_) => Some(TabId::Dashboard),
            Self::Views(_) => Some(TabId::Views),
            Self::Builds(_) => Some(TabId::Builds),
            _ => None,
        }
    }
}

/// Notification severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Success,
    Error,
}

/// A toast notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub level: NotificationLevel,
}

impl Notification {
    pub fn success(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Success,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Error,
        }
    }

    pub fn info(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
            level: NotificationLevel::Info,
        }
    }
}
