//! Instance record - The linked tab, window, session and view of one running session

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::host::{SessionId, TabId, ViewId, WindowId};

/// Lifecycle state, derived from the registry's record and creation guard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LifecycleState {
    /// No instance and no creation in flight
    Empty,
    /// A creation sequence is running (or failed with the guard held)
    Creating,
    /// An instance is live
    Active,
}

impl LifecycleState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Creating => "Creating",
            Self::Active => "Active",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// The four host resources that make up a live instance.
///
/// A record only exists once every resource has been created and linked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceRecord {
    pub tab_id: TabId,
    pub window_id: WindowId,
    pub session_id: SessionId,
    pub view_id: ViewId,
    /// When the creation sequence completed
    pub created_at: DateTime<Utc>,
}

impl InstanceRecord {
    pub fn new(tab_id: TabId, window_id: WindowId, session_id: SessionId, view_id: ViewId) -> Self {
        Self {
            tab_id,
            window_id,
            session_id,
            view_id,
            created_at: Utc::now(),
        }
    }

    pub fn uptime(&self) -> chrono::Duration {
        Utc::now() - self.created_at
    }
}

/// Resources obtained so far by an in-flight creation sequence
#[derive(Debug, Default)]
pub(crate) struct PartialInstance {
    pub tab_id: Option<TabId>,
    pub window_id: Option<WindowId>,
    pub session_id: Option<SessionId>,
    pub view_id: Option<ViewId>,
}

impl PartialInstance {
    pub fn is_empty(&self) -> bool {
        self.tab_id.is_none()
            && self.window_id.is_none()
            && self.session_id.is_none()
            && self.view_id.is_none()
    }
}
