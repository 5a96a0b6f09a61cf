//! In-process host - Keeps host resources in memory and records every request
//!
//! Used by the interactive binary and by tests. Every request yields to the
//! scheduler before it is served, so concurrent handlers interleave at each
//! call the way they would against a real host.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, trace};
use uuid::Uuid;

use super::events::{EventSource, HostEvent};
use super::types::*;
use super::{
    HostError, HostResult, RuntimeService, SessionService, TabService, ViewService, WindowService,
};

/// Kind of host request, used for failure injection and call counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostOp {
    CreateTab,
    RemoveTab,
    UpdateTab,
    CreateWindow,
    RemoveWindow,
    RestoreWindow,
    FocusWindow,
    ContentSize,
    CreateSession,
    RemoveSession,
    SetWebRequestFilter,
    HeadersResponse,
    CreateView,
    RemoveView,
    LoadFile,
    FocusView,
    OpenDevTools,
    IsAudioMuted,
    SetAudioMuted,
    Permissions,
}

impl HostOp {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateTab => "tabs.create",
            Self::RemoveTab => "tabs.remove",
            Self::UpdateTab => "tabs.update",
            Self::CreateWindow => "windows.create",
            Self::RemoveWindow => "windows.remove",
            Self::RestoreWindow => "windows.restore",
            Self::FocusWindow => "windows.focus",
            Self::ContentSize => "windows.getContentSize",
            Self::CreateSession => "websessions.create",
            Self::RemoveSession => "websessions.remove",
            Self::SetWebRequestFilter => "websessions.setWebRequestFilter",
            Self::HeadersResponse => "websessions.webReceiveHeadersResponse",
            Self::CreateView => "webviews.create",
            Self::RemoveView => "webviews.remove",
            Self::LoadFile => "webviews.loadFile",
            Self::FocusView => "webviews.focus",
            Self::OpenDevTools => "webviews.openDevTools",
            Self::IsAudioMuted => "webviews.isAudioMuted",
            Self::SetAudioMuted => "webviews.setAudioMuted",
            Self::Permissions => "runtime.getPermissions",
        }
    }
}

impl std::fmt::Display for HostOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A request as served (or rejected) by the in-memory host
#[derive(Debug, Clone, PartialEq)]
pub enum HostCall {
    CreateTab(TabOptions, TabId),
    RemoveTab(TabId),
    UpdateTab(TabId, TabUpdate),
    CreateWindow(WindowOptions, WindowId),
    RemoveWindow(WindowId),
    RestoreWindow(WindowId),
    FocusWindow(WindowId),
    ContentSize(WindowId),
    CreateSession(SessionOptions, SessionId),
    RemoveSession(SessionId),
    SetWebRequestFilter(SessionId, RequestPhase),
    HeadersResponse {
        event_id: String,
        details_id: String,
        response_headers: ResponseHeaders,
    },
    CreateView(ViewOptions, ViewId),
    RemoveView(ViewId),
    LoadFile(ViewId, String),
    FocusView(ViewId),
    OpenDevTools(ViewId, DevToolsOptions),
    IsAudioMuted(ViewId),
    SetAudioMuted(ViewId, bool),
    Permissions,
    /// A request refused because its operation was marked as failing
    Rejected(HostOp),
}

impl HostCall {
    pub fn op(&self) -> HostOp {
        match self {
            Self::CreateTab(..) => HostOp::CreateTab,
            Self::RemoveTab(_) => HostOp::RemoveTab,
            Self::UpdateTab(..) => HostOp::UpdateTab,
            Self::CreateWindow(..) => HostOp::CreateWindow,
            Self::RemoveWindow(_) => HostOp::RemoveWindow,
            Self::RestoreWindow(_) => HostOp::RestoreWindow,
            Self::FocusWindow(_) => HostOp::FocusWindow,
            Self::ContentSize(_) => HostOp::ContentSize,
            Self::CreateSession(..) => HostOp::CreateSession,
            Self::RemoveSession(_) => HostOp::RemoveSession,
            Self::SetWebRequestFilter(..) => HostOp::SetWebRequestFilter,
            Self::HeadersResponse { .. } => HostOp::HeadersResponse,
            Self::CreateView(..) => HostOp::CreateView,
            Self::RemoveView(_) => HostOp::RemoveView,
            Self::LoadFile(..) => HostOp::LoadFile,
            Self::FocusView(_) => HostOp::FocusView,
            Self::OpenDevTools(..) => HostOp::OpenDevTools,
            Self::IsAudioMuted(_) => HostOp::IsAudioMuted,
            Self::SetAudioMuted(..) => HostOp::SetAudioMuted,
            Self::Permissions => HostOp::Permissions,
            Self::Rejected(op) => *op,
        }
    }
}

struct MemoryHostState {
    calls: Vec<HostCall>,
    failing: HashSet<HostOp>,
    tabs: HashMap<TabId, bool>,
    windows: HashSet<WindowId>,
    sessions: HashSet<SessionId>,
    views: HashMap<ViewId, bool>,
    permissions: PermissionGrants,
    content_size: Size,
    subscribers: Vec<mpsc::UnboundedSender<HostEvent>>,
}

impl MemoryHostState {
    /// Record a rejection if `op` is marked as failing
    fn admit(&mut self, op: HostOp) -> HostResult<()> {
        if self.failing.contains(&op) {
            self.calls.push(HostCall::Rejected(op));
            debug!("In-memory host rejecting {}", op);
            return Err(HostError::Rejected {
                op: op.label(),
                reason: "failure injected".to_string(),
            });
        }
        trace!("In-memory host serving {}", op);
        Ok(())
    }
}

fn unknown(kind: &'static str, id: impl std::fmt::Display) -> HostError {
    HostError::UnknownResource {
        kind,
        id: id.to_string(),
    }
}

/// Host whose resources live in process memory
pub struct MemoryHost {
    state: Mutex<MemoryHostState>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryHostState {
                calls: Vec::new(),
                failing: HashSet::new(),
                tabs: HashMap::new(),
                windows: HashSet::new(),
                sessions: HashSet::new(),
                views: HashMap::new(),
                permissions: PermissionGrants::default(),
                content_size: Size {
                    width: 1066,
                    height: 572,
                },
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryHostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every subsequent `op` request fail
    pub fn fail_on(&self, op: HostOp) {
        self.lock().failing.insert(op);
    }

    /// Stop failing `op` requests
    pub fn recover(&self, op: HostOp) {
        self.lock().failing.remove(&op);
    }

    pub fn set_permissions(&self, permissions: PermissionGrants) {
        self.lock().permissions = permissions;
    }

    pub fn set_content_size(&self, size: Size) {
        self.lock().content_size = size;
    }

    /// All requests served or rejected so far, in arrival order
    pub fn calls(&self) -> Vec<HostCall> {
        self.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.lock().calls.clear();
    }

    /// Number of requests of kind `op`, rejected ones included
    pub fn count(&self, op: HostOp) -> usize {
        self.lock().calls.iter().filter(|c| c.op() == op).count()
    }

    /// Number of tabs, windows, sessions and views still alive
    pub fn live_resources(&self) -> usize {
        let state = self.lock();
        state.tabs.len() + state.windows.len() + state.sessions.len() + state.views.len()
    }

    pub fn tab_muted(&self, id: &TabId) -> Option<bool> {
        self.lock().tabs.get(id).copied()
    }

    pub fn view_muted(&self, id: &ViewId) -> Option<bool> {
        self.lock().views.get(id).copied()
    }

    /// Deliver `event` to every live subscriber
    pub fn emit(&self, event: HostEvent) {
        let mut state = self.lock();
        debug!("In-memory host emitting {}", event.name());
        state
            .subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }
}

impl EventSource for MemoryHost {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }
}

#[async_trait]
impl TabService for MemoryHost {
    async fn create_tab(&self, options: TabOptions) -> HostResult<Tab> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::CreateTab)?;
        let id = TabId::new(format!("tab-{}", Uuid::new_v4()));
        state.tabs.insert(id.clone(), false);
        state.calls.push(HostCall::CreateTab(options, id.clone()));
        Ok(Tab { id })
    }

    async fn remove_tab(&self, id: &TabId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::RemoveTab)?;
        state.calls.push(HostCall::RemoveTab(id.clone()));
        state.tabs.remove(id).map(|_| ()).ok_or_else(|| unknown("tab", id))
    }

    async fn update_tab(&self, id: &TabId, update: TabUpdate) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::UpdateTab)?;
        state.calls.push(HostCall::UpdateTab(id.clone(), update));
        let muted = state.tabs.get_mut(id).ok_or_else(|| unknown("tab", id))?;
        if let Some(value) = update.muted {
            *muted = value;
        }
        Ok(())
    }
}

#[async_trait]
impl WindowService for MemoryHost {
    async fn create_window(&self, options: WindowOptions) -> HostResult<Window> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::CreateWindow)?;
        let id = WindowId::new(format!("window-{}", Uuid::new_v4()));
        state.windows.insert(id.clone());
        state.calls.push(HostCall::CreateWindow(options, id.clone()));
        Ok(Window { id })
    }

    async fn remove_window(&self, id: &WindowId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::RemoveWindow)?;
        state.calls.push(HostCall::RemoveWindow(id.clone()));
        if state.windows.remove(id) {
            Ok(())
        } else {
            Err(unknown("window", id))
        }
    }

    async fn restore_window(&self, id: &WindowId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::RestoreWindow)?;
        state.calls.push(HostCall::RestoreWindow(id.clone()));
        if state.windows.contains(id) {
            Ok(())
        } else {
            Err(unknown("window", id))
        }
    }

    async fn focus_window(&self, id: &WindowId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::FocusWindow)?;
        state.calls.push(HostCall::FocusWindow(id.clone()));
        if state.windows.contains(id) {
            Ok(())
        } else {
            Err(unknown("window", id))
        }
    }

    async fn content_size(&self, id: &WindowId) -> HostResult<Size> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::ContentSize)?;
        state.calls.push(HostCall::ContentSize(id.clone()));
        if state.windows.contains(id) {
            Ok(state.content_size)
        } else {
            Err(unknown("window", id))
        }
    }
}

#[async_trait]
impl SessionService for MemoryHost {
    async fn create_session(&self, options: SessionOptions) -> HostResult<Session> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::CreateSession)?;
        let id = SessionId::new(format!("session-{}", Uuid::new_v4()));
        state.sessions.insert(id.clone());
        state.calls.push(HostCall::CreateSession(options, id.clone()));
        Ok(Session { id })
    }

    async fn remove_session(&self, id: &SessionId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::RemoveSession)?;
        state.calls.push(HostCall::RemoveSession(id.clone()));
        if state.sessions.remove(id) {
            Ok(())
        } else {
            Err(unknown("session", id))
        }
    }

    async fn set_web_request_filter(
        &self,
        id: &SessionId,
        phase: RequestPhase,
    ) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::SetWebRequestFilter)?;
        state.calls.push(HostCall::SetWebRequestFilter(id.clone(), phase));
        if state.sessions.contains(id) {
            Ok(())
        } else {
            Err(unknown("session", id))
        }
    }

    async fn web_receive_headers_response(
        &self,
        event_id: &str,
        details_id: &str,
        response_headers: ResponseHeaders,
    ) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::HeadersResponse)?;
        state.calls.push(HostCall::HeadersResponse {
            event_id: event_id.to_string(),
            details_id: details_id.to_string(),
            response_headers,
        });
        Ok(())
    }
}

#[async_trait]
impl ViewService for MemoryHost {
    async fn create_view(&self, options: ViewOptions) -> HostResult<View> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::CreateView)?;
        if !state.windows.contains(&options.window) {
            return Err(unknown("window", &options.window));
        }
        if !state.sessions.contains(&options.session) {
            return Err(unknown("session", &options.session));
        }
        let id = ViewId::new(format!("view-{}", Uuid::new_v4()));
        state.views.insert(id.clone(), false);
        state.calls.push(HostCall::CreateView(options, id.clone()));
        Ok(View { id })
    }

    async fn remove_view(&self, id: &ViewId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::RemoveView)?;
        state.calls.push(HostCall::RemoveView(id.clone()));
        state.views.remove(id).map(|_| ()).ok_or_else(|| unknown("view", id))
    }

    async fn load_file(&self, id: &ViewId, path: &str) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::LoadFile)?;
        state.calls.push(HostCall::LoadFile(id.clone(), path.to_string()));
        if state.views.contains_key(id) {
            Ok(())
        } else {
            Err(unknown("view", id))
        }
    }

    async fn focus_view(&self, id: &ViewId) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::FocusView)?;
        state.calls.push(HostCall::FocusView(id.clone()));
        if state.views.contains_key(id) {
            Ok(())
        } else {
            Err(unknown("view", id))
        }
    }

    async fn open_dev_tools(&self, id: &ViewId, options: DevToolsOptions) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::OpenDevTools)?;
        state.calls.push(HostCall::OpenDevTools(id.clone(), options));
        if state.views.contains_key(id) {
            Ok(())
        } else {
            Err(unknown("view", id))
        }
    }

    async fn is_audio_muted(&self, id: &ViewId) -> HostResult<bool> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::IsAudioMuted)?;
        state.calls.push(HostCall::IsAudioMuted(id.clone()));
        state.views.get(id).copied().ok_or_else(|| unknown("view", id))
    }

    async fn set_audio_muted(&self, id: &ViewId, muted: bool) -> HostResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::SetAudioMuted)?;
        state.calls.push(HostCall::SetAudioMuted(id.clone(), muted));
        let current = state.views.get_mut(id).ok_or_else(|| unknown("view", id))?;
        *current = muted;
        Ok(())
    }
}

#[async_trait]
impl RuntimeService for MemoryHost {
    async fn permissions(&self) -> HostResult<PermissionGrants> {
        tokio::task::yield_now().await;
        let mut state = self.lock();
        state.admit(HostOp::Permissions)?;
        state.calls.push(HostCall::Permissions);
        Ok(state.permissions.clone())
    }
}
