//! Host services - The tab, window, session, content-view and runtime surfaces
//! the lifecycle controller drives

pub mod events;
pub mod memory;
pub mod types;

use async_trait::async_trait;
use thiserror::Error;

pub use events::{EventSource, HeaderInterception, HostEvent, QUIT_MESSAGE};
pub use memory::{HostCall, HostOp, MemoryHost};
pub use types::*;

/// A rejected host request
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    #[error("{op} was rejected by the host: {reason}")]
    Rejected { op: &'static str, reason: String },
    #[error("{kind} `{id}` does not exist")]
    UnknownResource { kind: &'static str, id: String },
}

pub type HostResult<T> = Result<T, HostError>;

#[async_trait]
pub trait TabService: Send + Sync {
    async fn create_tab(&self, options: TabOptions) -> HostResult<Tab>;
    async fn remove_tab(&self, id: &TabId) -> HostResult<()>;
    async fn update_tab(&self, id: &TabId, update: TabUpdate) -> HostResult<()>;
}

#[async_trait]
pub trait WindowService: Send + Sync {
    async fn create_window(&self, options: WindowOptions) -> HostResult<Window>;
    async fn remove_window(&self, id: &WindowId) -> HostResult<()>;
    /// Un-minimize and reveal the window
    async fn restore_window(&self, id: &WindowId) -> HostResult<()>;
    async fn focus_window(&self, id: &WindowId) -> HostResult<()>;
    async fn content_size(&self, id: &WindowId) -> HostResult<Size>;
}

#[async_trait]
pub trait SessionService: Send + Sync {
    async fn create_session(&self, options: SessionOptions) -> HostResult<Session>;
    async fn remove_session(&self, id: &SessionId) -> HostResult<()>;
    async fn set_web_request_filter(&self, id: &SessionId, phase: RequestPhase)
        -> HostResult<()>;
    /// Acknowledge an intercepted response with the headers to deliver
    async fn web_receive_headers_response(
        &self,
        event_id: &str,
        details_id: &str,
        response_headers: ResponseHeaders,
    ) -> HostResult<()>;
}

#[async_trait]
pub trait ViewService: Send + Sync {
    async fn create_view(&self, options: ViewOptions) -> HostResult<View>;
    async fn remove_view(&self, id: &ViewId) -> HostResult<()>;
    async fn load_file(&self, id: &ViewId, path: &str) -> HostResult<()>;
    async fn focus_view(&self, id: &ViewId) -> HostResult<()>;
    async fn open_dev_tools(&self, id: &ViewId, options: DevToolsOptions) -> HostResult<()>;
    async fn is_audio_muted(&self, id: &ViewId) -> HostResult<bool>;
    async fn set_audio_muted(&self, id: &ViewId, muted: bool) -> HostResult<()>;
}

#[async_trait]
pub trait RuntimeService: Send + Sync {
    async fn permissions(&self) -> HostResult<PermissionGrants>;
}

/// The full service surface the lifecycle controller depends on
pub trait Host: TabService + WindowService + SessionService + ViewService + RuntimeService {}

impl<T> Host for T where T: TabService + WindowService + SessionService + ViewService + RuntimeService
{}
