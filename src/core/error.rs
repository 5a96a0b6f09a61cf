//! Lifecycle errors

use thiserror::Error;

use crate::host::HostError;

/// One step of the instance creation sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStep {
    CreateTab,
    CreateWindow,
    MeasureContent,
    ReadPermissions,
    CreateSession,
    InstallHeaderFilter,
    CreateView,
    LoadDocument,
    OpenDevTools,
    FocusWindow,
    FocusView,
}

impl CreationStep {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateTab => "create tab",
            Self::CreateWindow => "create window",
            Self::MeasureContent => "measure content area",
            Self::ReadPermissions => "read permissions",
            Self::CreateSession => "create session",
            Self::InstallHeaderFilter => "install header filter",
            Self::CreateView => "create content view",
            Self::LoadDocument => "load document",
            Self::OpenDevTools => "open developer tools",
            Self::FocusWindow => "focus window",
            Self::FocusView => "focus content view",
        }
    }
}

impl std::fmt::Display for CreationStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    /// A host call inside the creation sequence was rejected
    #[error("instance creation failed at step `{step}`")]
    Creation {
        step: CreationStep,
        #[source]
        source: HostError,
    },
    /// A host call inside any other handler was rejected
    #[error("{event} handler failed")]
    Handler {
        event: &'static str,
        #[source]
        source: HostError,
    },
}

impl LifecycleError {
    /// The rejected host call underneath this error
    pub fn host_error(&self) -> &HostError {
        match self {
            Self::Creation { source, .. } | Self::Handler { source, .. } => source,
        }
    }
}

/// Attach a creation step or handler name to a host result
pub(crate) trait LifecycleContext<T> {
    fn at_step(self, step: CreationStep) -> Result<T, LifecycleError>;
    fn in_handler(self, event: &'static str) -> Result<T, LifecycleError>;
}

impl<T> LifecycleContext<T> for Result<T, HostError> {
    fn at_step(self, step: CreationStep) -> Result<T, LifecycleError> {
        self.map_err(|source| LifecycleError::Creation { step, source })
    }

    fn in_handler(self, event: &'static str) -> Result<T, LifecycleError> {
        self.map_err(|source| LifecycleError::Handler { event, source })
    }
}
