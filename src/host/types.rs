//! Records and options exchanged with the host services

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

macro_rules! host_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

host_id!(
    /// Identifier of a tab, assigned by the tab service
    TabId
);
host_id!(
    /// Identifier of a top-level window, assigned by the window service
    WindowId
);
host_id!(
    /// Identifier of an isolated browsing session, assigned by the session service
    SessionId
);
host_id!(
    /// Identifier of a content view, assigned by the content-view service
    ViewId
);

/// Response headers keyed by name, each with one or more values
pub type ResponseHeaders = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TabOptions {
    pub text: String,
    pub icon: String,
    pub mutable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tab {
    pub id: TabId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabUpdate {
    pub muted: Option<bool>,
}

/// Title bar presentation for frameless windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TitleBarStyle {
    #[default]
    Default,
    Hidden,
    Inset,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowOptions {
    pub center: bool,
    pub fullscreenable: bool,
    pub title: String,
    pub icon: String,
    pub dark_mode: bool,
    pub vibrancy: bool,
    pub frame: bool,
    pub title_bar_style: TitleBarStyle,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
    pub aspect_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Window {
    pub id: WindowId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOptions {
    pub partition: String,
    pub persistent: bool,
    pub global: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
}

/// Stage of a web request at which the host hands control to the extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RequestPhase {
    BeforeSendHeaders,
    BeforeReceiveHeaders,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoResize {
    pub horizontal: bool,
    pub vertical: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Bounds anchored at the origin covering `size`
    pub fn filling(size: Size) -> Self {
        Self {
            x: 0,
            y: 0,
            width: size.width,
            height: size.height,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewOptions {
    pub window: WindowId,
    pub session: SessionId,
    pub auto_resize: AutoResize,
    pub bounds: Bounds,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct View {
    pub id: ViewId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DevToolsMode {
    Detach,
    Right,
    Bottom,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevToolsOptions {
    pub mode: DevToolsMode,
    pub activate: bool,
}

/// A single permission grant as reported by the runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Grant {
    #[serde(default)]
    pub granted: bool,
}

/// Permission grants keyed by namespace, then by permission name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionGrants(pub HashMap<String, HashMap<String, Grant>>);

impl PermissionGrants {
    /// Whether `permission` in `namespace` is granted; absent grants count as denied
    pub fn is_granted(&self, namespace: &str, permission: &str) -> bool {
        self.0
            .get(namespace)
            .and_then(|grants| grants.get(permission))
            .map(|grant| grant.granted)
            .unwrap_or(false)
    }

    pub fn grant(mut self, namespace: impl Into<String>, permission: impl Into<String>) -> Self {
        self.0
            .entry(namespace.into())
            .or_default()
            .insert(permission.into(), Grant { granted: true });
        self
    }
}
