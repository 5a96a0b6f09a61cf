//! Lifecycle events delivered by the host services

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::types::ResponseHeaders;

/// Literal message payload that asks the running instance to shut down
pub const QUIT_MESSAGE: &str = "quit";

/// A response-header interception raised on a session with a request filter installed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderInterception {
    pub event_id: String,
    pub details_id: String,
    #[serde(default)]
    pub response_headers: ResponseHeaders,
}

/// Every event the controller subscribes to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HostEvent {
    ExtensionClick,
    TabClicked,
    TabClickedMute,
    TabClickedClose,
    TabRemoved,
    WindowClosed,
    WindowRemoved,
    Message { payload: serde_json::Value },
    BeforeWebReceiveHeaders(HeaderInterception),
}

impl HostEvent {
    /// Name of the originating subscription, used as log context
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtensionClick => "runtime.onExtensionClick",
            Self::TabClicked => "tabs.onClicked",
            Self::TabClickedMute => "tabs.onClickedMute",
            Self::TabClickedClose => "tabs.onClickedClose",
            Self::TabRemoved => "tabs.onRemoved",
            Self::WindowClosed => "windows.onClosed",
            Self::WindowRemoved => "windows.onRemoved",
            Self::Message { .. } => "runtime.onMessage",
            Self::BeforeWebReceiveHeaders(_) => "websessions.onBeforeWebReceiveHeaders",
        }
    }

    pub fn quit() -> Self {
        Self::Message {
            payload: serde_json::Value::String(QUIT_MESSAGE.to_string()),
        }
    }

    /// Whether this is an inbound message carrying exactly the quit payload
    pub fn is_quit(&self) -> bool {
        matches!(self, Self::Message { payload } if payload.as_str() == Some(QUIT_MESSAGE))
    }
}

/// Facility through which the host's event streams are subscribed
pub trait EventSource {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn only_exact_quit_string_is_quit() {
        assert!(HostEvent::quit().is_quit());
        assert!(!HostEvent::Message {
            payload: json!("QUIT")
        }
        .is_quit());
        assert!(!HostEvent::Message {
            payload: json!({"type": "quit"})
        }
        .is_quit());
        assert!(!HostEvent::ExtensionClick.is_quit());
    }

    #[test]
    fn decodes_tagged_header_event() {
        let event: HostEvent = serde_json::from_value(json!({
            "type": "beforeWebReceiveHeaders",
            "eventId": "e1",
            "detailsId": "d1",
            "responseHeaders": {"X-Foo": ["1"]}
        }))
        .unwrap();
        match event {
            HostEvent::BeforeWebReceiveHeaders(interception) => {
                assert_eq!(interception.event_id, "e1");
                assert_eq!(interception.response_headers["X-Foo"], vec!["1"]);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
