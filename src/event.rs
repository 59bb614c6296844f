//! Event envelope projection.
//!
//! The broker delivers JSON bodies of the form
//! `{"asterisk_id": "...", "type": "...", "channel": {"id": "...",
//! "state": "...", "dialplan": {"app_data": "..."}}}`. The types here are
//! read-only views over that payload; they carry no identity of their own
//! and live only as long as the enclosing message.

use serde::Deserialize;
use std::fmt;

/// Opaque identifier of a specific telephony node.
///
/// Read from registry metadata (`eid`) or from the event envelope's
/// `asterisk_id` field. Recomputed on every discovery poll, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Composite routing key `eventType/channelState`.
///
/// The sole routing discriminant: the mapping from key to handler is fixed
/// at router construction and never mutated at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DispatchKey {
    event_type: String,
    channel_state: String,
}

impl DispatchKey {
    #[must_use]
    pub fn new(event_type: impl Into<String>, channel_state: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            channel_state: channel_state.into(),
        }
    }
}

impl fmt::Display for DispatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.event_type, self.channel_state)
    }
}

/// Decoded event envelope as delivered by the broker.
#[derive(Debug, Clone, Deserialize)]
pub struct Envelope {
    #[serde(default)]
    asterisk_id: Option<NodeId>,
    #[serde(rename = "type", default)]
    event_type: String,
    #[serde(default)]
    channel: ChannelView,
}

impl Envelope {
    /// Origin node identity, if the event carries one.
    ///
    /// Some brokers emit an empty `asterisk_id` instead of omitting the
    /// field; both count as absent.
    #[must_use]
    pub fn node(&self) -> Option<&NodeId> {
        self.asterisk_id.as_ref().filter(|id| !id.as_str().is_empty())
    }

    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    #[must_use]
    pub fn channel(&self) -> &ChannelView {
        &self.channel
    }

    #[must_use]
    pub fn dispatch_key(&self) -> DispatchKey {
        DispatchKey::new(self.event_type.clone(), self.channel.state().to_string())
    }
}

/// Read-only projection over the `channel` field of an event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelView {
    #[serde(default)]
    id: String,
    #[serde(default)]
    state: String,
    #[serde(default)]
    dialplan: Dialplan,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct Dialplan {
    #[serde(default)]
    app_data: Option<String>,
}

impl ChannelView {
    /// Build a channel view directly, bypassing deserialization.
    #[must_use]
    pub fn new(id: impl Into<String>, state: impl Into<String>, app_name: Option<&str>) -> Self {
        Self {
            id: id.into(),
            state: state.into(),
            dialplan: Dialplan {
                app_data: app_name.map(str::to_string),
            },
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn state(&self) -> &str {
        &self.state
    }

    /// Owning application name, derived from `dialplan.app_data`.
    #[must_use]
    pub fn app_name(&self) -> Option<&str> {
        self.dialplan.app_data.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_full_envelope() {
        let body = r#"{
            "asterisk_id": "00:11:22:33:44:55",
            "type": "StasisStart",
            "channel": {
                "id": "1719505906.32",
                "state": "Ring",
                "dialplan": {"app_data": "switchboard"}
            }
        }"#;

        let envelope: Envelope = serde_json::from_str(body).unwrap();
        assert_eq!(envelope.node().unwrap().as_str(), "00:11:22:33:44:55");
        assert_eq!(envelope.event_type(), "StasisStart");
        assert_eq!(envelope.channel().id(), "1719505906.32");
        assert_eq!(envelope.channel().state(), "Ring");
        assert_eq!(envelope.channel().app_name(), Some("switchboard"));
        assert_eq!(envelope.dispatch_key().to_string(), "StasisStart/Ring");
    }

    #[test]
    fn missing_fields_default() {
        let envelope: Envelope = serde_json::from_str("{}").unwrap();
        assert!(envelope.node().is_none());
        assert_eq!(envelope.event_type(), "");
        assert_eq!(envelope.channel().app_name(), None);
        assert_eq!(envelope.dispatch_key().to_string(), "/");
    }

    #[test]
    fn empty_asterisk_id_counts_as_absent() {
        let envelope: Envelope =
            serde_json::from_str(r#"{"asterisk_id": "", "type": "StasisEnd"}"#).unwrap();
        assert!(envelope.node().is_none());
    }

    #[test]
    fn dispatch_key_equality() {
        assert_eq!(
            DispatchKey::new("StasisStart", "Ring"),
            DispatchKey::new("StasisStart", "Ring")
        );
        assert_ne!(
            DispatchKey::new("StasisStart", "Ring"),
            DispatchKey::new("StasisStart", "Up")
        );
    }
}
