//! Message protocol: the JSON shapes exchanged between addon and host.
//!
//! Every outbound message is a flat JSON object carrying the kind in
//! `messageType`, the sender in `pluginId`, and the kind-specific payload
//! fields in camelCase:
//!
//! ```json
//! {"pluginId":"golang","messageType":"ADD_ADAPTER","adapterId":"a1","name":"Test","packageName":"pkg"}
//! ```
//!
//! The one exception is the registration request sent on the rendezvous
//! channel, which uses the host's `{"messageType", "data"}` shape
//! (see [`ManagerRequest`]).

use serde::{Deserialize, Serialize};

use gateway_addon_domain::action::Action;
use gateway_addon_domain::device::Device;
use gateway_addon_domain::error::AddonError;
use gateway_addon_domain::event::Event;
use gateway_addon_domain::id::{AdapterId, DeviceId};
use gateway_addon_domain::property::Property;

/// The closed set of outbound message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Error,
    AddAdapter,
    HandleDeviceAdded,
    HandleDeviceRemoved,
    PropertyChanged,
    ActionStatus,
    Event,
    Connected,
}

impl MessageKind {
    /// Wire name of the kind, as written in `messageType`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::AddAdapter => "ADD_ADAPTER",
            Self::HandleDeviceAdded => "HANDLE_DEVICE_ADDED",
            Self::HandleDeviceRemoved => "HANDLE_DEVICE_REMOVED",
            Self::PropertyChanged => "PROPERTY_CHANGED",
            Self::ActionStatus => "ACTION_STATUS",
            Self::Event => "EVENT",
            Self::Connected => "CONNECTED",
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorMessage {
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddAdapterMessage {
    pub adapter_id: AdapterId,
    pub name: String,
    pub package_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAddedMessage {
    pub adapter_id: AdapterId,
    pub device: Device,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRemovedMessage {
    pub adapter_id: AdapterId,
    pub id: DeviceId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyChangedMessage {
    pub adapter_id: AdapterId,
    pub device_id: DeviceId,
    pub property: Property,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStatusMessage {
    pub adapter_id: AdapterId,
    pub device_id: DeviceId,
    pub action: Action,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    pub adapter_id: AdapterId,
    pub device_id: DeviceId,
    pub event: Event,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectedMessage {
    pub adapter_id: AdapterId,
    pub device_id: DeviceId,
    pub connected: bool,
}

/// Kind-specific payload of an outbound message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    Error(ErrorMessage),
    AddAdapter(AddAdapterMessage),
    HandleDeviceAdded(DeviceAddedMessage),
    HandleDeviceRemoved(DeviceRemovedMessage),
    PropertyChanged(PropertyChangedMessage),
    ActionStatus(ActionStatusMessage),
    Event(EventMessage),
    Connected(ConnectedMessage),
}

impl Message {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::Error(_) => MessageKind::Error,
            Self::AddAdapter(_) => MessageKind::AddAdapter,
            Self::HandleDeviceAdded(_) => MessageKind::HandleDeviceAdded,
            Self::HandleDeviceRemoved(_) => MessageKind::HandleDeviceRemoved,
            Self::PropertyChanged(_) => MessageKind::PropertyChanged,
            Self::ActionStatus(_) => MessageKind::ActionStatus,
            Self::Event(_) => MessageKind::Event,
            Self::Connected(_) => MessageKind::Connected,
        }
    }
}

/// An outbound message addressed from a plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub plugin_id: String,
    #[serde(flatten)]
    pub message: Message,
}

impl Envelope {
    #[must_use]
    pub fn new(plugin_id: impl Into<String>, message: Message) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            message,
        }
    }

    /// Serialize into the bytes of a single socket write.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Serialization`] if the payload cannot be marshalled.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddonError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Parse an envelope written by [`Envelope::to_bytes`].
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Serialization`] on malformed input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AddonError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Requests sent to the host's addon manager over the rendezvous channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "data", rename_all = "camelCase")]
pub enum ManagerRequest {
    #[serde(rename_all = "camelCase")]
    RegisterPlugin { plugin_id: String },
}

impl ManagerRequest {
    /// Serialize into the bytes of a single socket write.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Serialization`] if the request cannot be marshalled.
    pub fn to_bytes(&self) -> Result<Vec<u8>, AddonError> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Best-effort extraction of `messageType` from an inbound payload.
///
/// Inbound rendezvous messages are not validated; this is only used to make
/// the logs readable. Returns `None` for anything that is not a JSON object
/// with a `messageType` field.
#[must_use]
pub fn peek_message_type(bytes: &[u8]) -> Option<String> {
    let value: serde_json::Value = serde_json::from_slice(bytes).ok()?;
    match value.get("messageType")? {
        serde_json::Value::String(kind) => Some(kind.clone()),
        other => Some(other.to_string()),
    }
}
