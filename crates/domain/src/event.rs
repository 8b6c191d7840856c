//! Event: an immutable record of something a device reported.

use serde::{Deserialize, Serialize};

use crate::Timestamp;
use crate::id::DeviceId;

/// A named occurrence on a device with an opaque payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Non-owning back-reference to the emitting device.
    #[serde(skip)]
    pub device_id: DeviceId,
    pub name: String,
    #[serde(default)]
    pub data: serde_json::Value,
    pub timestamp: Timestamp,
}

impl Event {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(device_id: DeviceId, name: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            device_id,
            name: name.into(),
            data,
            timestamp: chrono::Utc::now(),
        }
    }
}
