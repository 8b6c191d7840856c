//! Property: a named, string-encoded value exposed by a device.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::DeviceId;

/// A single observable value of a [`Device`](crate::device::Device).
///
/// `device_id` is the non-owning back-reference to the owning device. It is
/// set by [`Device::add_property`](crate::device::Device::add_property) and
/// never serialized: the wire envelope addresses the device explicitly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Property {
    #[serde(skip)]
    pub device_id: DeviceId,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub description: BTreeMap<String, String>,
    #[serde(default)]
    pub visible: bool,
    /// Value changes of a fire-and-forget property are not acknowledged by the host.
    #[serde(default)]
    pub fire_and_forget: bool,
}

impl Property {
    /// Create a visible property with the given initial value.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            device_id: DeviceId::default(),
            name: name.into(),
            value: value.into(),
            description: BTreeMap::new(),
            visible: true,
            fire_and_forget: false,
        }
    }

    #[must_use]
    pub fn with_description(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.description.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    #[must_use]
    pub fn with_fire_and_forget(mut self, fire_and_forget: bool) -> Self {
        self.fire_and_forget = fire_and_forget;
        self
    }

    /// Replace the current value, returning `true` when it actually changed.
    pub fn set_value(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.value == value {
            return false;
        }
        self.value = value;
        true
    }
}
