//! Adapter: a driver instance that owns a set of devices.

use std::collections::HashMap;

use crate::device::Device;
use crate::error::{AddonError, ValidationError};
use crate::id::{AdapterId, DeviceId};

/// Default display name for adapters built without one.
pub const DEFAULT_NAME: &str = "Adapter";

/// A logical driver instance grouping devices.
///
/// The adapter is the ownership root for its devices: removing a device from
/// [`Adapter::remove_device`] hands it back to the caller, which drops it.
#[derive(Debug, Clone)]
pub struct Adapter {
    pub id: AdapterId,
    pub package_name: String,
    pub name: String,
    devices: HashMap<DeviceId, Device>,
    ready: bool,
    pairing: bool,
}

impl Adapter {
    /// Create a builder for constructing an [`Adapter`].
    #[must_use]
    pub fn builder() -> AdapterBuilder {
        AdapterBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Validation`] when `id` is empty.
    pub fn validate(&self) -> Result<(), AddonError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId { entity: "Adapter" }.into());
        }
        Ok(())
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn device_mut(&mut self, id: &DeviceId) -> Option<&mut Device> {
        self.devices.get_mut(id)
    }

    #[must_use]
    pub fn has_device(&self, id: &DeviceId) -> bool {
        self.devices.contains_key(id)
    }

    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    #[must_use]
    pub fn device_count(&self) -> usize {
        self.devices.len()
    }

    /// Take ownership of a device, pointing its back-reference at this
    /// adapter. Returns the device previously stored under the same id.
    pub fn insert_device(&mut self, mut device: Device) -> Option<Device> {
        device.adapter_id = self.id.clone();
        self.devices.insert(device.id.clone(), device)
    }

    /// Release a device from this adapter.
    pub fn remove_device(&mut self, id: &DeviceId) -> Option<Device> {
        self.devices.remove(id)
    }

    /// Release every device, leaving the adapter empty.
    pub fn drain_devices(&mut self) -> impl Iterator<Item = Device> + '_ {
        self.devices.drain().map(|(_, device)| device)
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    #[must_use]
    pub fn is_pairing(&self) -> bool {
        self.pairing
    }

    pub fn set_pairing(&mut self, pairing: bool) {
        self.pairing = pairing;
    }
}

/// Step-by-step builder for [`Adapter`].
#[derive(Debug, Default)]
pub struct AdapterBuilder {
    id: Option<AdapterId>,
    package_name: Option<String>,
    name: Option<String>,
    ready: Option<bool>,
}

impl AdapterBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<AdapterId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn package_name(mut self, package_name: impl Into<String>) -> Self {
        self.package_name = Some(package_name.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn ready(mut self, ready: bool) -> Self {
        self.ready = Some(ready);
        self
    }

    /// Consume the builder, validate, and return an [`Adapter`].
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Validation`] if `id` is missing or empty.
    pub fn build(self) -> Result<Adapter, AddonError> {
        let adapter = Adapter {
            id: self.id.unwrap_or_default(),
            package_name: self.package_name.unwrap_or_default(),
            name: self.name.unwrap_or_else(|| DEFAULT_NAME.to_string()),
            devices: HashMap::new(),
            ready: self.ready.unwrap_or(true),
            pairing: false,
        };
        adapter.validate()?;
        Ok(adapter)
    }
}
