//! Adapter registry: the ownership root of every adapter and device.
//!
//! The registry owns adapters, adapters own devices. A secondary index maps
//! each device id to its owning adapter so notifications can be addressed
//! from a bare back-reference without walking every adapter.

use std::collections::HashMap;

use gateway_addon_domain::adapter::Adapter;
use gateway_addon_domain::device::Device;
use gateway_addon_domain::error::{AddonError, NotFoundError, RoutingError, ValidationError};
use gateway_addon_domain::id::{AdapterId, DeviceId};

#[derive(Debug, Default)]
pub struct Registry {
    adapters: HashMap<AdapterId, Adapter>,
    owners: HashMap<DeviceId, AdapterId>,
}

impl Registry {
    /// Register a new adapter together with any devices it already holds.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::Duplicate`] when the adapter id, or one of
    /// its device ids, is already registered.
    pub fn insert_adapter(&mut self, adapter: Adapter) -> Result<(), AddonError> {
        self.check_adapter(&adapter)?;
        for device in adapter.devices() {
            self.owners.insert(device.id.clone(), adapter.id.clone());
        }
        self.adapters.insert(adapter.id.clone(), adapter);
        Ok(())
    }

    /// Run every check [`Registry::insert_adapter`] would, without inserting.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::insert_adapter`].
    pub fn check_adapter(&self, adapter: &Adapter) -> Result<(), AddonError> {
        adapter.validate()?;
        if self.adapters.contains_key(&adapter.id) {
            return Err(ValidationError::Duplicate {
                entity: "Adapter",
                id: adapter.id.to_string(),
            }
            .into());
        }
        if let Some(device) = adapter.devices().find(|d| self.owners.contains_key(&d.id)) {
            return Err(ValidationError::Duplicate {
                entity: "Device",
                id: device.id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Remove an adapter and every device it owns.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when the adapter is not registered.
    pub fn remove_adapter(&mut self, id: &AdapterId) -> Result<Adapter, NotFoundError> {
        let adapter = self.adapters.remove(id).ok_or_else(|| NotFoundError {
            entity: "Adapter",
            id: id.to_string(),
        })?;
        for device in adapter.devices() {
            self.owners.remove(&device.id);
        }
        Ok(adapter)
    }

    #[must_use]
    pub fn adapter(&self, id: &AdapterId) -> Option<&Adapter> {
        self.adapters.get(id)
    }

    /// Look up an adapter that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when the adapter is not registered.
    pub fn adapter_mut(&mut self, id: &AdapterId) -> Result<&mut Adapter, NotFoundError> {
        self.adapters.get_mut(id).ok_or_else(|| NotFoundError {
            entity: "Adapter",
            id: id.to_string(),
        })
    }

    pub fn adapter_ids(&self) -> impl Iterator<Item = &AdapterId> {
        self.adapters.keys()
    }

    /// Hand a device to the adapter named by its back-reference.
    ///
    /// Re-adding a device already owned by the same adapter replaces it.
    ///
    /// # Errors
    ///
    /// - [`AddonError::Validation`] when the device fails its invariants or
    ///   its id is owned by another adapter.
    /// - [`RoutingError::UnknownAdapter`] when the owning adapter is not
    ///   registered.
    pub fn insert_device(&mut self, device: Device) -> Result<(), AddonError> {
        self.check_device(&device)?;
        let adapter = self
            .adapters
            .get_mut(&device.adapter_id)
            .ok_or_else(|| RoutingError::UnknownAdapter {
                adapter_id: device.adapter_id.to_string(),
                device_id: device.id.to_string(),
            })?;
        self.owners.insert(device.id.clone(), adapter.id.clone());
        adapter.insert_device(device);
        Ok(())
    }

    /// Run every check [`Registry::insert_device`] would, without inserting.
    ///
    /// # Errors
    ///
    /// Same as [`Registry::insert_device`].
    pub fn check_device(&self, device: &Device) -> Result<(), AddonError> {
        device.validate()?;
        if let Some(owner) = self.owners.get(&device.id)
            && *owner != device.adapter_id
        {
            return Err(ValidationError::Duplicate {
                entity: "Device",
                id: device.id.to_string(),
            }
            .into());
        }
        if !self.adapters.contains_key(&device.adapter_id) {
            return Err(RoutingError::UnknownAdapter {
                adapter_id: device.adapter_id.to_string(),
                device_id: device.id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Release a device from its owning adapter.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no registered adapter owns the device.
    pub fn remove_device(&mut self, id: &DeviceId) -> Result<Device, NotFoundError> {
        let not_found = || NotFoundError {
            entity: "Device",
            id: id.to_string(),
        };
        let owner = self.owners.get(id).ok_or_else(not_found)?;
        let device = self
            .adapters
            .get_mut(owner)
            .and_then(|adapter| adapter.remove_device(id))
            .ok_or_else(not_found)?;
        self.owners.remove(id);
        Ok(device)
    }

    /// Resolve the adapter owning a device.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError::DeviceWithoutAdapter`] when the device is not
    /// attached to any registered adapter.
    pub fn route(&self, device_id: &DeviceId) -> Result<AdapterId, RoutingError> {
        self.owners
            .get(device_id)
            .filter(|owner| self.adapters.contains_key(*owner))
            .cloned()
            .ok_or_else(|| RoutingError::DeviceWithoutAdapter {
                device_id: device_id.to_string(),
            })
    }

    #[must_use]
    pub fn device(&self, id: &DeviceId) -> Option<&Device> {
        let owner = self.owners.get(id)?;
        self.adapters.get(owner)?.device(id)
    }

    /// Look up a device that must exist.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when no registered adapter owns the device.
    pub fn device_mut(&mut self, id: &DeviceId) -> Result<&mut Device, NotFoundError> {
        let not_found = || NotFoundError {
            entity: "Device",
            id: id.to_string(),
        };
        let owner = self.owners.get(id).ok_or_else(not_found)?;
        self.adapters
            .get_mut(owner)
            .and_then(|adapter| adapter.device_mut(id))
            .ok_or_else(not_found)
    }
}
