//! Device: a controllable or observable thing exposed by an adapter.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::error::{AddonError, NotFoundError, ValidationError};
use crate::id::{ActionId, AdapterId, DeviceId};
use crate::property::Property;

/// Default semantic-web context advertised by devices.
pub const DEFAULT_CONTEXT: &str = "https://iot.mozilla.org/schemas";

/// Default device type tag.
pub const DEFAULT_TYPE: &str = "thing";

/// A thing exposing properties, actions and events.
///
/// `adapter_id` is the non-owning back-reference to the owning adapter, used
/// only to address notifications. It is not part of the wire representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(skip)]
    pub adapter_id: AdapterId,
    pub id: DeviceId,
    #[serde(rename = "type")]
    pub type_: String,
    #[serde(rename = "@context")]
    pub context: String,
    #[serde(rename = "@type", default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub properties: BTreeMap<String, Property>,
    /// Action name → opaque metadata.
    #[serde(default)]
    pub actions: BTreeMap<String, String>,
    /// Event name → opaque metadata.
    #[serde(default)]
    pub events: BTreeMap<String, String>,
    #[serde(default)]
    pub ui_href: String,
    #[serde(default)]
    pub pin_required: bool,
    #[serde(default)]
    pub pin_pattern: String,
}

impl Device {
    /// Create a builder for constructing a [`Device`].
    #[must_use]
    pub fn builder() -> DeviceBuilder {
        DeviceBuilder::default()
    }

    /// Check domain invariants.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Validation`] when the device id or the owning
    /// adapter id is empty.
    pub fn validate(&self) -> Result<(), AddonError> {
        if self.id.is_empty() {
            return Err(ValidationError::EmptyId { entity: "Device" }.into());
        }
        if self.adapter_id.is_empty() {
            return Err(ValidationError::EmptyId { entity: "Adapter" }.into());
        }
        Ok(())
    }

    /// Attach a property, pointing its back-reference at this device.
    pub fn add_property(&mut self, mut property: Property) {
        property.device_id = self.id.clone();
        self.properties.insert(property.name.clone(), property);
    }

    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    /// Update a property value, returning `true` when it changed.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when the device has no such property.
    pub fn set_property_value(
        &mut self,
        name: &str,
        value: impl Into<String>,
    ) -> Result<bool, NotFoundError> {
        let property = self.properties.get_mut(name).ok_or_else(|| NotFoundError {
            entity: "Property",
            id: name.to_string(),
        })?;
        Ok(property.set_value(value))
    }

    /// Declare an action with its opaque metadata.
    pub fn add_action(&mut self, name: impl Into<String>, metadata: impl Into<String>) {
        self.actions.insert(name.into(), metadata.into());
    }

    /// Declare an event with its opaque metadata.
    pub fn add_event(&mut self, name: impl Into<String>, metadata: impl Into<String>) {
        self.events.insert(name.into(), metadata.into());
    }

    /// Create a new `created` action instance for a declared action name.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `name` is not a declared action.
    pub fn request_action(
        &self,
        action_id: ActionId,
        name: &str,
        input: BTreeMap<String, String>,
    ) -> Result<Action, NotFoundError> {
        self.ensure_action(name)?;
        Ok(Action::new(action_id, self.id.clone(), name, input))
    }

    /// Validate a cancellation request for a declared action name.
    ///
    /// Action instances are not tracked by the device, so only the name is
    /// checked.
    ///
    /// # Errors
    ///
    /// Returns [`NotFoundError`] when `name` is not a declared action.
    pub fn remove_action(&self, name: &str) -> Result<(), NotFoundError> {
        self.ensure_action(name)
    }

    fn ensure_action(&self, name: &str) -> Result<(), NotFoundError> {
        if self.actions.contains_key(name) {
            Ok(())
        } else {
            Err(NotFoundError {
                entity: "Action",
                id: name.to_string(),
            })
        }
    }
}

/// Step-by-step builder for [`Device`].
#[derive(Debug, Default)]
pub struct DeviceBuilder {
    id: Option<DeviceId>,
    adapter_id: Option<AdapterId>,
    type_: Option<String>,
    context: Option<String>,
    capabilities: Vec<String>,
    name: Option<String>,
    description: Option<String>,
    properties: Vec<Property>,
    actions: BTreeMap<String, String>,
    events: BTreeMap<String, String>,
    ui_href: Option<String>,
    pin_required: bool,
    pin_pattern: Option<String>,
}

impl DeviceBuilder {
    #[must_use]
    pub fn id(mut self, id: impl Into<DeviceId>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn adapter_id(mut self, adapter_id: impl Into<AdapterId>) -> Self {
        self.adapter_id = Some(adapter_id.into());
        self
    }

    #[must_use]
    pub fn type_(mut self, type_: impl Into<String>) -> Self {
        self.type_ = Some(type_.into());
        self
    }

    #[must_use]
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    #[must_use]
    pub fn capability(mut self, capability: impl Into<String>) -> Self {
        self.capabilities.push(capability.into());
        self
    }

    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    #[must_use]
    pub fn action(mut self, name: impl Into<String>, metadata: impl Into<String>) -> Self {
        self.actions.insert(name.into(), metadata.into());
        self
    }

    #[must_use]
    pub fn event(mut self, name: impl Into<String>, metadata: impl Into<String>) -> Self {
        self.events.insert(name.into(), metadata.into());
        self
    }

    #[must_use]
    pub fn ui_href(mut self, ui_href: impl Into<String>) -> Self {
        self.ui_href = Some(ui_href.into());
        self
    }

    #[must_use]
    pub fn pin(mut self, pattern: impl Into<String>) -> Self {
        self.pin_required = true;
        self.pin_pattern = Some(pattern.into());
        self
    }

    /// Consume the builder, validate, and return a [`Device`].
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Validation`] if the device id or adapter id is
    /// missing or empty.
    pub fn build(self) -> Result<Device, AddonError> {
        let mut device = Device {
            adapter_id: self.adapter_id.unwrap_or_default(),
            id: self.id.unwrap_or_default(),
            type_: self.type_.unwrap_or_else(|| DEFAULT_TYPE.to_string()),
            context: self.context.unwrap_or_else(|| DEFAULT_CONTEXT.to_string()),
            capabilities: self.capabilities,
            name: self.name.unwrap_or_default(),
            description: self.description.unwrap_or_default(),
            properties: BTreeMap::new(),
            actions: self.actions,
            events: self.events,
            ui_href: self.ui_href.unwrap_or_default(),
            pin_required: self.pin_required,
            pin_pattern: self.pin_pattern.unwrap_or_default(),
        };
        device.validate()?;
        for property in self.properties {
            device.add_property(property);
        }
        Ok(device)
    }
}
