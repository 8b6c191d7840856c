//! Addon manager: owns the adapter registry and speaks the host protocol.
//!
//! The manager translates domain events (device added, property changed,
//! action status, …) into [`Envelope`]s written on the duplex channel, and
//! runs the receive loop that (re)opens the duplex channel whenever the host
//! writes anything on the rendezvous channel.
//!
//! ## Channel state
//!
//! ```text
//! Unregistered ──register()──▶ Registered ──any inbound message──▶ Connected
//!                                                  ▲                  │
//!                                                  └── re-dial ◀──────┘ (stays Connected)
//! Connected ──close()──▶ Closed
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use gateway_addon_domain::action::Action;
use gateway_addon_domain::adapter::Adapter;
use gateway_addon_domain::device::Device;
use gateway_addon_domain::error::{AddonError, NotFoundError, ValidationError};
use gateway_addon_domain::event::Event;
use gateway_addon_domain::id::{ActionId, AdapterId, DeviceId};
use gateway_addon_domain::property::Property;

use crate::ports::{Channel, IpcTransport};
use crate::protocol::{
    ActionStatusMessage, AddAdapterMessage, ConnectedMessage, DeviceAddedMessage,
    DeviceRemovedMessage, Envelope, ErrorMessage, EventMessage, ManagerRequest, Message,
    PropertyChangedMessage, peek_message_type,
};
use crate::registry::Registry;

/// Prefix of the duplex channel name; the plugin id is appended.
pub const PLUGIN_CHANNEL_PREFIX: &str = "gateway.plugin.";

/// Connection status of the addon towards its host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Unregistered,
    /// The registration request went out on the rendezvous channel.
    Registered,
    /// The duplex channel is open.
    Connected,
    Closed,
}

impl std::fmt::Display for ChannelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unregistered => f.write_str("unregistered"),
            Self::Registered => f.write_str("registered"),
            Self::Connected => f.write_str("connected"),
            Self::Closed => f.write_str("closed"),
        }
    }
}

/// Client-side runtime of an addon.
///
/// Notification methods take `&self` and may be called concurrently from
/// any task holding a reference (typically an `Arc<AddonManager<_>>`); the
/// transport serializes writes per socket.
pub struct AddonManager<T> {
    plugin_id: String,
    plugin_channel: String,
    transport: T,
    registry: Mutex<Registry>,
    state: Mutex<ChannelState>,
}

impl<T: IpcTransport> AddonManager<T> {
    /// Create a manager for `plugin_id` on top of an already dialled transport.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPluginId`] when `plugin_id` is empty.
    pub fn new(plugin_id: impl Into<String>, transport: T) -> Result<Self, AddonError> {
        let plugin_id = plugin_id.into();
        if plugin_id.is_empty() {
            return Err(ValidationError::EmptyPluginId.into());
        }
        Ok(Self {
            plugin_channel: format!("{PLUGIN_CHANNEL_PREFIX}{plugin_id}"),
            plugin_id,
            transport,
            registry: Mutex::new(Registry::default()),
            state: Mutex::new(ChannelState::Unregistered),
        })
    }

    /// Override the name of the duplex channel.
    #[must_use]
    pub fn with_plugin_channel(mut self, name: impl Into<String>) -> Self {
        self.plugin_channel = name.into();
        self
    }

    #[must_use]
    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    #[must_use]
    pub fn plugin_channel(&self) -> &str {
        &self.plugin_channel
    }

    #[must_use]
    pub fn state(&self) -> ChannelState {
        *self.lock_state()
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Send the registration request on the rendezvous channel.
    ///
    /// No acknowledgment is awaited: the duplex channel is opened by
    /// [`run`](Self::run) when the host answers.
    ///
    /// # Errors
    ///
    /// Returns a serialization or transport error.
    #[tracing::instrument(skip(self), fields(plugin_id = %self.plugin_id))]
    pub async fn register(&self) -> Result<(), AddonError> {
        let request = ManagerRequest::RegisterPlugin {
            plugin_id: self.plugin_id.clone(),
        };
        self.manager_send(request.to_bytes()?).await?;

        let mut state = self.lock_state();
        if *state == ChannelState::Unregistered {
            *state = ChannelState::Registered;
        }
        tracing::info!("registration sent");
        Ok(())
    }

    /// Receive loop: every inbound rendezvous message (re)opens the duplex
    /// channel. Returns when the rendezvous channel closes.
    ///
    /// The content of inbound messages is not validated; it is only peeked
    /// at for logging.
    ///
    /// # Errors
    ///
    /// Propagates receive failures and duplex dial failures.
    pub async fn run(&self) -> Result<(), AddonError> {
        tracing::info!(plugin_id = %self.plugin_id, "manager receive loop started");
        loop {
            let payload = match self.transport.recv_manager().await {
                Ok(Some(payload)) => payload,
                Ok(None) => {
                    tracing::info!("manager channel closed, receive loop stopped");
                    return Ok(());
                }
                Err(err) => {
                    tracing::warn!(error = %err, "manager receive failed");
                    return Err(err);
                }
            };
            tracing::debug!(
                bytes = payload.len(),
                message_type = peek_message_type(&payload).as_deref().unwrap_or("<unknown>"),
                "manager message received"
            );
            self.open_plugin_channel().await?;
        }
    }

    /// Dial (or re-dial) the duplex channel. Leaves the registry untouched.
    ///
    /// # Errors
    ///
    /// Returns the transport error when the dial fails.
    #[tracing::instrument(skip(self), fields(channel = %self.plugin_channel))]
    pub async fn open_plugin_channel(&self) -> Result<(), AddonError> {
        self.transport.connect_plugin(&self.plugin_channel).await?;
        *self.lock_state() = ChannelState::Connected;
        tracing::info!("plugin channel open");
        Ok(())
    }

    /// Close both channels.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::ChannelState`] when the duplex channel was never
    /// opened; closing an already closed manager is a no-op.
    pub async fn close(&self) -> Result<(), AddonError> {
        let current = self.state();
        match current {
            ChannelState::Closed => return Ok(()),
            ChannelState::Connected => {}
            ChannelState::Unregistered | ChannelState::Registered => {
                return Err(AddonError::ChannelState {
                    operation: "close",
                    state: current.to_string(),
                });
            }
        }
        self.transport.close().await?;
        *self.lock_state() = ChannelState::Closed;
        tracing::info!(plugin_id = %self.plugin_id, "channels closed");
        Ok(())
    }

    /// Report an addon-level error to the host.
    ///
    /// # Errors
    ///
    /// Returns a serialization or transport error.
    pub async fn send_error(&self, message: impl Into<String>) -> Result<(), AddonError> {
        self.plugin_send(Message::Error(ErrorMessage {
            message: message.into(),
        }))
        .await
    }

    /// Register an adapter and announce it with `ADD_ADAPTER`.
    ///
    /// The adapter is only registered once the announcement went out, so a
    /// failed send can be retried with the same adapter.
    ///
    /// # Errors
    ///
    /// Returns a validation error for invalid or duplicate adapters, or a
    /// serialization / transport error.
    #[tracing::instrument(skip(self, adapter), fields(adapter_id = %adapter.id))]
    pub async fn add_adapter(&self, adapter: Adapter) -> Result<(), AddonError> {
        let message = Message::AddAdapter(AddAdapterMessage {
            adapter_id: adapter.id.clone(),
            name: adapter.name.clone(),
            package_name: adapter.package_name.clone(),
        });
        let bytes = self.encode(message)?;
        self.lock_registry().check_adapter(&adapter)?;
        self.transport.send(Channel::Plugin, bytes).await?;
        self.lock_registry().insert_adapter(adapter)
    }

    /// Hand a device to its adapter and announce it with `HANDLE_DEVICE_ADDED`.
    ///
    /// The device is attached only after a successful send.
    ///
    /// # Errors
    ///
    /// Returns a validation or routing error when the device cannot be
    /// attached, or a serialization / transport error.
    #[tracing::instrument(skip(self, device), fields(device_id = %device.id, adapter_id = %device.adapter_id))]
    pub async fn notify_device_added(&self, device: Device) -> Result<(), AddonError> {
        device.validate()?;
        let message = Message::HandleDeviceAdded(DeviceAddedMessage {
            adapter_id: device.adapter_id.clone(),
            device: device.clone(),
        });
        let bytes = self.encode(message)?;
        self.lock_registry().check_device(&device)?;
        self.transport.send(Channel::Plugin, bytes).await?;
        self.lock_registry().insert_device(device)
    }

    /// Detach a device from its adapter and announce it with
    /// `HANDLE_DEVICE_REMOVED`. The device stays registered until the
    /// notification went out, then it is removed and returned.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown devices, or a serialization /
    /// transport error.
    #[tracing::instrument(skip(self))]
    pub async fn notify_device_removed(&self, device_id: &DeviceId) -> Result<Device, AddonError> {
        let adapter_id = {
            let registry = self.lock_registry();
            if registry.device(device_id).is_none() {
                return Err(NotFoundError {
                    entity: "Device",
                    id: device_id.to_string(),
                }
                .into());
            }
            registry.route(device_id)?
        };
        self.plugin_send(Message::HandleDeviceRemoved(DeviceRemovedMessage {
            adapter_id,
            id: device_id.clone(),
        }))
        .await?;
        Ok(self.lock_registry().remove_device(device_id)?)
    }

    /// Announce a property value with `PROPERTY_CHANGED`.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`](gateway_addon_domain::error::RoutingError)
    /// when the owning device is not attached to a registered adapter, or a
    /// serialization / transport error.
    pub async fn notify_property_changed(&self, property: &Property) -> Result<(), AddonError> {
        let adapter_id = self.route(&property.device_id)?;
        self.plugin_send(Message::PropertyChanged(PropertyChangedMessage {
            adapter_id,
            device_id: property.device_id.clone(),
            property: property.clone(),
        }))
        .await
    }

    /// Update a registered device's property and announce the new value.
    ///
    /// Returns `false` (and sends nothing) when the value did not change.
    /// The stored value only changes after the announcement went out.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown devices or properties, or a
    /// serialization / transport error.
    pub async fn set_property_value(
        &self,
        device_id: &DeviceId,
        name: &str,
        value: impl Into<String>,
    ) -> Result<bool, AddonError> {
        let mut property = {
            let registry = self.lock_registry();
            let device = registry.device(device_id).ok_or_else(|| NotFoundError {
                entity: "Device",
                id: device_id.to_string(),
            })?;
            device.property(name).cloned().ok_or_else(|| NotFoundError {
                entity: "Property",
                id: name.to_string(),
            })?
        };
        if !property.set_value(value) {
            return Ok(false);
        }
        self.notify_property_changed(&property).await?;
        self.lock_registry()
            .device_mut(device_id)?
            .set_property_value(name, property.value.clone())?;
        Ok(true)
    }

    /// Announce an action's current status with `ACTION_STATUS`.
    ///
    /// # Errors
    ///
    /// Fails fast with a routing error when the hosting device has no
    /// registered adapter, rather than emitting an unaddressed message.
    pub async fn notify_action_status(&self, action: &Action) -> Result<(), AddonError> {
        let adapter_id = self.route(&action.device_id)?;
        self.plugin_send(Message::ActionStatus(ActionStatusMessage {
            adapter_id,
            device_id: action.device_id.clone(),
            action: action.clone(),
        }))
        .await
    }

    /// Create a `created` action instance on a registered device.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown devices or undeclared actions.
    #[tracing::instrument(skip(self, input))]
    pub fn request_action(
        &self,
        device_id: &DeviceId,
        action_id: ActionId,
        name: &str,
        input: BTreeMap<String, String>,
    ) -> Result<Action, AddonError> {
        let registry = self.lock_registry();
        let device = registry.device(device_id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })?;
        Ok(device.request_action(action_id, name, input)?)
    }

    /// Validate the cancellation of an action on a registered device.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown devices or undeclared actions.
    #[tracing::instrument(skip(self))]
    pub fn remove_action(
        &self,
        device_id: &DeviceId,
        action_id: &ActionId,
        name: &str,
    ) -> Result<(), AddonError> {
        let registry = self.lock_registry();
        let device = registry.device(device_id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })?;
        device.remove_action(name)?;
        tracing::info!(%action_id, "action cancelled");
        Ok(())
    }

    /// Move an action to `pending` and announce it.
    ///
    /// # Errors
    ///
    /// Returns a transition error (nothing is sent) when the action is not
    /// `created`, or a routing / transport error.
    pub async fn start_action(&self, action: &mut Action) -> Result<(), AddonError> {
        self.route(&action.device_id)?;
        action.start()?;
        self.notify_action_status(action).await
    }

    /// Move an action to `completed` and announce it.
    ///
    /// # Errors
    ///
    /// Returns a transition error (nothing is sent) when the action is not
    /// `pending`, or a routing / transport error.
    pub async fn finish_action(&self, action: &mut Action) -> Result<(), AddonError> {
        self.route(&action.device_id)?;
        action.finish()?;
        self.notify_action_status(action).await
    }

    /// Announce a device event with `EVENT`.
    ///
    /// # Errors
    ///
    /// Returns a routing error when the emitting device is not registered,
    /// or a serialization / transport error.
    pub async fn notify_event(&self, event: &Event) -> Result<(), AddonError> {
        let adapter_id = self.route(&event.device_id)?;
        self.plugin_send(Message::Event(EventMessage {
            adapter_id,
            device_id: event.device_id.clone(),
            event: event.clone(),
        }))
        .await
    }

    /// Announce a device's connectivity with `CONNECTED`.
    ///
    /// # Errors
    ///
    /// Returns a routing error when the device is not registered, or a
    /// serialization / transport error.
    pub async fn notify_connected(
        &self,
        device_id: &DeviceId,
        connected: bool,
    ) -> Result<(), AddonError> {
        let adapter_id = self.route(device_id)?;
        self.plugin_send(Message::Connected(ConnectedMessage {
            adapter_id,
            device_id: device_id.clone(),
            connected,
        }))
        .await
    }

    /// Put an adapter in pairing mode.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown adapters.
    pub fn start_pairing(&self, adapter_id: &AdapterId, timeout: Duration) -> Result<(), AddonError> {
        let mut registry = self.lock_registry();
        let adapter = registry.adapter_mut(adapter_id)?;
        adapter.set_pairing(true);
        tracing::info!(%adapter_id, name = %adapter.name, timeout_secs = timeout.as_secs(), "pairing started");
        Ok(())
    }

    /// Leave pairing mode.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown adapters.
    pub fn cancel_pairing(&self, adapter_id: &AdapterId) -> Result<(), AddonError> {
        let mut registry = self.lock_registry();
        let adapter = registry.adapter_mut(adapter_id)?;
        adapter.set_pairing(false);
        tracing::info!(%adapter_id, name = %adapter.name, "pairing cancelled");
        Ok(())
    }

    /// Host request to forget a device: detaches it and announces the removal.
    ///
    /// # Errors
    ///
    /// Same as [`notify_device_removed`](Self::notify_device_removed).
    pub async fn remove_thing(&self, device_id: &DeviceId) -> Result<Device, AddonError> {
        tracing::info!(%device_id, "remove thing requested");
        self.notify_device_removed(device_id).await
    }

    /// Host withdrew a pending removal request.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown devices.
    pub fn cancel_remove_thing(&self, device_id: &DeviceId) -> Result<(), AddonError> {
        self.route(device_id)?;
        tracing::info!(%device_id, "remove thing cancelled");
        Ok(())
    }

    /// Drop an adapter and every device it owns from the registry.
    ///
    /// # Errors
    ///
    /// Returns a not-found error for unknown adapters.
    pub fn unload_adapter(&self, adapter_id: &AdapterId) -> Result<Adapter, AddonError> {
        let adapter = self.lock_registry().remove_adapter(adapter_id)?;
        tracing::info!(%adapter_id, devices = adapter.device_count(), "adapter unloaded");
        Ok(adapter)
    }

    /// Accept a PIN for a registered device.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::EmptyPin`] for an empty PIN, or a not-found
    /// error for unknown devices.
    pub fn set_pin(&self, device_id: &DeviceId, pin: &str) -> Result<(), AddonError> {
        if pin.is_empty() {
            return Err(ValidationError::EmptyPin.into());
        }
        let registry = self.lock_registry();
        let device = registry.device(device_id).ok_or_else(|| NotFoundError {
            entity: "Device",
            id: device_id.to_string(),
        })?;
        tracing::info!(%device_id, adapter_id = %device.adapter_id, "pin set");
        Ok(())
    }

    /// Ids of every registered adapter.
    #[must_use]
    pub fn adapter_ids(&self) -> Vec<AdapterId> {
        self.lock_registry().adapter_ids().cloned().collect()
    }

    /// Snapshot of a registered device.
    #[must_use]
    pub fn device(&self, device_id: &DeviceId) -> Option<Device> {
        self.lock_registry().device(device_id).cloned()
    }

    /// Ids of the devices owned by an adapter, or `None` for unknown adapters.
    #[must_use]
    pub fn device_ids(&self, adapter_id: &AdapterId) -> Option<Vec<DeviceId>> {
        self.lock_registry()
            .adapter(adapter_id)
            .map(|adapter| adapter.devices().map(|d| d.id.clone()).collect())
    }

    fn route(&self, device_id: &DeviceId) -> Result<AdapterId, AddonError> {
        Ok(self.lock_registry().route(device_id)?)
    }

    fn encode(&self, message: Message) -> Result<Vec<u8>, AddonError> {
        Envelope::new(self.plugin_id.clone(), message).to_bytes()
    }

    async fn plugin_send(&self, message: Message) -> Result<(), AddonError> {
        let kind = message.kind();
        let bytes = self.encode(message)?;
        tracing::debug!(channel = %Channel::Plugin, %kind, bytes = bytes.len(), "sending");
        self.transport.send(Channel::Plugin, bytes).await
    }

    async fn manager_send(&self, bytes: Vec<u8>) -> Result<(), AddonError> {
        tracing::debug!(channel = %Channel::Manager, bytes = bytes.len(), "sending");
        self.transport.send(Channel::Manager, bytes).await
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_state(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use gateway_addon_domain::action::ActionStatus;
    use gateway_addon_domain::error::{RoutingError, TransitionError};

    use crate::protocol::MessageKind;

    #[derive(Default)]
    struct RecordingTransport {
        sent: Mutex<Vec<(Channel, Vec<u8>)>>,
        inbound: Mutex<VecDeque<Vec<u8>>>,
        connects: Mutex<Vec<String>>,
        closes: AtomicUsize,
        fail_sends: AtomicBool,
    }

    impl RecordingTransport {
        fn push_inbound(&self, payload: &[u8]) {
            self.inbound.lock().unwrap().push_back(payload.to_vec());
        }

        fn sent_on(&self, channel: Channel) -> Vec<Vec<u8>> {
            self.sent
                .lock()
                .unwrap()
                .iter()
                .filter(|(c, _)| *c == channel)
                .map(|(_, bytes)| bytes.clone())
                .collect()
        }

        fn envelopes(&self) -> Vec<Envelope> {
            self.sent_on(Channel::Plugin)
                .iter()
                .map(|bytes| Envelope::from_bytes(bytes).unwrap())
                .collect()
        }
    }

    impl IpcTransport for RecordingTransport {
        fn send(
            &self,
            channel: Channel,
            payload: Vec<u8>,
        ) -> impl Future<Output = Result<(), AddonError>> + Send {
            let result = if self.fail_sends.load(Ordering::SeqCst) {
                Err(AddonError::Transport(Box::new(std::io::Error::other(
                    "broken pipe",
                ))))
            } else {
                self.sent.lock().unwrap().push((channel, payload));
                Ok(())
            };
            async { result }
        }

        fn recv_manager(
            &self,
        ) -> impl Future<Output = Result<Option<Vec<u8>>, AddonError>> + Send {
            let next = self.inbound.lock().unwrap().pop_front();
            async { Ok(next) }
        }

        fn connect_plugin(&self, name: &str) -> impl Future<Output = Result<(), AddonError>> + Send {
            self.connects.lock().unwrap().push(name.to_string());
            async { Ok(()) }
        }

        fn close(&self) -> impl Future<Output = Result<(), AddonError>> + Send {
            self.closes.fetch_add(1, Ordering::SeqCst);
            async { Ok(()) }
        }
    }

    fn make_manager() -> AddonManager<Arc<RecordingTransport>> {
        AddonManager::new("golang", Arc::new(RecordingTransport::default())).unwrap()
    }

    fn test_adapter() -> Adapter {
        Adapter::builder()
            .id("a1")
            .name("Test")
            .package_name("pkg")
            .build()
            .unwrap()
    }

    fn lamp(id: &str) -> Device {
        Device::builder()
            .id(id)
            .adapter_id("a1")
            .name("Lamp")
            .property(Property::new("on", "false"))
            .action("fade", "{}")
            .build()
            .unwrap()
    }

    async fn manager_with_lamp() -> AddonManager<Arc<RecordingTransport>> {
        let manager = make_manager();
        manager.add_adapter(test_adapter()).await.unwrap();
        manager.notify_device_added(lamp("lamp-1")).await.unwrap();
        manager
    }

    fn kinds(manager: &AddonManager<Arc<RecordingTransport>>) -> Vec<MessageKind> {
        manager
            .transport()
            .envelopes()
            .iter()
            .map(|e| e.message.kind())
            .collect()
    }

    #[test]
    fn should_reject_empty_plugin_id() {
        let result = AddonManager::new("", RecordingTransport::default());
        assert!(matches!(
            result,
            Err(AddonError::Validation(ValidationError::EmptyPluginId))
        ));
    }

    #[test]
    fn should_derive_plugin_channel_from_plugin_id() {
        let manager = make_manager();
        assert_eq!(manager.plugin_channel(), "gateway.plugin.golang");
        let manager = manager.with_plugin_channel("golang");
        assert_eq!(manager.plugin_channel(), "golang");
    }

    #[tokio::test]
    async fn should_send_exact_registration_on_manager_channel() {
        let manager = make_manager();
        manager.register().await.unwrap();

        let sent = manager.transport().sent_on(Channel::Manager);
        assert_eq!(sent.len(), 1);
        assert_eq!(
            String::from_utf8(sent[0].clone()).unwrap(),
            r#"{"messageType":"registerPlugin","data":{"pluginId":"golang"}}"#
        );
        assert!(manager.transport().sent_on(Channel::Plugin).is_empty());
        assert_eq!(manager.state(), ChannelState::Registered);
    }

    #[tokio::test]
    async fn should_emit_add_adapter_with_adapter_id() {
        let manager = make_manager();
        manager.add_adapter(test_adapter()).await.unwrap();

        let envelopes = manager.transport().envelopes();
        assert_eq!(envelopes.len(), 1);
        assert_eq!(envelopes[0].plugin_id, "golang");
        let Message::AddAdapter(payload) = &envelopes[0].message else {
            panic!("expected ADD_ADAPTER");
        };
        assert_eq!(payload.adapter_id.as_str(), "a1");
        assert_eq!(payload.name, "Test");
        assert_eq!(payload.package_name, "pkg");
        assert_eq!(manager.adapter_ids(), vec![AdapterId::new("a1")]);
    }

    #[tokio::test]
    async fn should_produce_one_message_of_matching_kind_per_notification() {
        let manager = manager_with_lamp().await;
        let device_id = DeviceId::new("lamp-1");
        let device = manager.device(&device_id).unwrap();

        manager
            .notify_property_changed(device.property("on").unwrap())
            .await
            .unwrap();
        let action = manager
            .request_action(&device_id, ActionId::new("x"), "fade", BTreeMap::new())
            .unwrap();
        manager.notify_action_status(&action).await.unwrap();
        manager
            .notify_event(&Event::new(device_id.clone(), "pressed", serde_json::json!(1)))
            .await
            .unwrap();
        manager.notify_connected(&device_id, true).await.unwrap();
        manager.send_error("oops").await.unwrap();
        manager.notify_device_removed(&device_id).await.unwrap();

        assert_eq!(
            kinds(&manager),
            vec![
                MessageKind::AddAdapter,
                MessageKind::HandleDeviceAdded,
                MessageKind::PropertyChanged,
                MessageKind::ActionStatus,
                MessageKind::Event,
                MessageKind::Connected,
                MessageKind::Error,
                MessageKind::HandleDeviceRemoved,
            ]
        );
        for envelope in manager.transport().envelopes() {
            assert_eq!(envelope.plugin_id, "golang");
        }
    }

    #[tokio::test]
    async fn should_address_property_change_through_back_references() {
        let manager = manager_with_lamp().await;
        manager
            .set_property_value(&DeviceId::new("lamp-1"), "on", "true")
            .await
            .unwrap();

        let envelopes = manager.transport().envelopes();
        let Message::PropertyChanged(payload) = &envelopes.last().unwrap().message else {
            panic!("expected PROPERTY_CHANGED");
        };
        assert_eq!(payload.adapter_id.as_str(), "a1");
        assert_eq!(payload.device_id.as_str(), "lamp-1");
        assert_eq!(payload.property.name, "on");
        assert_eq!(payload.property.value, "true");
    }

    #[tokio::test]
    async fn should_not_notify_when_property_value_is_unchanged() {
        let manager = manager_with_lamp().await;
        let changed = manager
            .set_property_value(&DeviceId::new("lamp-1"), "on", "false")
            .await
            .unwrap();
        assert!(!changed);
        assert_eq!(manager.transport().envelopes().len(), 2);
    }

    #[tokio::test]
    async fn should_track_devices_added_minus_removed() {
        let manager = make_manager();
        manager.add_adapter(test_adapter()).await.unwrap();
        for id in ["d1", "d2", "d3"] {
            manager.notify_device_added(lamp(id)).await.unwrap();
        }
        manager.notify_device_removed(&DeviceId::new("d2")).await.unwrap();

        let mut ids = manager.device_ids(&AdapterId::new("a1")).unwrap();
        ids.sort();
        assert_eq!(ids, vec![DeviceId::new("d1"), DeviceId::new("d3")]);

        let envelopes = manager.transport().envelopes();
        let Message::HandleDeviceRemoved(payload) = &envelopes.last().unwrap().message else {
            panic!("expected HANDLE_DEVICE_REMOVED");
        };
        assert_eq!(payload.id.as_str(), "d2");
        assert_eq!(payload.adapter_id.as_str(), "a1");
    }

    #[tokio::test]
    async fn should_fail_fast_when_action_device_has_no_adapter() {
        let manager = make_manager();
        let action = Action::new(
            ActionId::new("x"),
            DeviceId::new("orphan"),
            "fade",
            BTreeMap::new(),
        );

        let err = manager.notify_action_status(&action).await.unwrap_err();
        assert!(matches!(
            err,
            AddonError::Routing(RoutingError::DeviceWithoutAdapter { .. })
        ));
        assert!(manager.transport().sent_on(Channel::Plugin).is_empty());
    }

    #[tokio::test]
    async fn should_reject_device_of_unregistered_adapter_without_sending() {
        let manager = make_manager();
        let err = manager.notify_device_added(lamp("d1")).await.unwrap_err();
        assert!(matches!(
            err,
            AddonError::Routing(RoutingError::UnknownAdapter { .. })
        ));
        assert!(manager.transport().sent_on(Channel::Plugin).is_empty());
    }

    #[tokio::test]
    async fn should_announce_each_action_transition_once() {
        let manager = manager_with_lamp().await;
        let mut action = manager
            .request_action(
                &DeviceId::new("lamp-1"),
                ActionId::new("x"),
                "fade",
                BTreeMap::new(),
            )
            .unwrap();

        manager.start_action(&mut action).await.unwrap();
        manager.finish_action(&mut action).await.unwrap();
        let err = manager.finish_action(&mut action).await.unwrap_err();
        assert!(matches!(
            err,
            AddonError::Transition(TransitionError {
                from: ActionStatus::Completed,
                ..
            })
        ));

        let statuses: Vec<ActionStatus> = manager
            .transport()
            .envelopes()
            .into_iter()
            .filter_map(|e| match e.message {
                Message::ActionStatus(payload) => Some(payload.action.status()),
                _ => None,
            })
            .collect();
        assert_eq!(statuses, vec![ActionStatus::Pending, ActionStatus::Completed]);
    }

    #[tokio::test]
    async fn should_return_not_found_when_requesting_undeclared_action() {
        let manager = manager_with_lamp().await;
        let result = manager.request_action(
            &DeviceId::new("lamp-1"),
            ActionId::generate(),
            "explode",
            BTreeMap::new(),
        );
        assert!(matches!(result, Err(AddonError::NotFound(_))));
        assert!(
            manager
                .remove_action(&DeviceId::new("lamp-1"), &ActionId::new("x"), "explode")
                .is_err()
        );
    }

    #[tokio::test]
    async fn should_accept_cancel_of_declared_action_without_sending() {
        let manager = manager_with_lamp().await;
        let sent_before = kinds(&manager).len();

        manager
            .remove_action(&DeviceId::new("lamp-1"), &ActionId::new("x"), "fade")
            .unwrap();
        let err = manager
            .remove_action(&DeviceId::new("ghost"), &ActionId::new("x"), "fade")
            .unwrap_err();

        assert!(matches!(err, AddonError::NotFound(NotFoundError { entity: "Device", .. })));
        assert_eq!(kinds(&manager).len(), sent_before);
    }

    #[tokio::test]
    async fn should_open_plugin_channel_on_any_inbound_message() {
        let manager = manager_with_lamp().await;
        manager.register().await.unwrap();
        manager.transport().push_inbound(b"\xffnot json at all");
        manager
            .transport()
            .push_inbound(br#"{"messageType":"registerPluginReply"}"#);

        manager.run().await.unwrap();

        assert_eq!(
            *manager.transport().connects.lock().unwrap(),
            vec!["gateway.plugin.golang", "gateway.plugin.golang"]
        );
        assert_eq!(manager.state(), ChannelState::Connected);
        assert_eq!(
            manager.device_ids(&AdapterId::new("a1")).unwrap(),
            vec![DeviceId::new("lamp-1")]
        );
    }

    #[tokio::test]
    async fn should_refuse_close_before_plugin_channel_opened() {
        let manager = make_manager();
        manager.register().await.unwrap();
        let err = manager.close().await.unwrap_err();
        assert!(matches!(err, AddonError::ChannelState { .. }));
        assert_eq!(manager.transport().closes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn should_close_once_when_called_twice() {
        let manager = make_manager();
        manager.register().await.unwrap();
        manager.open_plugin_channel().await.unwrap();

        manager.close().await.unwrap();
        manager.close().await.unwrap();

        assert_eq!(manager.state(), ChannelState::Closed);
        assert_eq!(manager.transport().closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn should_surface_send_failure_to_caller() {
        let manager = manager_with_lamp().await;
        manager.transport().fail_sends.store(true, Ordering::SeqCst);

        let err = manager
            .notify_connected(&DeviceId::new("lamp-1"), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
    }

    #[tokio::test]
    async fn should_keep_device_registered_when_removal_send_fails() {
        let manager = manager_with_lamp().await;
        let lamp_id = DeviceId::new("lamp-1");
        manager.transport().fail_sends.store(true, Ordering::SeqCst);

        let err = manager.notify_device_removed(&lamp_id).await.unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
        assert!(manager.device(&lamp_id).is_some());

        manager.transport().fail_sends.store(false, Ordering::SeqCst);
        let removed = manager.notify_device_removed(&lamp_id).await.unwrap();
        assert_eq!(removed.id, lamp_id);
        assert!(manager.device(&lamp_id).is_none());
        assert_eq!(
            kinds(&manager).last(),
            Some(&MessageKind::HandleDeviceRemoved)
        );
    }

    #[tokio::test]
    async fn should_send_add_adapter_on_retry_after_failed_send() {
        let manager = make_manager();
        manager.transport().fail_sends.store(true, Ordering::SeqCst);

        let err = manager.add_adapter(test_adapter()).await.unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
        assert!(manager.adapter_ids().is_empty());

        manager.transport().fail_sends.store(false, Ordering::SeqCst);
        manager.add_adapter(test_adapter()).await.unwrap();
        assert_eq!(kinds(&manager), vec![MessageKind::AddAdapter]);
        assert_eq!(manager.adapter_ids(), vec![AdapterId::new("a1")]);
    }

    #[tokio::test]
    async fn should_send_device_added_on_retry_after_failed_send() {
        let manager = make_manager();
        manager.add_adapter(test_adapter()).await.unwrap();
        manager.transport().fail_sends.store(true, Ordering::SeqCst);

        let err = manager.notify_device_added(lamp("lamp-1")).await.unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
        assert!(manager.device(&DeviceId::new("lamp-1")).is_none());

        manager.transport().fail_sends.store(false, Ordering::SeqCst);
        manager.notify_device_added(lamp("lamp-1")).await.unwrap();
        assert_eq!(
            kinds(&manager),
            vec![MessageKind::AddAdapter, MessageKind::HandleDeviceAdded]
        );
    }

    #[tokio::test]
    async fn should_resend_property_change_on_retry_after_failed_send() {
        let manager = manager_with_lamp().await;
        let lamp_id = DeviceId::new("lamp-1");
        manager.transport().fail_sends.store(true, Ordering::SeqCst);

        let err = manager
            .set_property_value(&lamp_id, "on", "true")
            .await
            .unwrap_err();
        assert!(matches!(err, AddonError::Transport(_)));
        let device = manager.device(&lamp_id).unwrap();
        assert_eq!(device.property("on").unwrap().value, "false");

        manager.transport().fail_sends.store(false, Ordering::SeqCst);
        assert!(
            manager
                .set_property_value(&lamp_id, "on", "true")
                .await
                .unwrap()
        );
        let device = manager.device(&lamp_id).unwrap();
        assert_eq!(device.property("on").unwrap().value, "true");
        assert_eq!(kinds(&manager).last(), Some(&MessageKind::PropertyChanged));
    }

    #[tokio::test]
    async fn should_toggle_pairing_and_unload_adapter() {
        let manager = manager_with_lamp().await;
        let adapter_id = AdapterId::new("a1");

        manager
            .start_pairing(&adapter_id, Duration::from_secs(60))
            .unwrap();
        manager.cancel_pairing(&adapter_id).unwrap();

        let adapter = manager.unload_adapter(&adapter_id).unwrap();
        assert!(!adapter.is_pairing());
        assert_eq!(adapter.device_count(), 1);
        assert!(manager.adapter_ids().is_empty());
        assert!(manager.device(&DeviceId::new("lamp-1")).is_none());
        assert!(matches!(
            manager.start_pairing(&adapter_id, Duration::from_secs(1)),
            Err(AddonError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_validate_pin_requests() {
        let manager = manager_with_lamp().await;
        assert!(manager.set_pin(&DeviceId::new("lamp-1"), "1234").is_ok());
        assert!(matches!(
            manager.set_pin(&DeviceId::new("lamp-1"), ""),
            Err(AddonError::Validation(ValidationError::EmptyPin))
        ));
        assert!(matches!(
            manager.set_pin(&DeviceId::new("ghost"), "1234"),
            Err(AddonError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn should_remove_thing_on_host_request() {
        let manager = manager_with_lamp().await;
        assert!(manager.cancel_remove_thing(&DeviceId::new("lamp-1")).is_ok());
        let removed = manager.remove_thing(&DeviceId::new("lamp-1")).await.unwrap();
        assert_eq!(removed.id.as_str(), "lamp-1");
        assert_eq!(
            kinds(&manager).last(),
            Some(&MessageKind::HandleDeviceRemoved)
        );
    }
}
