//! # gateway-addon-app
//!
//! Application layer: the addon manager, the wire protocol and **port
//! definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `IpcTransport`: rendezvous and duplex channels to the host
//!   - `ConfigStore`: the host's per-package settings
//! - Encode every outbound notification as a protocol [`protocol::Envelope`]
//! - Own adapters and devices in a [`registry::Registry`] and route
//!   notifications from back-references to the owning adapter
//! - Drive the registration handshake and the receive loop
//!   ([`addon_manager::AddonManager`])
//!
//! ## Dependency rule
//! Depends on `gateway-addon-domain` only. Never imports adapter crates.
//! Adapters depend on *this* crate, not the reverse.

pub mod addon_manager;
pub mod ports;
pub mod protocol;
pub mod registry;
pub mod services;
