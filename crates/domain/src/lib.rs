//! # gateway-addon-domain
//!
//! Pure domain model for an out-of-process gateway addon.
//!
//! ## Responsibilities
//! - Foundational types: typed identifiers, error conventions, timestamps
//! - Define **Adapters** (driver instances that own devices)
//! - Define **Devices** (things exposing properties, actions and events)
//! - Define **Properties**, **Actions** and **Events** and their state rules
//! - Contain all invariant enforcement and domain logic
//!
//! ## Ownership
//! Adapters own their devices, devices own their properties. Every
//! back-reference (`Device::adapter_id`, `Property::device_id`, …) is a plain
//! identifier resolved through the addon registry, never a shared pointer.
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.

pub mod error;
pub mod id;

pub mod action;
pub mod adapter;
pub mod device;
pub mod event;
pub mod property;

/// UTC timestamp carried by actions and events.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
