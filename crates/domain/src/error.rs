//! Common error types used across the workspace.
//!
//! Each layer defines its own typed errors and converts into [`AddonError`]
//! via `#[from]`. Adapter crates box their IO errors into
//! [`AddonError::Transport`] or [`AddonError::Storage`].

use crate::action::ActionStatus;

/// Top-level error returned by every addon operation.
#[derive(Debug, thiserror::Error)]
pub enum AddonError {
    #[error("validation error")]
    Validation(#[from] ValidationError),

    #[error("not found")]
    NotFound(#[from] NotFoundError),

    #[error("invalid action transition")]
    Transition(#[from] TransitionError),

    #[error("routing error")]
    Routing(#[from] RoutingError),

    /// A payload could not be marshalled. Raised before any socket I/O.
    #[error("failed to serialize message")]
    Serialization(#[from] serde_json::Error),

    #[error("cannot {operation} while channel is {state}")]
    ChannelState {
        operation: &'static str,
        state: String,
    },

    #[error("transport error")]
    Transport(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("storage error")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Invariant violations detected while building or registering objects.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{entity} id must not be empty")]
    EmptyId { entity: &'static str },

    #[error("plugin id must not be empty")]
    EmptyPluginId,

    #[error("{entity} {id} is already registered")]
    Duplicate { entity: &'static str, id: String },

    #[error("pin must not be empty")]
    EmptyPin,
}

/// A lookup by identifier failed.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{entity} {id} not found")]
pub struct NotFoundError {
    pub entity: &'static str,
    pub id: String,
}

/// An action status change that would move backwards or skip a step.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("action {id} cannot move from {from} to {to}")]
pub struct TransitionError {
    pub id: String,
    pub from: ActionStatus,
    pub to: ActionStatus,
}

/// A notification could not be addressed because its owner is unknown.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RoutingError {
    #[error("device {device_id} is not attached to any registered adapter")]
    DeviceWithoutAdapter { device_id: String },

    #[error("adapter {adapter_id} of device {device_id} is not registered")]
    UnknownAdapter {
        adapter_id: String,
        device_id: String,
    },
}
