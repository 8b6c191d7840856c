//! IPC adapter error types.

use std::path::PathBuf;

use gateway_addon_app::ports::Channel;
use gateway_addon_domain::error::AddonError;

/// Errors specific to the Unix socket transport.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// The channel has not been dialled yet.
    #[error("{0} channel not connected")]
    NotConnected(Channel),

    /// Dialling a socket failed.
    #[error("failed to connect to {}", path.display())]
    Connect {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading or writing a frame failed.
    #[error("socket I/O error")]
    Io(#[from] std::io::Error),

    /// The transport was closed.
    #[error("transport closed")]
    Closed,
}

impl IpcError {
    /// Convert into an [`AddonError::Transport`] for propagation across port
    /// boundaries.
    pub fn into_domain(self) -> AddonError {
        AddonError::Transport(Box::new(self))
    }
}

impl From<IpcError> for AddonError {
    fn from(err: IpcError) -> Self {
        err.into_domain()
    }
}
