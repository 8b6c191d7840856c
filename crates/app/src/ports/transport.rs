//! IPC transport port: the two sockets linking the addon to its host.

use std::future::Future;

use gateway_addon_domain::error::AddonError;

/// The two logical channels between addon and host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// Rendezvous channel to the host's addon manager, dialled once at startup.
    Manager,
    /// Per-addon duplex channel carrying every notification after registration.
    Plugin,
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Manager => f.write_str("manager"),
            Self::Plugin => f.write_str("plugin"),
        }
    }
}

/// Message-oriented transport over the rendezvous and duplex channels.
///
/// Implementations must serialize writes per channel: two concurrent
/// [`send`](Self::send) calls on the same channel never interleave. Reads
/// only happen on the rendezvous channel, from the addon's receive loop.
pub trait IpcTransport: Send + Sync {
    /// Write one message to `channel`.
    fn send(
        &self,
        channel: Channel,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), AddonError>> + Send;

    /// Wait for the next message on the rendezvous channel.
    ///
    /// Resolves to `Ok(None)` once the channel is closed.
    fn recv_manager(&self) -> impl Future<Output = Result<Option<Vec<u8>>, AddonError>> + Send;

    /// (Re)dial the duplex channel named `name`, replacing any previous one.
    fn connect_plugin(&self, name: &str) -> impl Future<Output = Result<(), AddonError>> + Send;

    /// Close both channels. Closing twice is a no-op.
    fn close(&self) -> impl Future<Output = Result<(), AddonError>> + Send;
}

impl<T: IpcTransport> IpcTransport for std::sync::Arc<T> {
    fn send(
        &self,
        channel: Channel,
        payload: Vec<u8>,
    ) -> impl Future<Output = Result<(), AddonError>> + Send {
        (**self).send(channel, payload)
    }

    fn recv_manager(&self) -> impl Future<Output = Result<Option<Vec<u8>>, AddonError>> + Send {
        (**self).recv_manager()
    }

    fn connect_plugin(&self, name: &str) -> impl Future<Output = Result<(), AddonError>> + Send {
        (**self).connect_plugin(name)
    }

    fn close(&self) -> impl Future<Output = Result<(), AddonError>> + Send {
        (**self).close()
    }
}
