//! # gateway-addon-adapter-ipc-unix
//!
//! Unix domain socket transport between an addon and its host.
//!
//! ## Responsibilities
//! - Implement [`IpcTransport`](gateway_addon_app::ports::IpcTransport) over
//!   `tokio::net::UnixStream`
//! - Frame every message with a 4-byte big-endian length prefix so one write
//!   is one message on the other side
//! - Serialize concurrent writers per socket
//!
//! ## Wire compatibility
//! The length prefix is this crate's own framing. It only talks to a host
//! that reads and writes the same `LengthDelimitedCodec` frames. A nanomsg
//! `ipc://` endpoint (SP header handshake, 8-byte size prefix, REQ and PAIR
//! sockets) will reject it; reaching such a host needs a different
//! [`IpcTransport`](gateway_addon_app::ports::IpcTransport) implementation.
//!
//! ## Dependency rule
//! Depends on `gateway-addon-app` (for the port trait) and
//! `gateway-addon-domain` (for the error type). The `app` and `domain` crates
//! must never reference this adapter.

pub mod client;
pub mod config;
pub mod error;

pub use client::UnixIpcClient;
pub use config::IpcConfig;
pub use error::IpcError;
