//! Port definitions: traits that adapters implement.
//!
//! Ports are the boundaries between the addon core and the outside world:
//! the inter-process channels to the host and the host's settings store.
//! They are defined here (in `app`) so that both the addon manager and the
//! adapter crates can depend on them without circular dependencies.

pub mod config_store;
pub mod transport;

pub use config_store::ConfigStore;
pub use transport::{Channel, IpcTransport};
