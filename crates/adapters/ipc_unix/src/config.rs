//! Socket layout configuration.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Where the host's sockets live and how they are named.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Directory holding every channel socket.
    pub root: PathBuf,
    /// File name of the host's rendezvous socket.
    pub manager_channel: String,
    /// Prefix of the per-addon duplex socket; the plugin id is appended.
    pub plugin_channel_prefix: String,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/tmp"),
            manager_channel: "gateway.addonManager".to_string(),
            plugin_channel_prefix: "gateway.plugin.".to_string(),
        }
    }
}

impl IpcConfig {
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = root.into();
        self
    }

    /// Socket path of the rendezvous channel.
    #[must_use]
    pub fn manager_path(&self) -> PathBuf {
        self.root.join(&self.manager_channel)
    }

    /// Name of the duplex channel for `plugin_id`.
    #[must_use]
    pub fn plugin_channel(&self, plugin_id: &str) -> String {
        format!("{}{plugin_id}", self.plugin_channel_prefix)
    }

    /// Socket path of a named channel.
    #[must_use]
    pub fn channel_path(&self, name: &str) -> PathBuf {
        Path::new(&self.root).join(name)
    }
}
