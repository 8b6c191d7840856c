//! Configuration loading: TOML file with environment variable overrides.
//!
//! Looks for `gateway-addon.toml` in the working directory. Every field has a
//! default so the file is optional. Environment variables take precedence
//! over file values.

use std::path::PathBuf;

use gateway_addon_adapter_ipc_unix::IpcConfig;
use serde::Deserialize;

const LOG_TARGETS: [&str; 4] = [
    "gateway_addond",
    "gateway_addon_app",
    "gateway_addon_adapter_ipc_unix",
    "gateway_addon_adapter_storage_sqlite_sqlx",
];

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Identity of this addon.
    pub addon: AddonConfig,
    /// Socket layout of the host.
    pub ipc: IpcConfig,
    /// Settings database.
    pub database: DatabaseConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Addon identity.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AddonConfig {
    /// Plugin id sent at registration; also names the duplex channel.
    pub plugin_id: String,
    /// Package whose stored settings are loaded. Defaults to the plugin id.
    pub package_name: Option<String>,
}

/// `SQLite` settings database configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// `SQLite` connection URL. Discovered from the host environment when absent.
    pub url: Option<String>,
}

/// Logging configuration.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive (`RUST_LOG` syntax).
    pub filter: String,
    /// Raise every addon crate to `debug`.
    pub verbose: bool,
}

impl Config {
    /// Load configuration from `gateway-addon.toml` (if present) then apply
    /// environment-variable overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML file exists but is malformed, or if the
    /// resulting configuration is invalid.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::from_file("gateway-addon.toml")?;
        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(ConfigError::Parse),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(ConfigError::Io(err)),
        }
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("GATEWAY_ADDON_PLUGIN_ID") {
            self.addon.plugin_id = val;
        }
        if let Some(val) = lookup("GATEWAY_ADDON_PACKAGE") {
            self.addon.package_name = Some(val);
        }
        if let Some(val) = lookup("GATEWAY_ADDON_IPC_ROOT") {
            self.ipc.root = PathBuf::from(val);
        }
        if let Some(val) = lookup("GATEWAY_ADDON_DATABASE_URL") {
            self.database.url = Some(val);
        }
        if let Some(val) = lookup("GATEWAY_ADDON_LOG") {
            self.logging.filter = val;
        }
        if let Some(val) = lookup("RUST_LOG") {
            self.logging.filter = val;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.addon.plugin_id.is_empty() {
            return Err(ConfigError::Validation(
                "plugin id must not be empty".to_string(),
            ));
        }
        if self.ipc.manager_channel.is_empty() {
            return Err(ConfigError::Validation(
                "manager channel must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Package name used as the settings key.
    #[must_use]
    pub fn package_name(&self) -> &str {
        self.addon
            .package_name
            .as_deref()
            .unwrap_or(&self.addon.plugin_id)
    }

    /// Name of this addon's duplex channel.
    #[must_use]
    pub fn plugin_channel(&self) -> String {
        self.ipc.plugin_channel(&self.addon.plugin_id)
    }
}

impl LoggingConfig {
    /// Filter directive with the verbose flag applied.
    #[must_use]
    pub fn directive(&self) -> String {
        if !self.verbose {
            return self.filter.clone();
        }
        let mut directive = self.filter.clone();
        for target in LOG_TARGETS {
            if !directive.is_empty() {
                directive.push(',');
            }
            directive.push_str(target);
            directive.push_str("=debug");
        }
        directive
    }
}

impl Default for AddonConfig {
    fn default() -> Self {
        Self {
            plugin_id: "rust".to_string(),
            package_name: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: LOG_TARGETS.map(|target| format!("{target}=info")).join(","),
            verbose: false,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parse failure.
    #[error("failed to parse config file")]
    Parse(#[from] toml::de::Error),
    /// File I/O failure.
    #[error("failed to read config file")]
    Io(#[from] std::io::Error),
    /// Semantic validation failure.
    #[error("invalid configuration: {0}")]
    Validation(String),
}
