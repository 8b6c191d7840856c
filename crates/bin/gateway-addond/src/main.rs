//! # gateway-addond: addon daemon
//!
//! Composition root that wires the socket transport and the settings store
//! into the addon manager and runs it.
//!
//! ## Responsibilities
//! - Load configuration (config file, env vars)
//! - Install the `tracing` subscriber
//! - Dial the host's rendezvous socket (fatal on failure)
//! - Open the host's settings database when one can be found
//! - Register, then run the receive loop until the host hangs up or the
//!   process is interrupted
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer; no protocol logic belongs here.

mod config;

use gateway_addon_adapter_ipc_unix::UnixIpcClient;
use gateway_addon_adapter_storage_sqlite_sqlx::{Config as StorageConfig, SqliteConfigStore};
use gateway_addon_app::addon_manager::{AddonManager, ChannelState};
use gateway_addon_app::services::ConfigService;
use tracing_subscriber::EnvFilter;

use crate::config::{Config, DatabaseConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::load()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.logging.directive()))
        .init();

    let transport = UnixIpcClient::connect(config.ipc.clone()).await?;
    let manager = AddonManager::new(config.addon.plugin_id.clone(), transport)?
        .with_plugin_channel(config.plugin_channel());

    if let Some(store) = open_config_store(&config.database).await {
        let settings = ConfigService::new(store, config.package_name());
        match settings.load::<serde_json::Value>().await {
            Ok(stored) => tracing::info!(package = settings.package(), %stored, "stored config loaded"),
            Err(err) => tracing::warn!(package = settings.package(), error = %err, "stored config unreadable"),
        }
    }

    manager.register().await?;

    let outcome: Result<(), Box<dyn std::error::Error>> = tokio::select! {
        result = manager.run() => result.map_err(Into::into),
        signal = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            signal.map_err(Into::into)
        }
    };

    if manager.state() == ChannelState::Connected {
        manager.close().await?;
    }
    outcome?;
    Ok(())
}

async fn open_config_store(config: &DatabaseConfig) -> Option<SqliteConfigStore> {
    let storage_config = match &config.url {
        Some(url) => StorageConfig::new(url.clone()),
        None => match StorageConfig::from_env() {
            Ok(found) => found,
            Err(err) => {
                tracing::info!(error = %err, "settings database disabled");
                return None;
            }
        },
    };
    match storage_config.build().await {
        Ok(db) => Some(SqliteConfigStore::new(db.pool().clone())),
        Err(err) => {
            tracing::warn!(error = %err, "failed to open settings database");
            None
        }
    }
}
