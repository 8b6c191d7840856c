//! `SQLite` implementation of [`ConfigStore`] over the host's `settings` table.

use std::future::Future;

use serde_json::{Map, Value};
use sqlx::SqlitePool;

use gateway_addon_app::ports::ConfigStore;
use gateway_addon_domain::error::AddonError;

use crate::error::StorageError;

const SELECT_VALUE: &str = "SELECT value FROM settings WHERE key = ?";
const UPSERT: &str = "INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)";

/// Settings key under which the host stores a package's blob.
#[must_use]
pub fn settings_key(package: &str) -> String {
    format!("addons.{package}")
}

/// `SQLite`-backed addon configuration store.
pub struct SqliteConfigStore {
    pool: SqlitePool,
}

impl SqliteConfigStore {
    /// Create a new store using the given connection pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn unwrap_config(blob: Value) -> Option<Value> {
    match blob {
        Value::Object(mut root) => match root.remove("moziot")? {
            Value::Object(mut moziot) => moziot.remove("config"),
            _ => None,
        },
        _ => None,
    }
}

/// Replace `moziot.config` in `blob`, keeping every other key.
fn wrap_config(blob: Option<Value>, config: Value) -> Value {
    let mut root = match blob {
        Some(Value::Object(root)) => root,
        _ => Map::new(),
    };
    let mut moziot = match root.remove("moziot") {
        Some(Value::Object(moziot)) => moziot,
        _ => Map::new(),
    };
    moziot.insert("config".to_string(), config);
    root.insert("moziot".to_string(), Value::Object(moziot));
    Value::Object(root)
}

impl ConfigStore for SqliteConfigStore {
    fn load_config(
        &self,
        package: &str,
    ) -> impl Future<Output = Result<Option<Value>, AddonError>> + Send {
        let pool = self.pool.clone();
        let key = settings_key(package);
        async move {
            let stored: Option<Option<String>> = sqlx::query_scalar(SELECT_VALUE)
                .bind(&key)
                .fetch_optional(&pool)
                .await
                .map_err(StorageError::from)?;
            let Some(text) = stored.flatten() else {
                tracing::debug!(%key, "no stored settings");
                return Ok(None);
            };
            let blob: Value = serde_json::from_str(&text).map_err(StorageError::from)?;
            Ok(unwrap_config(blob))
        }
    }

    fn save_config(
        &self,
        package: &str,
        config: Value,
    ) -> impl Future<Output = Result<(), AddonError>> + Send {
        let pool = self.pool.clone();
        let key = settings_key(package);
        async move {
            let mut tx = pool.begin().await.map_err(StorageError::from)?;
            let stored: Option<Option<String>> = sqlx::query_scalar(SELECT_VALUE)
                .bind(&key)
                .fetch_optional(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            let existing = stored
                .flatten()
                .map(|text| serde_json::from_str::<Value>(&text))
                .transpose()
                .map_err(StorageError::from)?;

            let blob = wrap_config(existing, config);
            sqlx::query(UPSERT)
                .bind(&key)
                .bind(blob.to_string())
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
            tx.commit().await.map_err(StorageError::from)?;
            tracing::debug!(%key, "settings saved");
            Ok(())
        }
    }
}
