//! Config service: typed access to an addon's persisted settings.

use serde::Serialize;
use serde::de::DeserializeOwned;

use gateway_addon_domain::error::AddonError;

use crate::ports::ConfigStore;

/// Reads and writes the configuration blob of one package.
pub struct ConfigService<S> {
    store: S,
    package: String,
}

impl<S: ConfigStore> ConfigService<S> {
    /// Create a service bound to `package` on top of the given store.
    pub fn new(store: S, package: impl Into<String>) -> Self {
        Self {
            store,
            package: package.into(),
        }
    }

    #[must_use]
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Load the package configuration, falling back to `T::default()` when
    /// nothing is stored yet.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Serialization`] when the stored blob does not
    /// match `T`, or a storage error from the store.
    #[tracing::instrument(skip(self), fields(package = %self.package))]
    pub async fn load<T: DeserializeOwned + Default>(&self) -> Result<T, AddonError> {
        match self.store.load_config(&self.package).await? {
            Some(value) => Ok(serde_json::from_value(value)?),
            None => {
                tracing::debug!("no stored config, using defaults");
                Ok(T::default())
            }
        }
    }

    /// Persist the package configuration, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`AddonError::Serialization`] when `config` cannot be
    /// represented as JSON, or a storage error from the store.
    #[tracing::instrument(skip(self, config), fields(package = %self.package))]
    pub async fn save<T: Serialize>(&self, config: &T) -> Result<(), AddonError> {
        let value = serde_json::to_value(config)?;
        self.store.save_config(&self.package, value).await
    }
}
