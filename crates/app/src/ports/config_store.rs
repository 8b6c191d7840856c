//! Config store port: the host's persistent per-addon settings.

use std::future::Future;

use gateway_addon_domain::error::AddonError;

/// Key/value store of addon configuration blobs, keyed by package name.
///
/// The blob is opaque to the addon core; implementations handle whatever
/// envelope the host wraps it in.
pub trait ConfigStore: Send + Sync {
    /// Load the configuration of `package`, or `None` when nothing is stored.
    fn load_config(
        &self,
        package: &str,
    ) -> impl Future<Output = Result<Option<serde_json::Value>, AddonError>> + Send;

    /// Replace the configuration of `package`.
    fn save_config(
        &self,
        package: &str,
        config: serde_json::Value,
    ) -> impl Future<Output = Result<(), AddonError>> + Send;
}
