//! # gateway-addon-adapter-storage-sqlite-sqlx
//!
//! `SQLite` settings adapter using [sqlx](https://docs.rs/sqlx).
//!
//! ## Responsibilities
//! - Locate the host's settings database (`MOZIOT_DATABASE`, then
//!   `config/db.sqlite3` under `MOZIOT_HOME`)
//! - Implement [`ConfigStore`](gateway_addon_app::ports::ConfigStore) over the
//!   host's `settings` table
//! - Wrap and unwrap the host's `{"moziot": {"config": ...}}` blob envelope
//!
//! ## Dependency rule
//! Depends on `gateway-addon-app` (for port traits) and `gateway-addon-domain`
//! (for the error type). The `app` and `domain` crates must never reference
//! this adapter.

pub mod error;
pub mod pool;
pub mod settings_repo;

pub use pool::{Config, Database};
pub use settings_repo::SqliteConfigStore;
