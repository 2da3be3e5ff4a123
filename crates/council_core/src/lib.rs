//! Core domain logic for AI Character Council.
//! This crate owns the API key vault, the record store and the command table;
//! hosts only move frames in and out.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod vault;

pub use config::{AppConfig, ConfigError};
pub use dispatch::command::{Command, CommandError, CommandName};
pub use dispatch::dispatcher::{AppInfo, DispatchError, Dispatcher};
pub use dispatch::envelope::Envelope;
pub use logging::{init_logging, logging_status, LogLevel};
pub use repo::record_repo::{RecordStore, RepoError, RepoResult};
pub use repo::sqlite_store::SqliteRecordStore;
pub use vault::api_key_vault::{Vault, VaultError};
pub use vault::credential_store::{
    CredentialStore, CredentialStoreError, KeyringCredentialStore, MemoryCredentialStore,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
