//! Credential vault for third-party API keys.
//!
//! # Responsibility
//! - Keep API keys confidential at rest (authenticated encryption).
//! - Hide the OS credential store behind a small trait so hosts and tests
//!   can swap backends.

pub mod api_key_vault;
pub mod cipher;
pub mod credential_store;
