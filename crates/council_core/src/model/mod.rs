//! Record entities owned by the data-access layer.
//!
//! # Responsibility
//! - Define the plain records exchanged between the UI and the host.
//! - Validate create/update inputs before any storage call.

pub mod record;
