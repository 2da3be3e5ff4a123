//! Named-command boundary between the UI host and core services.
//!
//! # Responsibility
//! - Parse wire commands into typed requests.
//! - Run them against injected collaborators and wrap the outcome in an
//!   `Envelope`.

pub mod command;
pub mod dispatcher;
pub mod envelope;
