//! Host bridge between a UI process and `council_core`.
//!
//! Frames are newline-delimited JSON; each request runs as its own task and
//! responses are correlated by `id`.

pub mod api;
pub mod frame;

pub use api::HostBridge;
pub use frame::{BridgeRequest, BridgeResponse};
