//! Core use-case services.
//!
//! # Responsibility
//! - Hold behavior that is neither storage nor transport.

pub mod dialogue_service;
