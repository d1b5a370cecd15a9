//! Core business logic for huddle.
//!
//! Services here own the real-time messaging rules: channel access,
//! the message write pipeline with its mention and link enrichment,
//! read state, and the typed events handed to the session hub.

pub mod services;

pub use services::*;
