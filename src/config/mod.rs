//! Configuration Module
//!
//! Handles application configuration loading, validation, and secret storage.

pub mod secrets;
mod types;

pub use secrets::SecretString;
pub use types::*;
