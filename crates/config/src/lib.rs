// Configuration Management
//
// This crate handles all configuration loading for the proxy server and the
// relay client. It provides:
// - Configuration structs built from environment variables
// - Default values for optional settings
// - A single error type for missing or malformed values
//
// Binaries load `.env` themselves before calling into this crate.

use thiserror::Error;

pub mod types;

// Re-export all configuration types
pub use types::*;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} not set")]
    Missing { key: &'static str },

    #[error("{key} is invalid: {reason}")]
    Invalid { key: &'static str, reason: String },
}
