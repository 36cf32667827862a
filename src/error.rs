//! Error types for Echovault
//!
//! This module defines all error types used throughout the storage
//! subsystem, using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for Echovault operations
///
/// This enum encompasses all possible errors that can occur during
/// configuration loading, local history persistence, Drive API calls,
/// and the OAuth credential lifecycle.
///
/// Public store methods never surface these errors directly; they are
/// caught at the trait boundary and converted into the documented
/// degrade-gracefully values (empty history, logged no-op writes, a
/// boolean from `authenticate`). Internal code propagates them with `?`.
#[derive(Error, Debug)]
pub enum EchovaultError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Local history persistence errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// OAuth credential lifecycle errors (missing client secrets, consent
    /// flow failure, refresh failure)
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Remote Drive API errors (list/create/upload/download)
    #[error("Drive API error: {0}")]
    Drive(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Result type alias for Echovault operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
