//! Core error types for pomocycle-core.
//!
//! This module defines the error hierarchy using thiserror. Configuration
//! problems are fatal at startup; engine errors only describe why a driver
//! loop stopped.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for pomocycle-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Engine lifecycle errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Failed to parse configuration
    #[error("Failed to parse configuration: {0}")]
    ParseFailed(String),

    /// The config directory could not be determined or created
    #[error("Configuration directory unavailable: {0}")]
    DirUnavailable(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Micro-interval bound is empty or collapses to zero
    #[error("Invalid micro-interval bound: base {base}s with offset {offset}s gives [{min}, {max}]")]
    DegenerateBound {
        base: u64,
        offset: u64,
        min: i64,
        max: i64,
    },

    /// A duration or count beyond what the engine accepts
    #[error("'{field}' is {value}, above the maximum of {max}")]
    OutOfRange { field: String, value: u64, max: u64 },

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Reasons a driver loop stops running cycles.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The shutdown signal was raised between two waits
    #[error("shutdown requested")]
    ShutdownRequested,

    /// The driver thread could not be spawned
    #[error("failed to spawn driver thread: {0}")]
    SpawnFailed(String),

    /// The driver thread panicked outside the per-cycle guard
    #[error("driver thread panicked")]
    DriverPanicked,
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
