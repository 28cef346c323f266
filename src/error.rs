// Copyright 2025 Vivian Voss. Licensed under the Apache License, Version 2.0.
// SPDX-License-Identifier: Apache-2.0

//! Error types for LatticeKV.
//!
//! Per the engine's error model, only two classes of failure are ever
//! surfaced as `Err`: resource exhaustion (the allocator cannot satisfy a
//! pool refill) and configuration problems. Structural concurrency
//! retries (a version changed, a leaf split under us) are handled
//! internally by the cursor protocols and never escape; logical absence
//! (key not found) is returned as `Option::None`, not an error.

use std::fmt;

/// Standard `Result` type for all LatticeKV operations.
pub type LatticeResult<T> = Result<T, LatticeError>;

/// Error types for LatticeKV operations.
#[derive(Debug, Clone)]
pub enum LatticeError {
    /// The thread-local pool could not refill a size class from the
    /// system allocator. Fatal to the calling thread; the engine makes
    /// no attempt to roll back a partially applied structural mutation.
    PoolExhausted { size_class: usize, reason: String },

    /// Configuration file could not be read.
    ConfigIoError { path: String, reason: String },

    /// Configuration file could not be parsed as TOML.
    ConfigParseError { path: String, reason: String },

    /// A configuration value was out of its valid range.
    InvalidConfig { field: String, reason: String },
}

impl fmt::Display for LatticeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PoolExhausted { size_class, reason } => write!(
                f,
                "pool exhausted for size class {}: {}",
                size_class, reason
            ),
            Self::ConfigIoError { path, reason } => {
                write!(f, "could not read config '{}': {}", path, reason)
            }
            Self::ConfigParseError { path, reason } => {
                write!(f, "could not parse config '{}': {}", path, reason)
            }
            Self::InvalidConfig { field, reason } => {
                write!(f, "invalid config field '{}': {}", field, reason)
            }
        }
    }
}

impl std::error::Error for LatticeError {}

impl From<std::io::Error> for LatticeError {
    fn from(err: std::io::Error) -> Self {
        LatticeError::ConfigIoError {
            path: "<unknown>".to_string(),
            reason: err.to_string(),
        }
    }
}
