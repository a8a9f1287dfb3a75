// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Unified error types for Printbridge.

use thiserror::Error;

use crate::types::{ErrorClass, PrinterType};

/// Top-level error type for all Printbridge operations.
#[derive(Debug, Error)]
pub enum BridgeError {
    // -- Configuration --
    #[error("configuration error: {0}")]
    Configuration(String),

    // -- Input validation --
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("type mismatch: printer is {printer}, job is {job}")]
    TypeMismatch { printer: PrinterType, job: PrinterType },

    #[error("{0} not found")]
    NotFound(String),

    // -- Printing / network --
    #[error("transport error: {0}")]
    Transport(String),

    #[error("encoding failed: {0}")]
    Encode(String),

    #[error("image processing failed: {0}")]
    ImageError(String),

    // -- Service lifecycle --
    #[error("service not running")]
    ServiceNotRunning,

    // -- Storage / persistence --
    #[error("database error: {0}")]
    Database(String),

    #[error("file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // -- Platform --
    #[error("{0} is not available on this platform")]
    PlatformUnavailable(String),
}

impl BridgeError {
    /// Coarse classification used by the sync client and the logs.
    pub fn class(&self) -> ErrorClass {
        match self {
            BridgeError::Configuration(_) => ErrorClass::Configuration,

            BridgeError::Transport(_) | BridgeError::Database(_) | BridgeError::Io(_) => {
                ErrorClass::Transient
            }

            BridgeError::Validation(_)
            | BridgeError::TypeMismatch { .. }
            | BridgeError::NotFound(_)
            | BridgeError::Encode(_)
            | BridgeError::ImageError(_)
            | BridgeError::ServiceNotRunning
            | BridgeError::Serialization(_)
            | BridgeError::PlatformUnavailable(_) => ErrorClass::Permanent,
        }
    }
}

/// Free-function form of [`BridgeError::class`], handy in `map`/`inspect_err` chains.
pub fn classify_error(err: &BridgeError) -> ErrorClass {
    err.class()
}

/// Alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, BridgeError>;
