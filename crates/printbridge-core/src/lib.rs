// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printbridge Core: core types, typed printer settings, payload schemas and error
// definitions shared across all crates.

pub mod config;
pub mod error;
pub mod payload;
pub mod settings;
pub mod types;

pub use config::AppConfig;
pub use error::BridgeError;
pub use types::*;
