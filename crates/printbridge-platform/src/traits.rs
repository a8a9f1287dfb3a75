// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OS-facing ports consumed by the print services.
//
// Services only ever hold these as `Arc<dyn …>`, so tests can swap in fakes
// and the daemon can pick transports per platform.

use async_trait::async_trait;
use serde_json::Value;

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::{PrinterStatus, RawPrintResult};

/// Hands a finished byte stream to a named printer, bypassing any driver.
#[async_trait]
pub trait RawPrinter: Send + Sync {
    /// Send `bytes` to `printer_name`. `job_name` shows up in spooler queues
    /// and logs.
    async fn send(&self, printer_name: &str, bytes: &[u8], job_name: &str)
    -> Result<RawPrintResult>;
}

/// Reports whether a named printer is reachable.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    async fn query(&self, printer_name: &str) -> Result<PrinterStatus>;
}

/// Renders a named layout template with job data into an encoded bitmap
/// (PNG or anything else the `image` crate decodes).
#[async_trait]
pub trait TemplateRenderer: Send + Sync {
    async fn render(&self, template_id: &str, data: &Value) -> Result<Vec<u8>>;

    /// Whether `render` can succeed at all on this system.
    fn available(&self) -> bool {
        true
    }
}

/// Checks shared by every `RawPrinter`: a printer name and some bytes.
pub fn validate_request(printer_name: &str, bytes: &[u8]) -> Result<()> {
    if printer_name.trim().is_empty() {
        return Err(BridgeError::Validation("printer name is required".into()));
    }
    if bytes.is_empty() {
        return Err(BridgeError::Validation("print data is empty".into()));
    }
    Ok(())
}
