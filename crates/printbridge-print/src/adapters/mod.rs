// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job adapters: payload validation, layout and hand-off to the transport.

pub mod label;
pub mod receipt;

use std::sync::Arc;

use serde_json::Value;

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::payload::{LabelData, ReceiptData};
use printbridge_core::types::{PrinterType, PrinterWithSettings, RawPrintResult};
use printbridge_platform::PlatformPorts;

pub use label::{LabelAdapter, encode_label};
pub use receipt::{ReceiptAdapter, encode_receipt};

/// Both adapters, dispatched by printer type.
#[derive(Clone)]
pub struct Adapters {
    pub label: LabelAdapter,
    pub receipt: ReceiptAdapter,
}

impl Adapters {
    pub fn new(ports: &PlatformPorts) -> Self {
        Self {
            label: LabelAdapter::new(Arc::clone(&ports.printer)),
            receipt: ReceiptAdapter::new(Arc::clone(&ports.printer), Arc::clone(&ports.renderer)),
        }
    }

    /// Print `data` on `target` with the adapter for its printer type.
    pub async fn print(
        &self,
        target: &PrinterWithSettings,
        job_name: &str,
        data: &Value,
    ) -> Result<RawPrintResult> {
        match target.printer.printer_type {
            PrinterType::Label => self.label.print(target, job_name, data).await,
            PrinterType::Receipt => self.receipt.print(target, job_name, data).await,
            PrinterType::A4 => Err(BridgeError::Validation(
                "printing on a4 printers is not supported".into(),
            )),
        }
    }
}

/// Sample payload for the printer test action, if the type has one.
pub fn test_page(printer_type: PrinterType) -> Option<Value> {
    match printer_type {
        PrinterType::Label => serde_json::to_value(LabelData::sample()).ok(),
        PrinterType::Receipt => serde_json::to_value(ReceiptData::sample()).ok(),
        PrinterType::A4 => None,
    }
}
