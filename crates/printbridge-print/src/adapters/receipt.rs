// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Receipt adapter: template bitmap in, ESC/POS raster out.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::payload::ReceiptData;
use printbridge_core::settings::{PrinterSettings, ReceiptSettings};
use printbridge_core::types::{PrinterWithSettings, RawPrintResult};
use printbridge_encode::EscPosEncoder;
use printbridge_platform::{RawPrinter, TemplateRenderer};

/// Template the renderer is asked for.
pub const RECEIPT_TEMPLATE: &str = "receipt";

const FEED_LINES: u8 = 6;
const BEEP_TIMES: u8 = 3;
const BEEP_DURATION: u8 = 6;

/// Wrap a rendered receipt bitmap in the ESC/POS print sequence.
pub fn encode_receipt(settings: &ReceiptSettings, bitmap: &[u8]) -> Vec<u8> {
    let mut encoder = EscPosEncoder::new();
    encoder
        .initialize()
        .image(
            bitmap,
            settings.printable_width_mm(),
            settings.threshold,
            settings.dpi,
        )
        .feed(FEED_LINES)
        .cut(settings.cut)
        .beep(settings.beep, BEEP_TIMES, BEEP_DURATION);
    encoder.render_bytes()
}

/// Prints `ReceiptData` payloads on thermal receipt printers.
#[derive(Clone)]
pub struct ReceiptAdapter {
    transport: Arc<dyn RawPrinter>,
    renderer: Arc<dyn TemplateRenderer>,
}

impl ReceiptAdapter {
    pub fn new(transport: Arc<dyn RawPrinter>, renderer: Arc<dyn TemplateRenderer>) -> Self {
        Self {
            transport,
            renderer,
        }
    }

    #[instrument(skip(self, target, data), fields(printer = %target.printer.name))]
    pub async fn print(
        &self,
        target: &PrinterWithSettings,
        job_name: &str,
        data: &Value,
    ) -> Result<RawPrintResult> {
        let PrinterSettings::Receipt(settings) = &target.settings else {
            return Err(BridgeError::Validation(format!(
                "printer {} has {} settings, not receipt settings",
                target.printer.name,
                target.settings.printer_type()
            )));
        };
        let receipt = ReceiptData::from_json(data)?;

        let bitmap = self
            .renderer
            .render(RECEIPT_TEMPLATE, &serde_json::to_value(&receipt)?)
            .await?;
        let bytes = encode_receipt(settings, &bitmap);

        let result = self
            .transport
            .send(&target.printer.name, &bytes, job_name)
            .await?;
        info!(
            items = receipt.items.len(),
            bytes = result.bytes_written,
            "Receipt sent"
        );
        Ok(result)
    }
}
