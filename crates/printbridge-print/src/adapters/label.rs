// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Product label adapter.
//
// Lays out brand, product name, Code128 barcode with caption, price and
// expiry on one label, in whichever label language the printer speaks.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::payload::LabelData;
use printbridge_core::settings::{LabelSettings, PrinterSettings};
use printbridge_core::types::{PrinterWithSettings, RawPrintResult};
use printbridge_encode::{AnyLabelEncoder, LabelEncoder, Position, Rotation, Symbology, mm_to_dots};
use printbridge_platform::RawPrinter;

const FONT: &str = "0";

/// `floor(dots * fraction)`.
fn fraction(dots: i32, fraction: f64) -> i32 {
    (f64::from(dots) * fraction).floor() as i32
}

/// Encode one product label with the printer's settings.
pub fn encode_label(settings: &LabelSettings, data: &LabelData) -> Result<Vec<u8>> {
    let mut encoder = AnyLabelEncoder::for_language(settings.encoder, settings.dpi)?;

    let width = mm_to_dots(settings.label_width, settings.dpi);
    let height = mm_to_dots(settings.label_height, settings.dpi);
    let barcode_height = fraction(height, 0.3).max(1) as u32;
    let price = format!("{}: {:.2}", settings.currency, data.price);

    encoder
        .start(settings.label_width, settings.label_height, settings.label_gap)
        .set_speed(settings.print_speed)
        .set_density(settings.print_density)
        .text(
            Position::Center,
            Position::Dots(fraction(height, 0.1)),
            FONT,
            Rotation::Deg0,
            1,
            1,
            &data.brand,
        )
        .text(
            Position::Center,
            Position::Dots(fraction(height, 0.2)),
            FONT,
            Rotation::Deg0,
            1,
            1,
            &data.product_name,
        )
        .barcode(
            Position::Center,
            Position::Dots(fraction(height, 0.3)),
            Symbology::Code128,
            barcode_height,
            false,
            Rotation::Deg0,
            2,
            0,
            &data.barcode,
        )
        .text(
            Position::Center,
            Position::Dots(fraction(height, 0.65)),
            FONT,
            Rotation::Deg0,
            1,
            1,
            &data.barcode,
        )
        .text(
            Position::Dots(fraction(width, 0.03)),
            Position::Dots(fraction(height, 0.78)),
            FONT,
            Rotation::Deg0,
            1,
            1,
            &price,
        )
        .text(
            Position::Dots(fraction(width, 0.68)),
            Position::Dots(fraction(height, 0.78)),
            FONT,
            Rotation::Deg0,
            1,
            1,
            &data.expiry,
        )
        .print(data.copies);

    Ok(encoder.render_bytes())
}

/// Prints `LabelData` payloads on label printers.
#[derive(Clone)]
pub struct LabelAdapter {
    transport: Arc<dyn RawPrinter>,
}

impl LabelAdapter {
    pub fn new(transport: Arc<dyn RawPrinter>) -> Self {
        Self { transport }
    }

    #[instrument(skip(self, target, data), fields(printer = %target.printer.name))]
    pub async fn print(
        &self,
        target: &PrinterWithSettings,
        job_name: &str,
        data: &Value,
    ) -> Result<RawPrintResult> {
        let PrinterSettings::Label(settings) = &target.settings else {
            return Err(BridgeError::Validation(format!(
                "printer {} has {} settings, not label settings",
                target.printer.name,
                target.settings.printer_type()
            )));
        };
        let label = LabelData::from_json(data)?;
        let bytes = encode_label(settings, &label)?;

        let result = self
            .transport
            .send(&target.printer.name, &bytes, job_name)
            .await?;
        info!(
            language = %settings.encoder,
            copies = label.copies,
            bytes = result.bytes_written,
            "Label sent"
        );
        Ok(result)
    }
}
