// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// TSPL (TSC) label encoder.

use printbridge_core::error::Result;
use printbridge_core::settings::CommandLanguage;

use super::{LabelEncoder, QR_MODULES, QrErrorCorrection, Rotation, Symbology};
use crate::geometry::{LabelCanvas, Position, char_count};

/// Width of one glyph of the built-in font at scale 1.
const GLYPH_WIDTH: i32 = 8;
/// Height of one glyph of the built-in font at scale 1.
const GLYPH_HEIGHT: i32 = 12;
/// Approximate modules per Code 128 character.
const MODULES_PER_CHAR: i32 = 9;

#[derive(Debug, Clone)]
pub struct TsplEncoder {
    canvas: LabelCanvas,
}

impl TsplEncoder {
    pub fn new(dpi: u32) -> Self {
        Self {
            canvas: LabelCanvas::new(dpi),
        }
    }
}

fn symbology_code(symbology: Symbology) -> &'static str {
    match symbology {
        Symbology::Code128 => "128",
        Symbology::Code39 => "39",
        Symbology::Ean13 => "EAN13",
    }
}

/// TSPL escapes a double quote inside a string as `\["]`.
fn quote(content: &str) -> String {
    content.replace('"', "\\[\"]")
}

#[allow(clippy::too_many_arguments)]
impl LabelEncoder for TsplEncoder {
    fn start(&mut self, width_mm: f64, height_mm: f64, gap_mm: f64) -> &mut Self {
        self.canvas.resize(width_mm, height_mm);
        self.canvas.push(format!("SIZE {width_mm} mm, {height_mm} mm"));
        self.canvas.push(format!("GAP {gap_mm} mm, 0"));
        self.canvas.push("DENSITY 8");
        self.canvas.push("DIRECTION 1");
        self.canvas.push("REFERENCE 0,0");
        self.canvas.push("CLS");
        self
    }

    fn set_speed(&mut self, speed: u32) -> &mut Self {
        self.canvas.push(format!("SPEED {speed}"));
        self
    }

    fn set_density(&mut self, density: i32) -> &mut Self {
        self.canvas.push(format!("DENSITY {density}"));
        self
    }

    fn text(
        &mut self,
        x: Position,
        y: Position,
        font: &str,
        rotation: Rotation,
        x_scale: u32,
        y_scale: u32,
        content: &str,
    ) -> &mut Self {
        let width = GLYPH_WIDTH * x_scale as i32 * char_count(content);
        let height = GLYPH_HEIGHT * y_scale as i32;
        let x = self.canvas.x(x, width);
        let y = self.canvas.y(y, height);
        self.canvas.push(format!(
            "TEXT {x},{y},\"{font}\",{},{x_scale},{y_scale},\"{}\"",
            rotation.degrees(),
            quote(content)
        ));
        self
    }

    fn barcode(
        &mut self,
        x: Position,
        y: Position,
        symbology: Symbology,
        height: u32,
        human_readable: bool,
        rotation: Rotation,
        narrow: u32,
        wide: u32,
        content: &str,
    ) -> &mut Self {
        let width = char_count(content) * MODULES_PER_CHAR * narrow as i32;
        let x = self.canvas.x(x, width);
        let y = self.canvas.y(y, height as i32);
        self.canvas.push(format!(
            "BARCODE {x},{y},\"{}\",{height},{},{},{narrow},{wide},\"{}\"",
            symbology_code(symbology),
            u8::from(human_readable),
            rotation.degrees(),
            quote(content)
        ));
        self
    }

    fn qrcode(
        &mut self,
        x: Position,
        y: Position,
        error_correction: QrErrorCorrection,
        cell_size: u32,
        content: &str,
    ) -> Result<&mut Self> {
        let side = QR_MODULES * cell_size as i32;
        let x = self.canvas.x(x, side);
        let y = self.canvas.y(y, side);
        self.canvas.push(format!(
            "QRCODE {x},{y},{},{cell_size},A,0,\"{}\"",
            error_correction.letter(),
            quote(content)
        ));
        Ok(self)
    }

    fn print(&mut self, copies: u32) -> &mut Self {
        self.canvas.push(format!("PRINT {copies}"));
        self
    }

    fn render_bytes(&self) -> Vec<u8> {
        self.canvas.render("\r\n", true)
    }

    fn language(&self) -> CommandLanguage {
        CommandLanguage::Tspl
    }
}
