// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ZPL II (Zebra) label encoder.
//
// Every element is a field: `^FO` origin, a font or barcode command, then
// `^FD…^FS` data.  Font scales are passed straight through as dot sizes.

use printbridge_core::error::Result;
use printbridge_core::settings::CommandLanguage;

use super::{LabelEncoder, QR_MODULES, QrErrorCorrection, Rotation, Symbology};
use crate::geometry::{LabelCanvas, Position, char_count};

/// Assumed dot width of one barcode character.
const BARCODE_CHAR_WIDTH: i32 = 16;

#[derive(Debug, Clone)]
pub struct ZplEncoder {
    canvas: LabelCanvas,
}

impl ZplEncoder {
    pub fn new(dpi: u32) -> Self {
        Self {
            canvas: LabelCanvas::new(dpi),
        }
    }
}

fn orientation(rotation: Rotation) -> char {
    match rotation {
        Rotation::Deg0 => 'N',
        Rotation::Deg90 => 'R',
        Rotation::Deg180 => 'I',
        Rotation::Deg270 => 'B',
    }
}

fn symbology_code(symbology: Symbology) -> char {
    match symbology {
        Symbology::Code128 => 'C',
        Symbology::Code39 => '3',
        Symbology::Ean13 => 'E',
    }
}

#[allow(clippy::too_many_arguments)]
impl LabelEncoder for ZplEncoder {
    fn start(&mut self, width_mm: f64, height_mm: f64, _gap_mm: f64) -> &mut Self {
        self.canvas.resize(width_mm, height_mm);
        self.canvas.push("^XA");
        self
    }

    fn set_speed(&mut self, speed: u32) -> &mut Self {
        self.canvas.push(format!("^PR{speed}"));
        self
    }

    fn set_density(&mut self, density: i32) -> &mut Self {
        self.canvas.push(format!("^MD{density}"));
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
        let width = x_scale as i32 * char_count(content);
        let x = self.canvas.x(x, width);
        let y = self.canvas.y(y, y_scale as i32);
        self.canvas.push(format!("^FO{x},{y}"));
        self.canvas
            .push(format!("^A{font}{},{y_scale},{x_scale}", orientation(rotation)));
        self.canvas.push(format!("^FD{content}^FS"));
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
        _narrow: u32,
        _wide: u32,
        content: &str,
    ) -> &mut Self {
        let width = char_count(content) * BARCODE_CHAR_WIDTH;
        let x = self.canvas.x(x, width);
        let y = self.canvas.y(y, height as i32);
        self.canvas.push(format!("^FO{x},{y}"));
        self.canvas.push(format!(
            "^B{}{},{height},{},N,N",
            symbology_code(symbology),
            orientation(rotation),
            if human_readable { 'Y' } else { 'N' }
        ));
        self.canvas.push(format!("^FD{content}^FS"));
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
        self.canvas.push(format!("^FO{x},{y}"));
        self.canvas.push(format!("^BQN,2,{cell_size}"));
        self.canvas
            .push(format!("^FD{}A,{content}^FS", error_correction.letter()));
        Ok(self)
    }

    fn print(&mut self, copies: u32) -> &mut Self {
        self.canvas.push(format!("^PQ{copies}"));
        self.canvas.push("^XZ");
        self
    }

    fn render_bytes(&self) -> Vec<u8> {
        self.canvas.render("\n", false)
    }

    fn language(&self) -> CommandLanguage {
        CommandLanguage::Zpl
    }
}
