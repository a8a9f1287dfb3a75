// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// EPL2 (Eltron) label encoder. EPL has no QR command.

use printbridge_core::settings::CommandLanguage;

use super::{LabelEncoder, Rotation, Symbology};
use crate::geometry::{LabelCanvas, Position, char_count};

const GLYPH_WIDTH: i32 = 8;
const GLYPH_HEIGHT: i32 = 12;
const BARCODE_CHAR_WIDTH: i32 = 16;

#[derive(Debug, Clone)]
pub struct EplEncoder {
    canvas: LabelCanvas,
}

impl EplEncoder {
    pub fn new(dpi: u32) -> Self {
        Self {
            canvas: LabelCanvas::new(dpi),
        }
    }
}

fn symbology_code(symbology: Symbology) -> &'static str {
    match symbology {
        Symbology::Code128 => "1",
        Symbology::Code39 => "3",
        Symbology::Ean13 => "E30",
    }
}

fn quote(content: &str) -> String {
    content.replace('\\', "\\\\").replace('"', "\\\"")
}

#[allow(clippy::too_many_arguments)]
impl LabelEncoder for EplEncoder {
    /// Clears the image buffer and sets the label width. EPL sizes the
    /// label length from the gap sensor, so the gap is not emitted.
    fn start(&mut self, width_mm: f64, height_mm: f64, _gap_mm: f64) -> &mut Self {
        self.canvas.resize(width_mm, height_mm);
        self.canvas.push("N");
        self.canvas.push(format!("q{}", self.canvas.width));
        self
    }

    fn set_speed(&mut self, speed: u32) -> &mut Self {
        self.canvas.push(format!("S{speed}"));
        self
    }

    fn set_density(&mut self, density: i32) -> &mut Self {
        self.canvas.push(format!("D{density}"));
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
            "A{x},{y},{},{font},{x_scale},{y_scale},N,\"{}\"",
            rotation.quarter_turns(),
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
        let width = char_count(content) * BARCODE_CHAR_WIDTH;
        let x = self.canvas.x(x, width);
        let y = self.canvas.y(y, height as i32);
        self.canvas.push(format!(
            "B{x},{y},{},{},{narrow},{wide},{height},{},\"{}\"",
            rotation.quarter_turns(),
            symbology_code(symbology),
            if human_readable { 'B' } else { 'N' },
            quote(content)
        ));
        self
    }

    fn print(&mut self, copies: u32) -> &mut Self {
        self.canvas.push(format!("P{copies}"));
        self
    }

    fn render_bytes(&self) -> Vec<u8> {
        self.canvas.render("\n", false)
    }

    fn language(&self) -> CommandLanguage {
        CommandLanguage::Epl
    }
}
