// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label command languages.
//
// TSPL, ZPL and EPL are line-oriented ASCII languages.  Every encoder here
// implements the same builder contract so the label adapter can lay out one
// template and pick the language from the printer's settings.

pub mod epl;
pub mod tspl;
pub mod zpl;

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::settings::CommandLanguage;

use crate::geometry::Position;

pub use epl::EplEncoder;
pub use tspl::TsplEncoder;
pub use zpl::ZplEncoder;

/// Linear barcode symbologies supported on every label language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Symbology {
    Code128,
    Code39,
    Ean13,
}

/// Clockwise rotation of an element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn degrees(&self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    /// Quarter turns, as EPL expects.
    pub fn quarter_turns(&self) -> u8 {
        (self.degrees() / 90) as u8
    }
}

/// QR error-correction level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QrErrorCorrection {
    #[default]
    Low,
    Medium,
    Quartile,
    High,
}

impl QrErrorCorrection {
    pub fn letter(&self) -> char {
        match self {
            Self::Low => 'L',
            Self::Medium => 'M',
            Self::Quartile => 'Q',
            Self::High => 'H',
        }
    }
}

/// Modules per side assumed for QR extents (version 1 symbol).
pub const QR_MODULES: i32 = 21;

/// Builder contract shared by the label encoders.
///
/// Calls are recorded in order; `render_bytes` produces the final buffer and
/// can be called any number of times.
#[allow(clippy::too_many_arguments)]
pub trait LabelEncoder {
    /// Begin a label of the given physical size.
    fn start(&mut self, width_mm: f64, height_mm: f64, gap_mm: f64) -> &mut Self;

    fn set_speed(&mut self, speed: u32) -> &mut Self;

    fn set_density(&mut self, density: i32) -> &mut Self;

    fn text(
        &mut self,
        x: Position,
        y: Position,
        font: &str,
        rotation: Rotation,
        x_scale: u32,
        y_scale: u32,
        content: &str,
    ) -> &mut Self;

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
    ) -> &mut Self;

    /// QR symbol; languages without QR support return an error.
    fn qrcode(
        &mut self,
        _x: Position,
        _y: Position,
        _error_correction: QrErrorCorrection,
        _cell_size: u32,
        _content: &str,
    ) -> Result<&mut Self> {
        Err(BridgeError::Encode(format!(
            "{} does not support QR codes",
            self.language()
        )))
    }

    fn print(&mut self, copies: u32) -> &mut Self;

    fn render_bytes(&self) -> Vec<u8>;

    fn language(&self) -> CommandLanguage;
}

/// A label encoder chosen at runtime from the printer's settings.
#[derive(Debug, Clone)]
pub enum AnyLabelEncoder {
    Tspl(TsplEncoder),
    Zpl(ZplEncoder),
    Epl(EplEncoder),
}

impl AnyLabelEncoder {
    /// Build the encoder for `language`. ESC/POS is not a label language.
    pub fn for_language(language: CommandLanguage, dpi: u32) -> Result<Self> {
        match language {
            CommandLanguage::Tspl => Ok(Self::Tspl(TsplEncoder::new(dpi))),
            CommandLanguage::Zpl => Ok(Self::Zpl(ZplEncoder::new(dpi))),
            CommandLanguage::Epl => Ok(Self::Epl(EplEncoder::new(dpi))),
            CommandLanguage::EscPos => Err(BridgeError::Configuration(
                "ESCPOS is not a label command language".into(),
            )),
        }
    }

    /// Parse a language key and build its encoder.
    pub fn from_key(key: &str, dpi: u32) -> Result<Self> {
        Self::for_language(key.parse()?, dpi)
    }
}

macro_rules! dispatch {
    ($self:ident, $enc:ident => $call:expr) => {
        match &mut *$self {
            AnyLabelEncoder::Tspl($enc) => {
                $call;
            }
            AnyLabelEncoder::Zpl($enc) => {
                $call;
            }
            AnyLabelEncoder::Epl($enc) => {
                $call;
            }
        }
    };
}

#[allow(clippy::too_many_arguments)]
impl LabelEncoder for AnyLabelEncoder {
    fn start(&mut self, width_mm: f64, height_mm: f64, gap_mm: f64) -> &mut Self {
        dispatch!(self, e => e.start(width_mm, height_mm, gap_mm));
        self
    }

    fn set_speed(&mut self, speed: u32) -> &mut Self {
        dispatch!(self, e => e.set_speed(speed));
        self
    }

    fn set_density(&mut self, density: i32) -> &mut Self {
        dispatch!(self, e => e.set_density(density));
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
        dispatch!(self, e => e.text(x, y, font, rotation, x_scale, y_scale, content));
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
        dispatch!(self, e => e.barcode(
            x, y, symbology, height, human_readable, rotation, narrow, wide, content
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
        dispatch!(self, e => e.qrcode(x, y, error_correction, cell_size, content)?);
        Ok(self)
    }

    fn print(&mut self, copies: u32) -> &mut Self {
        dispatch!(self, e => e.print(copies));
        self
    }

    fn render_bytes(&self) -> Vec<u8> {
        match self {
            Self::Tspl(e) => e.render_bytes(),
            Self::Zpl(e) => e.render_bytes(),
            Self::Epl(e) => e.render_bytes(),
        }
    }

    fn language(&self) -> CommandLanguage {
        match self {
            Self::Tspl(e) => e.language(),
            Self::Zpl(e) => e.language(),
            Self::Epl(e) => e.language(),
        }
    }
}
