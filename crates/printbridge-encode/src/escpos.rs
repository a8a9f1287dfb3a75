// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// ESC/POS command builder for thermal receipt printers.

use printbridge_core::error::{BridgeError, Result};
use tracing::warn;

use crate::raster::{Raster, rasterize};

const ESC: u8 = 0x1B;
const GS: u8 = 0x1D;

/// Text written in place of an image that could not be rasterized.
pub const IMAGE_ERROR_TEXT: &str = "[IMAGE ERROR]";

/// Horizontal justification (`ESC a n`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left = 0,
    Center = 1,
    Right = 2,
}

/// Accumulates ESC/POS byte sequences.
///
/// Unlike the label languages this is a binary stream; text is written as
/// its UTF-8 bytes and callers should stick to ASCII.
#[derive(Debug, Clone, Default)]
pub struct EscPosEncoder {
    buf: Vec<u8>,
}

impl EscPosEncoder {
    pub fn new() -> Self {
        Self {
            buf: Vec::with_capacity(4096),
        }
    }

    /// Reset the printer (`ESC @`).
    pub fn initialize(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x40]);
        self
    }

    pub fn text(&mut self, text: &str) -> &mut Self {
        self.buf.extend_from_slice(text.as_bytes());
        self
    }

    /// Text followed by a line feed.
    pub fn line(&mut self, text: &str) -> &mut Self {
        self.text(text);
        self.buf.push(b'\n');
        self
    }

    pub fn align(&mut self, align: Align) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x61, align as u8]);
        self
    }

    pub fn bold(&mut self, on: bool) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x45, u8::from(on)]);
        self
    }

    /// Print and feed `lines` lines (`ESC d n`).
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&[ESC, 0x64, lines]);
        self
    }

    /// Full cut (`GS V 0`); nothing is emitted when `on` is false.
    pub fn cut(&mut self, on: bool) -> &mut Self {
        if on {
            self.buf.extend_from_slice(&[GS, 0x56, 0x00]);
        }
        self
    }

    /// Buzzer (`ESC B n t`), `times` and `duration` clamped to 1..=9.
    pub fn beep(&mut self, on: bool, times: u8, duration: u8) -> &mut Self {
        if on {
            self.buf
                .extend_from_slice(&[ESC, 0x42, times.clamp(1, 9), duration.clamp(1, 9)]);
        }
        self
    }

    /// QR code via `GS ( k`: model 2, module `size` (1..=16), correction L.
    pub fn qrcode(&mut self, data: &str, size: u8) -> &mut Self {
        let size = size.clamp(1, 16);
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x04, 0x00, 0x31, 0x41, 0x32, 0x00]);
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x43, size]);
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x45, 0x30]);

        let bytes = data.as_bytes();
        let len = bytes.len() + 3;
        self.buf.extend_from_slice(&[
            GS,
            0x28,
            0x6B,
            (len & 0xFF) as u8,
            ((len >> 8) & 0xFF) as u8,
            0x31,
            0x50,
            0x30,
        ]);
        self.buf.extend_from_slice(bytes);
        self.buf
            .extend_from_slice(&[GS, 0x28, 0x6B, 0x03, 0x00, 0x31, 0x51, 0x30]);
        self
    }

    /// Rasterize an encoded image and print it `width_mm` wide.
    ///
    /// Decode or conversion failures never abort the buffer: the fallback
    /// line [`IMAGE_ERROR_TEXT`] is written instead.
    pub fn image(&mut self, bytes: &[u8], width_mm: f64, threshold: u8, dpi: u32) -> &mut Self {
        match rasterize(bytes, width_mm, threshold, dpi).and_then(|r| self.raster(&r).map(|_| ())) {
            Ok(()) => self,
            Err(err) => {
                warn!(error = %err, "Image could not be rasterized, printing placeholder");
                self.line(IMAGE_ERROR_TEXT)
            }
        }
    }

    /// Append a packed raster with its `GS v 0` header.
    pub fn raster(&mut self, raster: &Raster) -> Result<&mut Self> {
        let width_bytes = u16::try_from(raster.width_bytes)
            .map_err(|_| BridgeError::ImageError("raster too wide".into()))?;
        let height = u16::try_from(raster.height)
            .map_err(|_| BridgeError::ImageError("raster too tall".into()))?;
        let [xl, xh] = width_bytes.to_le_bytes();
        let [yl, yh] = height.to_le_bytes();
        self.buf
            .extend_from_slice(&[GS, 0x76, 0x30, 0x00, xl, xh, yl, yh]);
        self.buf.extend_from_slice(&raster.data);
        Ok(self)
    }

    pub fn render_bytes(&self) -> Vec<u8> {
        self.buf.clone()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
