// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Label geometry: millimetre to dot conversion and centring.

use std::fmt;

/// Label size in dots assumed until `start` has been called.
pub const DEFAULT_LABEL_DOTS: (i32, i32) = (800, 600);

/// Millimetres per inch.
const MM_PER_INCH: f64 = 25.4;

/// A coordinate on one axis of the label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Absolute offset in device dots.
    Dots(i32),
    /// Centre the element on this axis.
    Center,
}

impl From<i32> for Position {
    fn from(dots: i32) -> Self {
        Self::Dots(dots)
    }
}

/// Convert a physical length to device dots, rounding down.
pub fn mm_to_dots(mm: f64, dpi: u32) -> i32 {
    (mm * f64::from(dpi) / MM_PER_INCH).floor() as i32
}

/// Offset that centres an element of `extent` dots inside `dimension` dots.
///
/// Elements larger than the label produce a negative offset.
pub fn resolve_center(dimension: i32, extent: i32) -> i32 {
    (dimension - extent).div_euclid(2)
}

/// Dot dimensions of the label being built and the command lines so far.
///
/// Shared by the line-oriented label encoders.
#[derive(Debug, Clone)]
pub(crate) struct LabelCanvas {
    pub dpi: u32,
    pub width: i32,
    pub height: i32,
    pub lines: Vec<String>,
}

impl LabelCanvas {
    pub fn new(dpi: u32) -> Self {
        Self {
            dpi,
            width: DEFAULT_LABEL_DOTS.0,
            height: DEFAULT_LABEL_DOTS.1,
            lines: Vec::new(),
        }
    }

    /// Adopt the physical label size for subsequent centring.
    pub fn resize(&mut self, width_mm: f64, height_mm: f64) {
        self.width = mm_to_dots(width_mm, self.dpi);
        self.height = mm_to_dots(height_mm, self.dpi);
    }

    pub fn x(&self, position: Position, extent: i32) -> i32 {
        match position {
            Position::Dots(dots) => dots,
            Position::Center => resolve_center(self.width, extent),
        }
    }

    pub fn y(&self, position: Position, extent: i32) -> i32 {
        match position {
            Position::Dots(dots) => dots,
            Position::Center => resolve_center(self.height, extent),
        }
    }

    pub fn push(&mut self, line: impl fmt::Display) {
        self.lines.push(line.to_string());
    }

    /// Join the lines with `terminator`, optionally terminating the last one too.
    pub fn render(&self, terminator: &str, trailing: bool) -> Vec<u8> {
        let mut out = self.lines.join(terminator);
        if trailing {
            out.push_str(terminator);
        }
        out.into_bytes()
    }
}

/// Character count used for extents; labels are ASCII in practice.
pub(crate) fn char_count(content: &str) -> i32 {
    content.chars().count() as i32
}
