// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge-encode: printer command languages.
//
// Builders that turn drawing operations into printer-native byte streams:
// ESC/POS for receipts (including raster images) and TSPL, ZPL and EPL for
// labels.  Encoders are pure; nothing here touches the network or disk.

pub mod escpos;
pub mod geometry;
pub mod label;
pub mod raster;

pub use escpos::{Align, EscPosEncoder};
pub use geometry::{Position, mm_to_dots, resolve_center};
pub use label::{AnyLabelEncoder, LabelEncoder, QrErrorCorrection, Rotation, Symbology};
pub use printbridge_core::settings::CommandLanguage;
