// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Typed per-printer settings.
//
// Settings are stored as a JSON document next to each printer, but every
// document is parsed into one of these structs (applying defaults) at the
// write boundary.  Numeric fields accept either JSON numbers or numeric
// strings, since older rows carried their defaults as strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::types::PrinterType;

/// Device resolution assumed when a settings document does not name one.
pub const DEFAULT_DPI: u32 = 203;

/// Printer command languages understood by the encoders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CommandLanguage {
    EscPos,
    Tspl,
    Zpl,
    Epl,
}

impl CommandLanguage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EscPos => "ESCPOS",
            Self::Tspl => "TSPL",
            Self::Zpl => "ZPL",
            Self::Epl => "EPL",
        }
    }

    /// Whether the language drives label printers (as opposed to receipts).
    pub fn is_label_language(&self) -> bool {
        !matches!(self, Self::EscPos)
    }
}

impl fmt::Display for CommandLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommandLanguage {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ESCPOS" | "ESC/POS" | "ESC_POS" => Ok(Self::EscPos),
            "TSPL" | "TSPL2" => Ok(Self::Tspl),
            "ZPL" | "ZPL2" => Ok(Self::Zpl),
            "EPL" | "EPL2" => Ok(Self::Epl),
            other => Err(BridgeError::Configuration(format!(
                "unsupported encoder type: {other}"
            ))),
        }
    }
}

impl TryFrom<String> for CommandLanguage {
    type Error = BridgeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<CommandLanguage> for String {
    fn from(value: CommandLanguage) -> Self {
        value.as_str().to_string()
    }
}

/// Settings of a label printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelSettings {
    /// Label width in millimetres.
    #[serde(deserialize_with = "lenient::f64")]
    pub label_width: f64,
    /// Label height in millimetres.
    #[serde(deserialize_with = "lenient::f64")]
    pub label_height: f64,
    /// Gap between labels in millimetres.
    #[serde(deserialize_with = "lenient::f64")]
    pub label_gap: f64,
    #[serde(deserialize_with = "lenient::i32")]
    pub print_density: i32,
    #[serde(deserialize_with = "lenient::u32")]
    pub print_speed: u32,
    pub encoder: CommandLanguage,
    #[serde(deserialize_with = "lenient::u32")]
    pub dpi: u32,
    /// Prefix printed before the price.
    pub currency: String,
}

impl Default for LabelSettings {
    fn default() -> Self {
        Self {
            label_width: 40.0,
            label_height: 20.0,
            label_gap: 2.0,
            print_density: 6,
            print_speed: 1,
            encoder: CommandLanguage::Tspl,
            dpi: DEFAULT_DPI,
            currency: "SR".into(),
        }
    }
}

impl LabelSettings {
    fn validate(&self) -> Result<()> {
        if !self.encoder.is_label_language() {
            return Err(BridgeError::Validation(format!(
                "{} cannot drive a label printer",
                self.encoder
            )));
        }
        size_mm("label_width", self.label_width, MAX_LABEL_MM)?;
        size_mm("label_height", self.label_height, MAX_LABEL_MM)?;
        if !(0.0..=MAX_LABEL_MM).contains(&self.label_gap) {
            return Err(BridgeError::Validation(format!(
                "label_gap must be within 0..={MAX_LABEL_MM} mm, got {}",
                self.label_gap
            )));
        }
        validate_dpi(self.dpi)
    }
}

/// Settings of a thermal receipt printer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiptSettings {
    /// Paper roll width in millimetres (58 or 80 in practice).
    #[serde(deserialize_with = "lenient::f64")]
    pub paper_size: f64,
    #[serde(deserialize_with = "lenient::i32")]
    pub print_density: i32,
    #[serde(deserialize_with = "lenient::u32")]
    pub print_speed: u32,
    pub cut: bool,
    pub beep: bool,
    #[serde(deserialize_with = "lenient::u32")]
    pub dpi: u32,
    /// Grayscale cut-off below which a pixel is printed.
    #[serde(deserialize_with = "lenient::u8")]
    pub threshold: u8,
    /// Printable width in millimetres; derived from the paper size when unset.
    #[serde(deserialize_with = "lenient::opt_f64", skip_serializing_if = "Option::is_none")]
    pub print_width: Option<f64>,
}

impl Default for ReceiptSettings {
    fn default() -> Self {
        Self {
            paper_size: 80.0,
            print_density: 6,
            print_speed: 1,
            cut: true,
            beep: true,
            dpi: DEFAULT_DPI,
            threshold: 160,
            print_width: None,
        }
    }
}

impl ReceiptSettings {
    /// Width of the printable area in millimetres.
    pub fn printable_width_mm(&self) -> f64 {
        if let Some(width) = self.print_width {
            return width;
        }
        match self.paper_size.round() as i64 {
            58 => 48.0,
            80 => 72.0,
            _ => self.paper_size,
        }
    }

    fn validate(&self) -> Result<()> {
        size_mm("paper_size", self.paper_size, MAX_RECEIPT_MM)?;
        if let Some(width) = self.print_width {
            size_mm("print_width", width, MAX_RECEIPT_MM)?;
            if width > self.paper_size {
                return Err(BridgeError::Validation(format!(
                    "print_width {width} exceeds paper_size {}",
                    self.paper_size
                )));
            }
        }
        validate_dpi(self.dpi)
    }
}

/// Validated settings document of one printer.
#[derive(Debug, Clone, PartialEq)]
pub enum PrinterSettings {
    Label(LabelSettings),
    Receipt(ReceiptSettings),
    /// Regular document printers carry no settings yet.
    A4,
}

impl PrinterSettings {
    /// Defaults written when a printer of the given type is created.
    pub fn defaults_for(printer_type: PrinterType) -> Self {
        match printer_type {
            PrinterType::Label => Self::Label(LabelSettings::default()),
            PrinterType::Receipt => Self::Receipt(ReceiptSettings::default()),
            PrinterType::A4 => Self::A4,
        }
    }

    /// Parse and validate a raw settings document for a printer type.
    ///
    /// Missing fields take their defaults; unknown fields are ignored.
    pub fn from_json(printer_type: PrinterType, value: &serde_json::Value) -> Result<Self> {
        let value = if value.is_null() {
            serde_json::Value::Object(Default::default())
        } else {
            value.clone()
        };

        let parsed = match printer_type {
            PrinterType::Label => {
                let settings: LabelSettings = serde_json::from_value(value)
                    .map_err(|e| BridgeError::Validation(format!("label settings: {e}")))?;
                settings.validate()?;
                Self::Label(settings)
            }
            PrinterType::Receipt => {
                let settings: ReceiptSettings = serde_json::from_value(value)
                    .map_err(|e| BridgeError::Validation(format!("receipt settings: {e}")))?;
                settings.validate()?;
                Self::Receipt(settings)
            }
            PrinterType::A4 => Self::A4,
        };
        Ok(parsed)
    }

    pub fn to_json(&self) -> serde_json::Value {
        let value = match self {
            Self::Label(settings) => serde_json::to_value(settings),
            Self::Receipt(settings) => serde_json::to_value(settings),
            Self::A4 => Ok(serde_json::Value::Object(Default::default())),
        };
        value.unwrap_or_default()
    }

    pub fn printer_type(&self) -> PrinterType {
        match self {
            Self::Label(_) => PrinterType::Label,
            Self::Receipt(_) => PrinterType::Receipt,
            Self::A4 => PrinterType::A4,
        }
    }
}

/// Widest receipt roll accepted, in millimetres.
pub const MAX_RECEIPT_MM: f64 = 120.0;
/// Largest label edge accepted, in millimetres.
pub const MAX_LABEL_MM: f64 = 300.0;

fn size_mm(field: &str, value: f64, max: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 && value <= max {
        Ok(())
    } else {
        Err(BridgeError::Validation(format!(
            "{field} must be within 0..={max} mm, got {value}"
        )))
    }
}

fn validate_dpi(dpi: u32) -> Result<()> {
    if (100..=1200).contains(&dpi) {
        Ok(())
    } else {
        Err(BridgeError::Validation(format!("dpi {dpi} out of range 100..=1200")))
    }
}

/// Deserializers accepting a JSON number or a string holding one.
pub(crate) mod lenient {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrText {
        Number(f64),
        Text(String),
    }

    fn number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match NumberOrText::deserialize(deserializer)? {
            NumberOrText::Number(n) => Ok(n),
            NumberOrText::Text(s) => s
                .trim()
                .parse::<f64>()
                .map_err(|_| D::Error::custom(format!("expected a number, got {s:?}"))),
        }
    }

    fn integer<'de, D: Deserializer<'de>>(
        deserializer: D,
        min: f64,
        max: f64,
    ) -> Result<i64, D::Error> {
        let n = number(deserializer)?;
        if n.fract() != 0.0 || n < min || n > max {
            return Err(D::Error::custom(format!(
                "expected an integer in {min}..={max}, got {n}"
            )));
        }
        Ok(n as i64)
    }

    pub fn f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        number(deserializer)
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        number(deserializer).map(Some)
    }

    pub fn i32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i32, D::Error> {
        integer(deserializer, i32::MIN as f64, i32::MAX as f64).map(|n| n as i32)
    }

    pub fn u32<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
        integer(deserializer, 0.0, u32::MAX as f64).map(|n| n as u32)
    }

    pub fn u8<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
        integer(deserializer, 0.0, u8::MAX as f64).map(|n| n as u8)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn label_defaults_fill_missing_fields() {
        let parsed = PrinterSettings::from_json(PrinterType::Label, &json!({})).unwrap();
        assert_eq!(parsed, PrinterSettings::Label(LabelSettings::default()));
    }

    #[test]
    fn string_numbers_are_accepted() {
        let parsed = PrinterSettings::from_json(
            PrinterType::Label,
            &json!({ "label_width": "50", "label_height": "30", "print_density": "8", "encoder": "zpl" }),
        )
        .unwrap();
        let PrinterSettings::Label(settings) = parsed else {
            panic!("expected label settings");
        };
        assert_eq!(settings.label_width, 50.0);
        assert_eq!(settings.label_height, 30.0);
        assert_eq!(settings.print_density, 8);
        assert_eq!(settings.encoder, CommandLanguage::Zpl);
    }

    #[test]
    fn unknown_encoder_is_rejected() {
        let err = PrinterSettings::from_json(PrinterType::Label, &json!({ "encoder": "DPL" }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert!(err.to_string().contains("DPL"));
    }

    #[test]
    fn escpos_cannot_drive_labels() {
        let err = PrinterSettings::from_json(PrinterType::Label, &json!({ "encoder": "ESCPOS" }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
    }

    #[test]
    fn zero_width_label_is_rejected() {
        assert!(PrinterSettings::from_json(PrinterType::Label, &json!({ "label_width": 0 })).is_err());
    }

    #[test]
    fn oversized_paper_is_rejected() {
        for raw in [json!({ "paper_size": 1e9 }), json!({ "paper_size": "121" })] {
            let err = PrinterSettings::from_json(PrinterType::Receipt, &raw).unwrap_err();
            assert!(matches!(err, BridgeError::Validation(_)));
        }
        let err = PrinterSettings::from_json(PrinterType::Receipt, &json!({ "print_width": 500 }))
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert!(PrinterSettings::from_json(PrinterType::Receipt, &json!({ "paper_size": 112 })).is_ok());
    }

    #[test]
    fn oversized_labels_are_rejected() {
        for raw in [
            json!({ "label_width": 301 }),
            json!({ "label_height": 1e12 }),
            json!({ "label_gap": 1000 }),
        ] {
            let err = PrinterSettings::from_json(PrinterType::Label, &raw).unwrap_err();
            assert!(matches!(err, BridgeError::Validation(_)));
        }
        assert!(PrinterSettings::from_json(PrinterType::Label, &json!({ "label_width": 300 })).is_ok());
    }

    #[test]
    fn receipt_printable_width_follows_paper() {
        let mut settings = ReceiptSettings::default();
        assert_eq!(settings.printable_width_mm(), 72.0);
        settings.paper_size = 58.0;
        assert_eq!(settings.printable_width_mm(), 48.0);
        settings.print_width = Some(50.0);
        assert_eq!(settings.printable_width_mm(), 50.0);
    }

    #[test]
    fn receipt_settings_roundtrip_through_json() {
        let original = PrinterSettings::defaults_for(PrinterType::Receipt);
        let reparsed = PrinterSettings::from_json(PrinterType::Receipt, &original.to_json()).unwrap();
        assert_eq!(original, reparsed);
    }

    #[test]
    fn language_keys_parse() {
        assert_eq!("esc/pos".parse::<CommandLanguage>().unwrap(), CommandLanguage::EscPos);
        assert_eq!("TSPL".parse::<CommandLanguage>().unwrap(), CommandLanguage::Tspl);
        assert!(matches!(
            "PCL".parse::<CommandLanguage>(),
            Err(BridgeError::Configuration(_))
        ));
    }
}
