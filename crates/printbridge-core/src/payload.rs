// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Job payload schemas.
//
// A print job carries an opaque JSON document; adapters parse it into one
// of these structs before any bytes are encoded.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Product label: brand, name, barcode, price and expiry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelData {
    pub brand: String,
    pub product_name: String,
    pub barcode: String,
    pub price: f64,
    pub expiry: String,
    #[serde(default = "one", deserialize_with = "copies")]
    pub copies: u32,
}

impl LabelData {
    pub fn from_json(value: &Value) -> Result<Self> {
        let data: Self = serde_json::from_value(value.clone())
            .map_err(|e| BridgeError::Validation(format!("label payload: {e}")))?;
        if data.copies == 0 {
            return Err(BridgeError::Validation("label payload: copies must be at least 1".into()));
        }
        if !data.price.is_finite() {
            return Err(BridgeError::Validation("label payload: price must be finite".into()));
        }
        Ok(data)
    }

    /// Sample printed by the printer test action.
    pub fn sample() -> Self {
        Self {
            brand: "Test Brand".into(),
            product_name: "Test Product".into(),
            barcode: "1234567890".into(),
            price: 10.0,
            expiry: "2023-06-01".into(),
            copies: 5,
        }
    }
}

/// One line of a receipt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptItem {
    pub name: String,
    pub quantity: f64,
    pub unit_price: f64,
    pub total_price: f64,
}

/// Sales receipt handed to the template renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceiptData {
    pub brand: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub date: String,
    pub items: Vec<ReceiptItem>,
    pub subtotal: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tax: Option<f64>,
    pub total: f64,
    pub client_id: String,
}

impl ReceiptData {
    pub fn from_json(value: &Value) -> Result<Self> {
        let data: Self = serde_json::from_value(value.clone())
            .map_err(|e| BridgeError::Validation(format!("receipt payload: {e}")))?;
        non_negative("subtotal", data.subtotal)?;
        non_negative("total", data.total)?;
        if let Some(tax) = data.tax {
            non_negative("tax", tax)?;
        }
        Ok(data)
    }

    pub fn sample() -> Self {
        Self {
            brand: "Test Brand".into(),
            address: Some("Test Address".into()),
            phone: Some("123-456-7890".into()),
            date: "2023-06-01".into(),
            items: vec![ReceiptItem {
                name: "Test Item".into(),
                quantity: 10.0,
                unit_price: 10.0,
                total_price: 100.0,
            }],
            subtotal: 100.0,
            tax: Some(10.0),
            total: 110.0,
            client_id: "1234".into(),
        }
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(BridgeError::Validation(format!(
            "receipt payload: {field} must be non-negative, got {value}"
        )))
    }
}

fn one() -> u32 {
    1
}

fn copies<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Number(n) => Ok(n),
        Raw::Text(s) => s
            .trim()
            .parse::<u32>()
            .map_err(|_| D::Error::custom(format!("copies must be a whole number, got {s:?}"))),
    }
}
