// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Template renderer used when no layout engine is available.
//
// Receipt layout is rendered by an external engine; without one, receipt
// jobs fail with `PlatformUnavailable` while label jobs keep working.

use async_trait::async_trait;
use serde_json::Value;

use printbridge_core::error::{BridgeError, Result};

use crate::traits::TemplateRenderer;

/// Renderer that reports the primitive as unavailable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableRenderer;

#[async_trait]
impl TemplateRenderer for UnavailableRenderer {
    async fn render(&self, template_id: &str, _data: &Value) -> Result<Vec<u8>> {
        tracing::warn!(template = template_id, "Template rendering requested but no renderer is installed");
        Err(BridgeError::PlatformUnavailable(format!(
            "rendering template `{template_id}`"
        )))
    }

    fn available(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn render_is_unavailable() {
        let err = UnavailableRenderer
            .render("receipt", &Value::Null)
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::PlatformUnavailable(_)));
        assert!(err.to_string().contains("receipt"));
        assert!(!UnavailableRenderer.available());
    }
}
