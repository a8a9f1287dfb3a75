// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printer management: registration, typed settings and the test page.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::settings::{DEFAULT_DPI, PrinterSettings};
use printbridge_core::types::{
    NewPrintJob, PrintOutcome, Printer, PrinterId, PrinterType, PrinterUpdate, PrinterWithSettings,
};

use crate::adapters::test_page;
use crate::jobs::JobService;
use crate::store::Store;

pub struct PrinterService {
    store: Arc<dyn Store>,
    jobs: Arc<JobService>,
    default_dpi: u32,
}

impl PrinterService {
    pub fn new(store: Arc<dyn Store>, jobs: Arc<JobService>) -> Self {
        Self {
            store,
            jobs,
            default_dpi: DEFAULT_DPI,
        }
    }

    /// DPI stored in the settings of newly created printers.
    pub fn with_default_dpi(mut self, dpi: u32) -> Self {
        self.default_dpi = dpi;
        self
    }

    fn default_settings(&self, printer_type: PrinterType) -> PrinterSettings {
        let mut settings = PrinterSettings::defaults_for(printer_type);
        match &mut settings {
            PrinterSettings::Label(label) => label.dpi = self.default_dpi,
            PrinterSettings::Receipt(receipt) => receipt.dpi = self.default_dpi,
            PrinterSettings::A4 => {}
        }
        settings
    }

    /// Register a printer with the default settings of its type.
    #[instrument(skip(self))]
    pub fn create_printer(
        &self,
        name: &str,
        printer_type: PrinterType,
        description: Option<&str>,
    ) -> Result<Printer> {
        self.store.create_printer(
            name,
            printer_type,
            description,
            &self.default_settings(printer_type),
        )
    }

    pub fn list_printers(&self) -> Result<Vec<Printer>> {
        self.store.list_printers()
    }

    pub fn get_printer(&self, id: PrinterId) -> Result<PrinterWithSettings> {
        self.store
            .get_printer_with_settings(id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {id}")))
    }

    pub fn update_printer(&self, id: PrinterId, update: &PrinterUpdate) -> Result<Printer> {
        self.store.update_printer(id, update)
    }

    /// Validate a raw settings document against the printer's type and
    /// replace the stored settings with it. Missing fields take defaults.
    #[instrument(skip(self, raw))]
    pub fn update_printer_settings(&self, id: PrinterId, raw: &Value) -> Result<PrinterSettings> {
        let printer = self
            .store
            .get_printer(id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {id}")))?;
        let settings = PrinterSettings::from_json(printer.printer_type, raw)?;
        self.store.upsert_printer_settings(id, &settings)?;
        info!(printer = %printer.name, "Printer settings updated");
        Ok(settings)
    }

    /// Delete a printer. Refused while jobs reference it.
    pub fn delete_printer(&self, id: PrinterId) -> Result<()> {
        self.store.delete_printer(id)
    }

    /// Print the built-in sample for the printer's type.
    #[instrument(skip(self))]
    pub async fn test_printer(&self, id: PrinterId) -> Result<PrintOutcome> {
        let printer = self.get_printer(id)?;
        let data = test_page(printer.printer.printer_type).ok_or_else(|| {
            BridgeError::Validation(format!(
                "no test page for {} printers",
                printer.printer.printer_type
            ))
        })?;
        let job = NewPrintJob {
            printer_id: id,
            name: format!("Test page for {}", printer.printer.name),
            job_type: printer.printer.printer_type,
            data,
        };
        self.jobs.execute(&printer, job).await
    }
}
