// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Picks a transport from the shape of the printer name.

use std::sync::Arc;

use async_trait::async_trait;

use printbridge_core::error::Result;
use printbridge_core::{PrinterStatus, RawPrintResult};

use crate::network::{NetworkPrinter, parse_network_name};
use crate::traits::{RawPrinter, StatusProbe};

/// `host:port` names go over raw TCP; everything else goes to the local
/// spooler (or whatever `local` is).
pub struct RoutingPrinter {
    network: Arc<NetworkPrinter>,
    local: Arc<dyn LocalTransport>,
}

/// A transport that is both a raw printer and a status probe.
pub trait LocalTransport: RawPrinter + StatusProbe {}

impl<T: RawPrinter + StatusProbe> LocalTransport for T {}

impl RoutingPrinter {
    pub fn new(network: Arc<NetworkPrinter>, local: Arc<dyn LocalTransport>) -> Self {
        Self { network, local }
    }
}

#[async_trait]
impl RawPrinter for RoutingPrinter {
    async fn send(&self, printer_name: &str, bytes: &[u8], job_name: &str) -> Result<RawPrintResult> {
        if parse_network_name(printer_name).is_some() {
            self.network.send(printer_name, bytes, job_name).await
        } else {
            self.local.send(printer_name, bytes, job_name).await
        }
    }
}

#[async_trait]
impl StatusProbe for RoutingPrinter {
    async fn query(&self, printer_name: &str) -> Result<PrinterStatus> {
        if parse_network_name(printer_name).is_some() {
            self.network.query(printer_name).await
        } else {
            self.local.query(printer_name).await
        }
    }
}
