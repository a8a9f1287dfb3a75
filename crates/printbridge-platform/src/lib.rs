// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge-platform: OS-facing ports and their default implementations.
//
// The print services never talk to sockets, spoolers or layout engines
// directly; they receive the three ports defined in `traits` and this crate
// picks sensible implementations for the host platform.

use std::sync::Arc;
use std::time::Duration;

pub mod network;
pub mod renderer;
pub mod routing;
#[cfg(unix)]
pub mod spooler;
pub mod traits;

pub use network::NetworkPrinter;
pub use renderer::UnavailableRenderer;
pub use routing::RoutingPrinter;
pub use traits::{RawPrinter, StatusProbe, TemplateRenderer};

/// The set of ports handed to the print services.
#[derive(Clone)]
pub struct PlatformPorts {
    pub printer: Arc<dyn RawPrinter>,
    pub probe: Arc<dyn StatusProbe>,
    pub renderer: Arc<dyn TemplateRenderer>,
}

/// Ports for the current operating system.
///
/// Network (`host:port`) printers work everywhere. Local queues go through
/// CUPS on Unix; elsewhere only network printers are reachable.
pub fn platform_ports(timeout: Duration) -> PlatformPorts {
    let network = Arc::new(NetworkPrinter::new(timeout));

    #[cfg(unix)]
    let router = Arc::new(RoutingPrinter::new(
        network,
        Arc::new(spooler::SpoolerPrinter::new(timeout)),
    ));

    #[cfg(not(unix))]
    let router = Arc::new(RoutingPrinter::new(network.clone(), network));

    PlatformPorts {
        printer: router.clone(),
        probe: router,
        renderer: Arc::new(UnavailableRenderer),
    }
}
