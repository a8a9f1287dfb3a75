// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printbridge: cloud print-queue bridge for local receipt and label printers
//
// Entry point. Parses the command line, initialises logging and the backend
// services, then either runs the daemon until interrupted or performs one
// command and exits.

mod cli;
mod logging;
mod services;

use clap::Parser;
use printbridge_core::error::Result;
use tracing::{error, info};

use cli::{Cli, Command};
use services::app_services::AppServices;
use services::data_dir;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let dir = match data_dir::data_dir(cli.data_dir.as_deref()) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    // Flushes the log file when dropped at the end of main.
    let log_guard = match logging::init(&dir) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&dir, cli.command.unwrap_or(Command::Run)).await {
        error!(error = %e, class = ?e.class(), "Printbridge exited with an error");
        eprintln!("Error: {e}");
        drop(log_guard);
        std::process::exit(1);
    }
}

async fn run(dir: &std::path::Path, command: Command) -> Result<()> {
    let services = AppServices::init(dir)?;
    match command {
        Command::Run => daemon(&services).await,
        command => cli::execute(&services, command, &mut std::io::stdout()).await,
    }
}

async fn daemon(services: &AppServices) -> Result<()> {
    info!(version = env!("CARGO_PKG_VERSION"), "Printbridge starting");
    services.start().await;

    let signal = shutdown_signal().await;
    services.shutdown().await;
    signal
}

/// Wait for Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result?,
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    tokio::signal::ctrl_c().await?;

    info!("Shutdown requested");
    Ok(())
}
