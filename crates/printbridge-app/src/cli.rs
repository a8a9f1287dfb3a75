// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Command line surface. Without a subcommand the bridge runs as a daemon;
// every other command performs one operation against the local store and
// prints the result as JSON on stdout.

use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::types::{
    GlobalSettingsUpdate, JobFilter, JobId, JobStatus, PrinterId, PrinterType, PrinterUpdate,
};
use printbridge_print::RECENT_JOBS_LIMIT;

use crate::services::app_services::AppServices;

/// Printbridge - cloud print-queue bridge for local receipt and label printers
#[derive(Parser, Debug)]
#[command(name = "printbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Data directory (defaults to $PRINTBRIDGE_DATA_DIR, then the XDG data home)
    #[arg(long, value_name = "DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Run the bridge until interrupted (the default)
    Run,
    /// Show the data directory, configuration and bridge identity
    Status,
    /// Manage local printers
    #[command(subcommand)]
    Printer(PrinterCommand),
    /// Show or change the global settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Inspect the local job history
    #[command(subcommand)]
    Jobs(JobsCommand),
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum PrinterCommand {
    /// Register a printer with the default settings of its type
    Add {
        /// OS printer name or `host:port` of a network printer
        name: String,
        /// receipt, label or a4
        #[arg(long = "type", value_name = "TYPE")]
        printer_type: PrinterType,
        #[arg(long)]
        description: Option<String>,
    },
    /// List printers
    List,
    /// Show one printer with its settings
    Show { id: i64 },
    /// Rename a printer or change its description
    Update {
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Replace a printer's settings with a JSON document
    Settings {
        id: i64,
        /// Settings document, e.g. '{"label_width":50,"label_height":30}'
        json: String,
    },
    /// Delete a printer that has no jobs
    Delete { id: i64 },
    /// Print the built-in test page
    Test { id: i64 },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum SettingsCommand {
    /// Show the global settings
    Show,
    /// Change remote credentials or printer roles
    Set {
        #[arg(long)]
        server_url: Option<String>,
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        client_id: Option<String>,
        /// Printer id, or `none` to clear the role
        #[arg(long, value_name = "ID|none")]
        label_printer: Option<RoleTarget>,
        /// Printer id, or `none` to clear the role
        #[arg(long, value_name = "ID|none")]
        receipt_printer: Option<RoleTarget>,
        /// Printer id, or `none` to clear the role
        #[arg(long, value_name = "ID|none")]
        regular_printer: Option<RoleTarget>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum JobsCommand {
    /// List jobs, newest first
    List {
        #[arg(long)]
        status: Option<JobStatus>,
        #[arg(long = "type", value_name = "TYPE")]
        job_type: Option<PrinterType>,
        #[arg(long)]
        printer: Option<i64>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Show one job
    Get { id: i64 },
    /// Delete a job
    Delete { id: i64 },
    /// Job counters and success rate
    Stats,
    /// The newest jobs with their printers
    Recent {
        #[arg(long, default_value_t = RECENT_JOBS_LIMIT)]
        limit: u32,
    },
}

/// Value of a `--*-printer` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleTarget {
    Printer(PrinterId),
    Unassigned,
}

impl FromStr for RoleTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("none") {
            return Ok(Self::Unassigned);
        }
        s.parse()
            .map(|id| Self::Printer(PrinterId(id)))
            .map_err(|_| format!("expected a printer id or `none`, got `{s}`"))
    }
}

impl From<RoleTarget> for Option<PrinterId> {
    fn from(target: RoleTarget) -> Self {
        match target {
            RoleTarget::Printer(id) => Some(id),
            RoleTarget::Unassigned => None,
        }
    }
}

/// Run a one-shot command and write its result to `out`.
pub async fn execute(services: &AppServices, command: Command, out: &mut impl Write) -> Result<()> {
    match command {
        Command::Run => Err(BridgeError::Validation(
            "`run` starts the daemon and is not a one-shot command".into(),
        )),
        Command::Status => {
            let settings = services.settings().load()?;
            emit(
                out,
                &json!({
                    "data_dir": services.data_dir(),
                    "config": services.config(),
                    "client_id": settings.client_id,
                    "server_url": settings.server_url,
                    "configured": settings.is_complete(),
                }),
            )
        }
        Command::Printer(command) => printer(services, command, out).await,
        Command::Settings(command) => settings(services, command, out),
        Command::Jobs(command) => jobs(services, command, out),
    }
}

async fn printer(services: &AppServices, command: PrinterCommand, out: &mut impl Write) -> Result<()> {
    let printers = services.printers();
    match command {
        PrinterCommand::Add {
            name,
            printer_type,
            description,
        } => emit(
            out,
            &printers.create_printer(&name, printer_type, description.as_deref())?,
        ),
        PrinterCommand::List => emit(out, &printers.list_printers()?),
        PrinterCommand::Show { id } => {
            let printer = printers.get_printer(PrinterId(id))?;
            emit(
                out,
                &json!({ "printer": printer.printer, "settings": printer.settings.to_json() }),
            )
        }
        PrinterCommand::Update {
            id,
            name,
            description,
        } => emit(
            out,
            &printers.update_printer(PrinterId(id), &PrinterUpdate { name, description })?,
        ),
        PrinterCommand::Settings { id, json } => {
            let raw: Value = serde_json::from_str(&json)
                .map_err(|e| BridgeError::Validation(format!("settings are not valid JSON: {e}")))?;
            let settings = printers.update_printer_settings(PrinterId(id), &raw)?;
            emit(out, &settings.to_json())
        }
        PrinterCommand::Delete { id } => {
            printers.delete_printer(PrinterId(id))?;
            emit(out, &json!({ "deleted": id }))
        }
        PrinterCommand::Test { id } => {
            let jobs = services.jobs();
            jobs.start();
            let outcome = printers.test_printer(PrinterId(id)).await;
            jobs.stop();
            emit(out, &outcome?)
        }
    }
}

fn settings(services: &AppServices, command: SettingsCommand, out: &mut impl Write) -> Result<()> {
    match command {
        SettingsCommand::Show => emit(out, &services.settings().load()?),
        SettingsCommand::Set {
            server_url,
            api_key,
            client_id,
            label_printer,
            receipt_printer,
            regular_printer,
        } => {
            let update = GlobalSettingsUpdate {
                server_url,
                api_key,
                client_id,
                label_printer_id: label_printer.map(Into::into),
                receipt_printer_id: receipt_printer.map(Into::into),
                regular_printer_id: regular_printer.map(Into::into),
            };
            emit(out, &services.settings().update(update)?)
        }
    }
}

fn jobs(services: &AppServices, command: JobsCommand, out: &mut impl Write) -> Result<()> {
    let jobs = services.jobs();
    match command {
        JobsCommand::List {
            status,
            job_type,
            printer,
            limit,
            offset,
        } => {
            let filter = JobFilter {
                status,
                job_type,
                printer_id: printer.map(PrinterId),
                limit,
                offset,
            };
            emit(out, &jobs.list(&filter)?)
        }
        JobsCommand::Get { id } => emit(out, &jobs.get(JobId(id))?),
        JobsCommand::Delete { id } => {
            jobs.delete(JobId(id))?;
            emit(out, &json!({ "deleted": id }))
        }
        JobsCommand::Stats => emit(out, &jobs.stats()?),
        JobsCommand::Recent { limit } => emit(out, &jobs.recent(limit)?),
    }
}

fn emit<T: Serialize>(out: &mut impl Write, value: &T) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, value)?;
    writeln!(out)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> std::result::Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("printbridge").chain(args.iter().copied()))
    }

    async fn run(services: &AppServices, args: &[&str]) -> Result<Value> {
        let command = parse(args).unwrap().command.unwrap();
        let mut out = Vec::new();
        execute(services, command, &mut out).await?;
        Ok(serde_json::from_slice(&out).unwrap())
    }

    #[test]
    fn no_subcommand_means_run() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.command, None);
        assert_eq!(cli.data_dir, None);

        let cli = parse(&["jobs", "recent", "--data-dir", "/tmp/pb"]).unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/pb")));
        assert_eq!(cli.command, Some(Command::Jobs(JobsCommand::Recent { limit: 10 })));
    }

    #[test]
    fn arguments_are_typed() {
        let cli = parse(&["printer", "add", "XP-80C", "--type", "Receipt"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::Printer(PrinterCommand::Add {
                name: "XP-80C".into(),
                printer_type: PrinterType::Receipt,
                description: None,
            }))
        );
        assert!(parse(&["printer", "add", "XP-80C", "--type", "fax"]).is_err());
        assert!(parse(&["printer", "show", "first"]).is_err());

        let cli = parse(&["settings", "set", "--label-printer", "3", "--receipt-printer", "none"]).unwrap();
        let Some(Command::Settings(SettingsCommand::Set {
            label_printer,
            receipt_printer,
            regular_printer,
            ..
        })) = cli.command
        else {
            panic!("expected settings set");
        };
        assert_eq!(label_printer, Some(RoleTarget::Printer(PrinterId(3))));
        assert_eq!(receipt_printer, Some(RoleTarget::Unassigned));
        assert_eq!(regular_printer, None);
        assert!(parse(&["settings", "set", "--label-printer", "primary"]).is_err());
    }

    #[tokio::test]
    async fn printer_commands_round_through_the_store() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(dir.path()).unwrap();

        let added = run(&services, &["printer", "add", "Label-1", "--type", "label"]).await.unwrap();
        let id = added["id"].as_i64().unwrap();
        assert_eq!(added["printer_type"], "label");
        let id_arg = id.to_string();

        run(&services, &["printer", "settings", &id_arg, r#"{"label_width":60,"label_height":40}"#])
            .await
            .unwrap();
        let shown = run(&services, &["printer", "show", &id_arg]).await.unwrap();
        assert_eq!(shown["printer"]["name"], "Label-1");
        assert_eq!(shown["settings"]["label_width"], 60.0);

        let renamed = run(&services, &["printer", "update", &id_arg, "--name", "Shelf"]).await.unwrap();
        assert_eq!(renamed["name"], "Shelf");
        let listed = run(&services, &["printer", "list"]).await.unwrap();
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let err = run(&services, &["printer", "settings", &id_arg, "{ nope"]).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));

        run(&services, &["printer", "delete", &id_arg]).await.unwrap();
        let err = run(&services, &["printer", "show", &id_arg]).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));
    }

    #[tokio::test]
    async fn a4_test_page_is_refused_before_printing() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(dir.path()).unwrap();
        let added = run(&services, &["printer", "add", "Office", "--type", "a4"]).await.unwrap();

        let err = run(&services, &["printer", "test", &added["id"].to_string()])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert!(!services.jobs().is_running());
    }

    #[tokio::test]
    async fn settings_roles_and_job_views() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(dir.path()).unwrap();
        let label = run(&services, &["printer", "add", "Label-1", "--type", "label"]).await.unwrap();
        let label_id = label["id"].to_string();

        let updated = run(
            &services,
            &["settings", "set", "--server-url", "https://queue.example", "--label-printer", &label_id],
        )
        .await
        .unwrap();
        assert_eq!(updated["server_url"], "https://queue.example");
        assert_eq!(updated["label_printer_id"], label["id"]);

        let err = run(&services, &["settings", "set", "--receipt-printer", &label_id])
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));

        let cleared = run(&services, &["settings", "set", "--label-printer", "none"]).await.unwrap();
        assert_eq!(cleared["label_printer_id"], Value::Null);
        let shown = run(&services, &["settings", "show"]).await.unwrap();
        assert_eq!(shown["server_url"], "https://queue.example");

        let stats = run(&services, &["jobs", "stats"]).await.unwrap();
        assert_eq!(stats["total_printers"], 1);
        assert_eq!(stats["total_jobs"], 0);
        assert_eq!(stats["success_rate"], 0.0);
        assert_eq!(run(&services, &["jobs", "recent"]).await.unwrap(), json!([]));
        assert_eq!(
            run(&services, &["jobs", "list", "--status", "failed"]).await.unwrap(),
            json!([])
        );
        let err = run(&services, &["jobs", "get", "99"]).await.unwrap_err();
        assert!(matches!(err, BridgeError::NotFound(_)));

        let status = run(&services, &["status"]).await.unwrap();
        assert_eq!(status["configured"], true);
        assert!(status["client_id"].as_str().unwrap().starts_with("bridge-"));
    }

    #[tokio::test]
    async fn run_is_not_a_one_shot_command() {
        let dir = tempfile::tempdir().unwrap();
        let services = AppServices::init(dir.path()).unwrap();
        let mut out = Vec::new();
        let err = execute(&services, Command::Run, &mut out).await.unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert!(out.is_empty());
    }
}
