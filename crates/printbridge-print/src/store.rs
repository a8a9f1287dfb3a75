// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Persistence for printers, printer settings, print jobs and the global
// settings singleton.
//
// Services depend on the `Store` trait; `SqliteStore` is the shipped
// implementation.  Referential rules live in the schema: deleting a printer
// cascades to its settings row but is refused while jobs reference it, and
// a job can only leave `pending` once.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use tracing::{debug, info, instrument};

use printbridge_core::error::{BridgeError, Result};
use printbridge_core::settings::PrinterSettings;
use printbridge_core::types::{
    GlobalSettings, JobFilter, JobId, JobStats, JobStatus, JobUpdate, NewPrintJob, PrintJob,
    Printer, PrinterId, PrinterType, PrinterUpdate, PrinterWithSettings, RecentJob,
};

/// Persistence port consumed by every service.
///
/// Methods are synchronous: each call is a short local transaction.
pub trait Store: Send + Sync {
    // -- Printers --

    /// Insert a printer and its settings row atomically.
    fn create_printer(
        &self,
        name: &str,
        printer_type: PrinterType,
        description: Option<&str>,
        settings: &PrinterSettings,
    ) -> Result<Printer>;

    fn list_printers(&self) -> Result<Vec<Printer>>;

    fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>>;

    fn get_printer_with_settings(&self, id: PrinterId) -> Result<Option<PrinterWithSettings>>;

    fn update_printer(&self, id: PrinterId, update: &PrinterUpdate) -> Result<Printer>;

    /// Record the last observed reachability of a printer.
    fn set_printer_online(&self, id: PrinterId, online: bool) -> Result<()>;

    /// Replace a printer's settings document (upsert by printer id).
    fn upsert_printer_settings(&self, id: PrinterId, settings: &PrinterSettings) -> Result<()>;

    fn delete_printer(&self, id: PrinterId) -> Result<()>;

    // -- Jobs --

    /// Persist a new job in `pending` state.
    fn insert_job(&self, job: &NewPrintJob) -> Result<PrintJob>;

    fn get_job(&self, id: JobId) -> Result<Option<PrintJob>>;

    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<PrintJob>>;

    /// Apply a partial update. A status change is only accepted while the
    /// job is pending, error text only on failed jobs, and a failed job
    /// must end up with error text.
    fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<PrintJob>;

    /// Move a pending job to a terminal state. Returns `false` if the job
    /// had already left `pending`.
    fn finish_job(&self, id: JobId, status: JobStatus, error: Option<&str>) -> Result<bool>;

    fn delete_job(&self, id: JobId) -> Result<()>;

    /// Printer and job counters with the overall success rate.
    fn job_stats(&self) -> Result<JobStats>;

    /// The newest `limit` jobs, each with its printer.
    fn recent_jobs(&self, limit: u32) -> Result<Vec<RecentJob>>;

    // -- Global settings --

    fn load_global_settings(&self) -> Result<Option<GlobalSettings>>;

    fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()>;
}

const SCHEMA_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS printers (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        description TEXT,
        online INTEGER NOT NULL DEFAULT 0,
        printer_type TEXT NOT NULL CHECK (printer_type IN ('receipt', 'a4', 'label')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS printer_settings (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        printer_id INTEGER NOT NULL UNIQUE REFERENCES printers(id) ON DELETE CASCADE,
        settings TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS print_jobs (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        printer_id INTEGER NOT NULL REFERENCES printers(id) ON DELETE RESTRICT,
        name TEXT NOT NULL,
        job_type TEXT NOT NULL CHECK (job_type IN ('receipt', 'a4', 'label')),
        status TEXT NOT NULL DEFAULT 'pending' CHECK (status IN ('pending', 'completed', 'failed')),
        data TEXT NOT NULL,
        created_at TEXT NOT NULL,
        completed_at TEXT,
        error TEXT
    );

    CREATE INDEX IF NOT EXISTS print_jobs_status ON print_jobs (status);

    CREATE TABLE IF NOT EXISTS settings (
        id INTEGER PRIMARY KEY CHECK (id = 1),
        server_url TEXT NOT NULL,
        api_key TEXT NOT NULL,
        client_id TEXT NOT NULL,
        label_printer_id INTEGER REFERENCES printers(id) ON DELETE SET NULL,
        receipt_printer_id INTEGER REFERENCES printers(id) ON DELETE SET NULL,
        regular_printer_id INTEGER REFERENCES printers(id) ON DELETE SET NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
"#;

const PRINTER_COLUMNS: &str = "id, name, description, online, printer_type";
const JOB_COLUMNS: &str =
    "id, printer_id, name, job_type, status, data, created_at, completed_at, error";
const JOB_COLUMN_COUNT: usize = 9;

/// SQLite-backed store.
///
/// `rusqlite::Connection` is not `Sync`, so the connection sits behind a
/// mutex; every operation holds it for one short transaction.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| BridgeError::Database(format!("open: {e}")))?;

        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(|e| BridgeError::Database(format!("WAL pragma: {e}")))?;

        let store = Self::init(conn)?;
        info!("store database opened");
        Ok(store)
    }

    /// Open an in-memory database (useful for tests).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| BridgeError::Database(format!("open in-memory: {e}")))?;
        let store = Self::init(conn)?;
        debug!("in-memory store opened");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(|e| BridgeError::Database(format!("foreign_keys pragma: {e}")))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(|e| BridgeError::Database(format!("create schema: {e}")))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| BridgeError::Database("connection mutex poisoned".into()))
    }
}

fn db_err(context: &'static str) -> impl Fn(rusqlite::Error) -> BridgeError {
    move |e| BridgeError::Database(format!("{context}: {e}"))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn select_printer(conn: &Connection, id: PrinterId) -> Result<Option<Printer>> {
    conn.query_row(
        &format!("SELECT {PRINTER_COLUMNS} FROM printers WHERE id = ?1"),
        params![id.0],
        row_to_printer,
    )
    .optional()
    .map_err(db_err("get printer"))
}

fn select_job(conn: &Connection, id: JobId) -> Result<Option<PrintJob>> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM print_jobs WHERE id = ?1"),
        params![id.0],
        row_to_job,
    )
    .optional()
    .map_err(db_err("get job"))
}

impl Store for SqliteStore {
    #[instrument(skip(self, settings))]
    fn create_printer(
        &self,
        name: &str,
        printer_type: PrinterType,
        description: Option<&str>,
        settings: &PrinterSettings,
    ) -> Result<Printer> {
        let name = name.trim();
        if name.is_empty() {
            return Err(BridgeError::Validation("printer name is required".into()));
        }
        if settings.printer_type() != printer_type {
            return Err(BridgeError::Validation(format!(
                "{} settings given for a {printer_type} printer",
                settings.printer_type()
            )));
        }

        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin"))?;
        let now = Utc::now().to_rfc3339();

        tx.execute(
            "INSERT INTO printers (name, description, online, printer_type, created_at, updated_at)
             VALUES (?1, ?2, 0, ?3, ?4, ?4)",
            params![name, description, printer_type.as_str(), now],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                BridgeError::Validation(format!("a printer named {name} already exists"))
            } else {
                BridgeError::Database(format!("insert printer: {e}"))
            }
        })?;
        let id = PrinterId(tx.last_insert_rowid());

        tx.execute(
            "INSERT INTO printer_settings (printer_id, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)",
            params![id.0, settings.to_json().to_string(), now],
        )
        .map_err(db_err("insert printer settings"))?;

        tx.commit().map_err(db_err("commit"))?;

        info!(printer_id = %id, name, %printer_type, "printer created");
        Ok(Printer {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            online: false,
            printer_type,
        })
    }

    #[instrument(skip(self))]
    fn list_printers(&self) -> Result<Vec<Printer>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!("SELECT {PRINTER_COLUMNS} FROM printers ORDER BY id ASC"))
            .map_err(db_err("prepare list_printers"))?;
        let printers = stmt
            .query_map([], row_to_printer)
            .map_err(db_err("query list_printers"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect printers"))?;
        Ok(printers)
    }

    fn get_printer(&self, id: PrinterId) -> Result<Option<Printer>> {
        select_printer(&*self.conn()?, id)
    }

    #[instrument(skip(self))]
    fn get_printer_with_settings(&self, id: PrinterId) -> Result<Option<PrinterWithSettings>> {
        let conn = self.conn()?;
        let Some(printer) = select_printer(&conn, id)? else {
            return Ok(None);
        };

        let raw: Option<String> = conn
            .query_row(
                "SELECT settings FROM printer_settings WHERE printer_id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err("get printer settings"))?;

        let settings = match raw {
            Some(text) => {
                let value: serde_json::Value = serde_json::from_str(&text)?;
                PrinterSettings::from_json(printer.printer_type, &value).map_err(|e| {
                    BridgeError::Database(format!("stored settings of printer {id} are invalid: {e}"))
                })?
            }
            None => PrinterSettings::defaults_for(printer.printer_type),
        };

        Ok(Some(PrinterWithSettings { printer, settings }))
    }

    #[instrument(skip(self, update))]
    fn update_printer(&self, id: PrinterId, update: &PrinterUpdate) -> Result<Printer> {
        let conn = self.conn()?;
        let mut printer = select_printer(&conn, id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {id}")))?;

        if let Some(name) = &update.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(BridgeError::Validation("printer name is required".into()));
            }
            printer.name = name.to_string();
        }
        if let Some(description) = &update.description {
            printer.description = Some(description.clone());
        }

        conn.execute(
            "UPDATE printers SET name = ?1, description = ?2, updated_at = ?3 WHERE id = ?4",
            params![printer.name, printer.description, Utc::now().to_rfc3339(), id.0],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                BridgeError::Validation(format!("a printer named {} already exists", printer.name))
            } else {
                BridgeError::Database(format!("update printer: {e}"))
            }
        })?;

        debug!(printer_id = %id, "printer updated");
        Ok(printer)
    }

    fn set_printer_online(&self, id: PrinterId, online: bool) -> Result<()> {
        let rows = self
            .conn()?
            .execute(
                "UPDATE printers SET online = ?1, updated_at = ?2 WHERE id = ?3",
                params![online, Utc::now().to_rfc3339(), id.0],
            )
            .map_err(db_err("set online"))?;
        if rows == 0 {
            return Err(BridgeError::NotFound(format!("printer {id}")));
        }
        Ok(())
    }

    #[instrument(skip(self, settings))]
    fn upsert_printer_settings(&self, id: PrinterId, settings: &PrinterSettings) -> Result<()> {
        let conn = self.conn()?;
        let printer = select_printer(&conn, id)?
            .ok_or_else(|| BridgeError::NotFound(format!("printer {id}")))?;
        if settings.printer_type() != printer.printer_type {
            return Err(BridgeError::Validation(format!(
                "{} settings given for a {} printer",
                settings.printer_type(),
                printer.printer_type
            )));
        }

        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO printer_settings (printer_id, settings, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT (printer_id) DO UPDATE SET settings = excluded.settings,
                                                    updated_at = excluded.updated_at",
            params![id.0, settings.to_json().to_string(), now],
        )
        .map_err(db_err("upsert printer settings"))?;

        debug!(printer_id = %id, "printer settings replaced");
        Ok(())
    }

    #[instrument(skip(self))]
    fn delete_printer(&self, id: PrinterId) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin"))?;

        let jobs: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM print_jobs WHERE printer_id = ?1",
                params![id.0],
                |row| row.get(0),
            )
            .map_err(db_err("count printer jobs"))?;
        if jobs > 0 {
            return Err(BridgeError::Validation(format!(
                "printer {id} is referenced by {jobs} print job(s)"
            )));
        }

        let rows = tx
            .execute("DELETE FROM printers WHERE id = ?1", params![id.0])
            .map_err(db_err("delete printer"))?;
        if rows == 0 {
            return Err(BridgeError::NotFound(format!("printer {id}")));
        }
        tx.commit().map_err(db_err("commit"))?;

        info!(printer_id = %id, "printer deleted");
        Ok(())
    }

    #[instrument(skip(self, job), fields(printer_id = %job.printer_id, job_type = %job.job_type))]
    fn insert_job(&self, job: &NewPrintJob) -> Result<PrintJob> {
        let conn = self.conn()?;
        let created_at = Utc::now();
        conn.execute(
            "INSERT INTO print_jobs (printer_id, name, job_type, status, data, created_at)
             VALUES (?1, ?2, ?3, 'pending', ?4, ?5)",
            params![
                job.printer_id.0,
                job.name,
                job.job_type.as_str(),
                job.data.to_string(),
                created_at.to_rfc3339()
            ],
        )
        .map_err(|e| {
            if is_constraint_violation(&e) {
                BridgeError::NotFound(format!("printer {}", job.printer_id))
            } else {
                BridgeError::Database(format!("insert job: {e}"))
            }
        })?;
        let id = JobId(conn.last_insert_rowid());

        debug!(job_id = %id, "job inserted");
        Ok(PrintJob {
            id,
            printer_id: job.printer_id,
            name: job.name.clone(),
            job_type: job.job_type,
            status: JobStatus::Pending,
            data: job.data.clone(),
            created_at,
            completed_at: None,
            error: None,
        })
    }

    fn get_job(&self, id: JobId) -> Result<Option<PrintJob>> {
        select_job(&*self.conn()?, id)
    }

    #[instrument(skip(self))]
    fn list_jobs(&self, filter: &JobFilter) -> Result<Vec<PrintJob>> {
        let mut clauses = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        if let Some(status) = filter.status {
            values.push(SqlValue::Text(status.as_str().into()));
            clauses.push(format!("status = ?{}", values.len()));
        }
        if let Some(job_type) = filter.job_type {
            values.push(SqlValue::Text(job_type.as_str().into()));
            clauses.push(format!("job_type = ?{}", values.len()));
        }
        if let Some(printer_id) = filter.printer_id {
            values.push(SqlValue::Integer(printer_id.0));
            clauses.push(format!("printer_id = ?{}", values.len()));
        }

        let mut sql = format!("SELECT {JOB_COLUMNS} FROM print_jobs");
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY id DESC");
        if filter.limit.is_some() || filter.offset.is_some() {
            values.push(SqlValue::Integer(filter.limit.map_or(-1, i64::from)));
            sql.push_str(&format!(" LIMIT ?{}", values.len()));
            values.push(SqlValue::Integer(i64::from(filter.offset.unwrap_or(0))));
            sql.push_str(&format!(" OFFSET ?{}", values.len()));
        }

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(db_err("prepare list_jobs"))?;
        let jobs = stmt
            .query_map(params_from_iter(values.iter()), row_to_job)
            .map_err(db_err("query list_jobs"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect jobs"))?;

        debug!(count = jobs.len(), "jobs listed");
        Ok(jobs)
    }

    #[instrument(skip(self, update))]
    fn update_job(&self, id: JobId, update: &JobUpdate) -> Result<PrintJob> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(db_err("begin"))?;
        let mut job =
            select_job(&tx, id)?.ok_or_else(|| BridgeError::NotFound(format!("job {id}")))?;

        if let Some(status) = update.status {
            if status != job.status {
                if job.status.is_terminal() {
                    return Err(BridgeError::Validation(format!(
                        "job {id} is already {} and cannot become {}",
                        job.status.as_str(),
                        status.as_str()
                    )));
                }
                job.status = status;
                if status == JobStatus::Completed {
                    job.completed_at = Some(Utc::now());
                }
            }
        }
        if let Some(error) = &update.error {
            if job.status != JobStatus::Failed {
                return Err(BridgeError::Validation(format!(
                    "error text can only be set on failed jobs, job {id} is {}",
                    job.status.as_str()
                )));
            }
            job.error = Some(error.clone());
        }
        if job.status == JobStatus::Failed && job.error.is_none() {
            return Err(BridgeError::Validation(format!(
                "job {id} cannot be failed without an error"
            )));
        }
        if let Some(name) = &update.name {
            job.name = name.clone();
        }
        if let Some(data) = &update.data {
            job.data = data.clone();
        }

        tx.execute(
            "UPDATE print_jobs SET name = ?1, data = ?2, status = ?3, completed_at = ?4, error = ?5
             WHERE id = ?6",
            params![
                job.name,
                job.data.to_string(),
                job.status.as_str(),
                job.completed_at.map(|t| t.to_rfc3339()),
                job.error,
                id.0
            ],
        )
        .map_err(db_err("update job"))?;
        tx.commit().map_err(db_err("commit"))?;

        debug!(job_id = %id, status = job.status.as_str(), "job updated");
        Ok(job)
    }

    #[instrument(skip(self))]
    fn finish_job(&self, id: JobId, status: JobStatus, error: Option<&str>) -> Result<bool> {
        if !status.is_terminal() {
            return Err(BridgeError::Validation("a job cannot be finished as pending".into()));
        }
        if status == JobStatus::Failed && error.is_none() {
            return Err(BridgeError::Validation(format!(
                "job {id} cannot be failed without an error"
            )));
        }
        let completed_at = (status == JobStatus::Completed).then(|| Utc::now().to_rfc3339());
        let error = if status == JobStatus::Failed { error } else { None };

        let conn = self.conn()?;
        let rows = conn
            .execute(
                "UPDATE print_jobs SET status = ?1, completed_at = ?2, error = ?3
                 WHERE id = ?4 AND status = 'pending'",
                params![status.as_str(), completed_at, error, id.0],
            )
            .map_err(db_err("finish job"))?;

        if rows == 0 {
            if select_job(&conn, id)?.is_none() {
                return Err(BridgeError::NotFound(format!("job {id}")));
            }
            debug!(job_id = %id, "job already terminal");
            return Ok(false);
        }
        Ok(true)
    }

    #[instrument(skip(self))]
    fn delete_job(&self, id: JobId) -> Result<()> {
        let rows = self
            .conn()?
            .execute("DELETE FROM print_jobs WHERE id = ?1", params![id.0])
            .map_err(db_err("delete job"))?;
        if rows == 0 {
            return Err(BridgeError::NotFound(format!("job {id}")));
        }
        info!(job_id = %id, "job deleted");
        Ok(())
    }

    #[instrument(skip(self))]
    fn job_stats(&self) -> Result<JobStats> {
        let conn = self.conn()?;
        let total_printers: i64 = conn
            .query_row("SELECT COUNT(*) FROM printers", [], |row| row.get(0))
            .map_err(db_err("count printers"))?;
        let (total_jobs, completed_jobs, failed_jobs): (i64, i64, i64) = conn
            .query_row(
                "SELECT COUNT(*),
                        COALESCE(SUM(status = 'completed'), 0),
                        COALESCE(SUM(status = 'failed'), 0)
                 FROM print_jobs",
                [],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(db_err("count jobs"))?;

        let total_jobs = total_jobs.max(0) as u64;
        let completed_jobs = completed_jobs.max(0) as u64;
        let failed_jobs = failed_jobs.max(0) as u64;
        Ok(JobStats {
            total_printers: total_printers.max(0) as u64,
            total_jobs,
            completed_jobs,
            failed_jobs,
            pending_jobs: total_jobs.saturating_sub(completed_jobs + failed_jobs),
            success_rate: JobStats::success_rate_of(completed_jobs, total_jobs),
        })
    }

    #[instrument(skip(self))]
    fn recent_jobs(&self, limit: u32) -> Result<Vec<RecentJob>> {
        let job_columns = JOB_COLUMNS
            .split(", ")
            .map(|c| format!("j.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let printer_columns = PRINTER_COLUMNS
            .split(", ")
            .map(|c| format!("p.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {job_columns}, {printer_columns}
             FROM print_jobs j JOIN printers p ON p.id = j.printer_id
             ORDER BY j.created_at DESC, j.id DESC
             LIMIT ?1"
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(db_err("prepare recent_jobs"))?;
        let jobs = stmt
            .query_map(params![i64::from(limit)], |row| {
                Ok(RecentJob {
                    job: row_to_job(row)?,
                    printer: printer_at(row, JOB_COLUMN_COUNT)?,
                })
            })
            .map_err(db_err("query recent_jobs"))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err("collect recent jobs"))?;
        Ok(jobs)
    }

    fn load_global_settings(&self) -> Result<Option<GlobalSettings>> {
        self.conn()?
            .query_row(
                "SELECT server_url, api_key, client_id, label_printer_id, receipt_printer_id,
                        regular_printer_id, created_at, updated_at
                 FROM settings WHERE id = 1",
                [],
                |row| {
                    Ok(GlobalSettings {
                        server_url: row.get(0)?,
                        api_key: row.get(1)?,
                        client_id: row.get(2)?,
                        label_printer_id: row.get::<_, Option<i64>>(3)?.map(PrinterId),
                        receipt_printer_id: row.get::<_, Option<i64>>(4)?.map(PrinterId),
                        regular_printer_id: row.get::<_, Option<i64>>(5)?.map(PrinterId),
                        created_at: parse_timestamp(6, &row.get::<_, String>(6)?)?,
                        updated_at: parse_timestamp(7, &row.get::<_, String>(7)?)?,
                    })
                },
            )
            .optional()
            .map_err(db_err("load settings"))
    }

    #[instrument(skip(self, settings))]
    fn save_global_settings(&self, settings: &GlobalSettings) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO settings (id, server_url, api_key, client_id, label_printer_id,
                                       receipt_printer_id, regular_printer_id, created_at, updated_at)
                 VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT (id) DO UPDATE SET
                     server_url = excluded.server_url,
                     api_key = excluded.api_key,
                     client_id = excluded.client_id,
                     label_printer_id = excluded.label_printer_id,
                     receipt_printer_id = excluded.receipt_printer_id,
                     regular_printer_id = excluded.regular_printer_id,
                     updated_at = excluded.updated_at",
                params![
                    settings.server_url,
                    settings.api_key,
                    settings.client_id,
                    settings.label_printer_id.map(|p| p.0),
                    settings.receipt_printer_id.map(|p| p.0),
                    settings.regular_printer_id.map(|p| p.0),
                    settings.created_at.to_rfc3339(),
                    settings.updated_at.to_rfc3339(),
                ],
            )
            .map_err(|e| {
                if is_constraint_violation(&e) {
                    BridgeError::Validation("role printer does not exist".into())
                } else {
                    BridgeError::Database(format!("save settings: {e}"))
                }
            })?;
        debug!("global settings saved");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(
    column: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(column, rusqlite::types::Type::Text, Box::new(err))
}

fn parse_timestamp(column: usize, text: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(column, e))
}

fn row_to_printer(row: &rusqlite::Row<'_>) -> rusqlite::Result<Printer> {
    printer_at(row, 0)
}

/// Map the printer columns starting at column `first`.
fn printer_at(row: &rusqlite::Row<'_>, first: usize) -> rusqlite::Result<Printer> {
    let printer_type: String = row.get(first + 4)?;
    Ok(Printer {
        id: PrinterId(row.get(first)?),
        name: row.get(first + 1)?,
        description: row.get(first + 2)?,
        online: row.get(first + 3)?,
        printer_type: printer_type
            .parse()
            .map_err(|e: BridgeError| conversion_error(first + 4, e))?,
    })
}

fn row_to_job(row: &rusqlite::Row<'_>) -> rusqlite::Result<PrintJob> {
    let job_type: String = row.get(3)?;
    let status: String = row.get(4)?;
    let data: String = row.get(5)?;
    let created_at: String = row.get(6)?;
    let completed_at: Option<String> = row.get(7)?;

    Ok(PrintJob {
        id: JobId(row.get(0)?),
        printer_id: PrinterId(row.get(1)?),
        name: row.get(2)?,
        job_type: job_type
            .parse()
            .map_err(|e: BridgeError| conversion_error(3, e))?,
        status: status
            .parse()
            .map_err(|e: BridgeError| conversion_error(4, e))?,
        data: serde_json::from_str(&data).map_err(|e| conversion_error(5, e))?,
        created_at: parse_timestamp(6, &created_at)?,
        completed_at: completed_at
            .as_deref()
            .map(|t| parse_timestamp(7, t))
            .transpose()?,
        error: row.get(8)?,
    })
}
