//! SQLite writer
//!
//! Stores one row per run and one row per processed page. Each save is a
//! single transaction, so a failed save leaves no partial run behind.

use crate::output::traits::{OutputResult, ResultBuffer, RunReport, Writer};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQL schema for the results database
pub const SCHEMA_SQL: &str = r#"
-- One row per engine run
CREATE TABLE IF NOT EXISTS runs (
    instance_id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    stopped_at TEXT,
    halt_reason TEXT,
    config_hash TEXT NOT NULL,
    threads INTEGER NOT NULL,
    succeeded INTEGER NOT NULL,
    crawl_errors INTEGER NOT NULL,
    process_errors INTEGER NOT NULL,
    rate_limited INTEGER NOT NULL,
    seeded INTEGER NOT NULL,
    discovered INTEGER NOT NULL,
    unprocessed INTEGER NOT NULL
);

-- Pages processed during a run
CREATE TABLE IF NOT EXISTS pages (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    instance_id TEXT NOT NULL REFERENCES runs(instance_id),
    url TEXT NOT NULL,
    title TEXT,
    status_code INTEGER,
    content_type TEXT,
    depth INTEGER NOT NULL,
    links_found INTEGER NOT NULL,
    func_name TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_pages_instance ON pages(instance_id);
CREATE INDEX IF NOT EXISTS idx_pages_url ON pages(url);
"#;

/// Writes the run report and buffered pages into a SQLite database
pub struct SqliteWriter {
    path: PathBuf,
    config_hash: String,
    buffer: ResultBuffer,
}

impl SqliteWriter {
    pub fn new(path: impl AsRef<Path>, config_hash: impl Into<String>, buffer: ResultBuffer) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            config_hash: config_hash.into(),
            buffer,
        }
    }

    fn open(&self) -> OutputResult<Connection> {
        let conn = Connection::open(&self.path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;
        conn.execute_batch(SCHEMA_SQL)?;

        Ok(conn)
    }
}

impl Writer for SqliteWriter {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn save(&self, report: &RunReport) -> OutputResult<()> {
        let mut conn = self.open()?;
        let pages = self.buffer.snapshot();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (
                instance_id, started_at, stopped_at, halt_reason, config_hash, threads,
                succeeded, crawl_errors, process_errors, rate_limited,
                seeded, discovered, unprocessed
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                report.instance_id,
                report.started_at.to_rfc3339(),
                report.stopped_at.map(|t| t.to_rfc3339()),
                report.halt_reason.map(|r| r.to_db_string()),
                self.config_hash,
                report.threads as i64,
                report.stats.succeeded as i64,
                report.stats.crawl_errors as i64,
                report.stats.process_errors as i64,
                report.stats.rate_limited as i64,
                report.seeded as i64,
                report.discovered as i64,
                report.unprocessed as i64,
            ],
        )?;

        {
            let mut stmt = tx.prepare(
                "INSERT INTO pages (
                    instance_id, url, title, status_code, content_type,
                    depth, links_found, func_name, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for page in &pages {
                stmt.execute(params![
                    report.instance_id,
                    page.url,
                    page.title,
                    page.status_code,
                    page.content_type,
                    page.depth,
                    page.links_found as i64,
                    page.func_name,
                    page.fetched_at.to_rfc3339(),
                ])?;
            }
        }

        tx.commit()?;

        tracing::info!(
            path = %self.path.display(),
            pages = pages.len(),
            "results saved to database"
        );
        Ok(())
    }
}
