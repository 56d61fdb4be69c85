//! SQLite database for Testdeck state persistence

use crate::types::*;
use crate::{Error, Result};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

/// Database wrapper for state persistence
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open or create database at path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path.as_ref())?;

        // Enable WAL mode for better concurrency
        conn.execute_batch(
            "PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;",
        )?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.init_schema()?;

        info!("Opened database at {:?}", path.as_ref());
        Ok(db)
    }

    /// Open in-memory database (for testing)
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    /// Initialize database schema
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                url TEXT,
                environment TEXT,
                description TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            -- Tags declared on a project, independent of use
            CREATE TABLE IF NOT EXISTS project_tags (
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                PRIMARY KEY (project_id, name),
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS test_cases (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'draft',
                tags TEXT NOT NULL DEFAULT '[]',
                is_manual INTEGER NOT NULL DEFAULT 0,
                playwright_script TEXT,
                current_version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_test_cases_project ON test_cases(project_id);

            CREATE TABLE IF NOT EXISTS fixtures (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                fixture_type TEXT NOT NULL DEFAULT 'shared',
                tags TEXT NOT NULL DEFAULT '[]',
                export_name TEXT,
                playwright_script TEXT,
                current_version INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_fixtures_project ON fixtures(project_id);

            -- Steps belong to exactly one test case or fixture.
            -- position is dense and zero-based within the parent.
            CREATE TABLE IF NOT EXISTS steps (
                id TEXT PRIMARY KEY,
                test_case_id TEXT,
                fixture_id TEXT,
                position INTEGER NOT NULL,
                action TEXT NOT NULL,
                data TEXT,
                expected TEXT,
                disabled INTEGER NOT NULL DEFAULT 0,
                fixture_ref TEXT,
                playwright_script TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                CHECK ((test_case_id IS NULL) <> (fixture_id IS NULL)),
                FOREIGN KEY(test_case_id) REFERENCES test_cases(id) ON DELETE CASCADE,
                FOREIGN KEY(fixture_id) REFERENCES fixtures(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_steps_test_case ON steps(test_case_id, position);
            CREATE INDEX IF NOT EXISTS idx_steps_fixture ON steps(fixture_id, position);
            CREATE INDEX IF NOT EXISTS idx_steps_fixture_ref ON steps(fixture_ref);

            -- Append-only snapshots of test cases and fixtures
            CREATE TABLE IF NOT EXISTS versions (
                id TEXT PRIMARY KEY,
                parent_kind TEXT NOT NULL,
                parent_id TEXT NOT NULL,
                version INTEGER NOT NULL,
                name TEXT NOT NULL,
                playwright_script TEXT,
                steps TEXT NOT NULL DEFAULT '[]',
                created_at INTEGER NOT NULL,
                created_by TEXT,
                reverted_from INTEGER,
                UNIQUE(parent_kind, parent_id, version)
            );

            CREATE TRIGGER IF NOT EXISTS trg_test_cases_versions AFTER DELETE ON test_cases
            BEGIN
                DELETE FROM versions WHERE parent_kind = 'test_case' AND parent_id = OLD.id;
            END;
            CREATE TRIGGER IF NOT EXISTS trg_fixtures_versions AFTER DELETE ON fixtures
            BEGIN
                DELETE FROM versions WHERE parent_kind = 'fixture' AND parent_id = OLD.id;
            END;

            CREATE TABLE IF NOT EXISTS test_results (
                id TEXT PRIMARY KEY,
                project_id TEXT NOT NULL,
                success INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL DEFAULT 'pending',
                browser TEXT NOT NULL,
                command TEXT NOT NULL,
                started_at INTEGER,
                finished_at INTEGER,
                duration_ms INTEGER,
                output TEXT,
                error_message TEXT,
                video_url TEXT,
                screenshot_url TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                FOREIGN KEY(project_id) REFERENCES projects(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_test_results_project ON test_results(project_id, created_at);

            -- test_case_id is kept without a foreign key so history survives deletes
            CREATE TABLE IF NOT EXISTS test_case_executions (
                id TEXT PRIMARY KEY,
                test_result_id TEXT NOT NULL,
                test_case_id TEXT NOT NULL,
                position INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                duration_ms INTEGER,
                retries INTEGER NOT NULL DEFAULT 0,
                error_message TEXT,
                FOREIGN KEY(test_result_id) REFERENCES test_results(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_executions_result ON test_case_executions(test_result_id);

            CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                email TEXT NOT NULL UNIQUE,
                display_name TEXT NOT NULL,
                roles TEXT NOT NULL DEFAULT '[]',
                password_salt TEXT NOT NULL,
                password_hash TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Run `f` inside a transaction. Any error rolls the whole unit back.
    pub(crate) fn transaction<T>(
        &self,
        f: impl FnOnce(&Transaction<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Run a read-only closure against the connection.
    pub(crate) fn read<T>(&self, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let conn = self.conn.lock();
        f(&conn)
    }
}

// ============================================================================
// Row mapping
// ============================================================================

pub(crate) const PROJECT_COLUMNS: &str =
    "id, name, url, environment, description, created_at, updated_at";

pub(crate) const TEST_CASE_COLUMNS: &str =
    "id, project_id, name, status, tags, is_manual, playwright_script, current_version, created_at, updated_at";

pub(crate) const FIXTURE_COLUMNS: &str =
    "id, project_id, name, fixture_type, tags, export_name, playwright_script, current_version, created_at, updated_at";

pub(crate) const STEP_COLUMNS: &str =
    "id, test_case_id, fixture_id, position, action, data, expected, disabled, fixture_ref, playwright_script, created_at, updated_at";

pub(crate) const VERSION_COLUMNS: &str =
    "id, parent_kind, parent_id, version, name, playwright_script, steps, created_at, created_by, reverted_from";

pub(crate) const TEST_RESULT_COLUMNS: &str =
    "id, project_id, success, status, browser, command, started_at, finished_at, duration_ms, output, error_message, video_url, screenshot_url, created_at, updated_at";

pub(crate) const EXECUTION_COLUMNS: &str =
    "id, test_result_id, test_case_id, status, duration_ms, retries, error_message";

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(Error::Internal(msg)))
}

fn parse_column<T: std::str::FromStr<Err = String>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

pub(crate) fn project_from_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        id: row.get(0)?,
        name: row.get(1)?,
        url: row.get(2)?,
        environment: row.get(3)?,
        description: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

pub(crate) fn test_case_from_row(row: &Row<'_>) -> rusqlite::Result<TestCase> {
    Ok(TestCase {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        status: parse_column(row, 3)?,
        tags: json_column(row, 4)?,
        is_manual: row.get(5)?,
        playwright_script: row.get(6)?,
        current_version: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) fn fixture_from_row(row: &Row<'_>) -> rusqlite::Result<Fixture> {
    Ok(Fixture {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        fixture_type: parse_column(row, 3)?,
        tags: json_column(row, 4)?,
        export_name: row.get(5)?,
        playwright_script: row.get(6)?,
        current_version: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

pub(crate) fn step_from_row(row: &Row<'_>) -> rusqlite::Result<Step> {
    Ok(Step {
        id: row.get(0)?,
        test_case_id: row.get(1)?,
        fixture_id: row.get(2)?,
        order: row.get(3)?,
        action: row.get(4)?,
        data: row.get(5)?,
        expected: row.get(6)?,
        disabled: row.get(7)?,
        fixture_ref: row.get(8)?,
        playwright_script: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

pub(crate) fn version_from_row(row: &Row<'_>) -> rusqlite::Result<Version> {
    Ok(Version {
        id: row.get(0)?,
        parent_kind: parse_column(row, 1)?,
        parent_id: row.get(2)?,
        version: row.get(3)?,
        name: row.get(4)?,
        playwright_script: row.get(5)?,
        steps: json_column(row, 6)?,
        created_at: row.get(7)?,
        created_by: row.get(8)?,
        reverted_from: row.get(9)?,
    })
}

pub(crate) fn test_result_from_row(row: &Row<'_>) -> rusqlite::Result<TestResult> {
    Ok(TestResult {
        id: row.get(0)?,
        project_id: row.get(1)?,
        success: row.get(2)?,
        status: parse_column(row, 3)?,
        browser: row.get(4)?,
        command: row.get(5)?,
        started_at: row.get(6)?,
        finished_at: row.get(7)?,
        duration_ms: row.get(8)?,
        output: row.get(9)?,
        error_message: row.get(10)?,
        video_url: row.get(11)?,
        screenshot_url: row.get(12)?,
        created_at: row.get(13)?,
        updated_at: row.get(14)?,
        executions: Vec::new(),
    })
}

pub(crate) fn execution_from_row(row: &Row<'_>) -> rusqlite::Result<TestCaseExecution> {
    Ok(TestCaseExecution {
        id: row.get(0)?,
        test_result_id: row.get(1)?,
        test_case_id: row.get(2)?,
        status: parse_column(row, 3)?,
        duration_ms: row.get(4)?,
        retries: row.get(5)?,
        error_message: row.get(6)?,
    })
}

/// Collect a query into a Vec, propagating row errors.
pub(crate) fn collect_rows<T>(
    rows: impl Iterator<Item = rusqlite::Result<T>>,
) -> Result<Vec<T>> {
    let mut results = Vec::new();
    for row in rows {
        results.push(row?);
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_is_idempotent() {
        let db = Database::open_memory().unwrap();
        db.init_schema().unwrap();
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("testdeck.db");
        let db = Database::open(&path).unwrap();
        drop(db);
        assert!(path.exists());
    }

    #[test]
    fn test_transaction_rolls_back_on_error() {
        let db = Database::open_memory().unwrap();
        let result: Result<()> = db.transaction(|tx| {
            tx.execute(
                "INSERT INTO projects (id, name, created_at, updated_at) VALUES ('p', 'P', 0, 0)",
                [],
            )?;
            Err(Error::validation("abort"))
        });
        assert!(result.is_err());

        let count: i64 = db
            .read(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM projects", [], |r| r.get(0))?))
            .unwrap();
        assert_eq!(count, 0);
    }
}
