//! Test run records and their state machine

use crate::catalog::get_project_in;
use crate::db::{
    collect_rows, execution_from_row, test_result_from_row, EXECUTION_COLUMNS, TEST_RESULT_COLUMNS,
};
use crate::types::*;
use crate::{Database, Error, Result};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

fn load_result(conn: &Connection, id: &str) -> Result<TestResult> {
    let mut result = conn
        .query_row(
            &format!("SELECT {} FROM test_results WHERE id = ?1", TEST_RESULT_COLUMNS),
            params![id],
            test_result_from_row,
        )
        .optional()?
        .ok_or_else(|| Error::not_found("test_result", id))?;

    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM test_case_executions WHERE test_result_id = ?1 ORDER BY position ASC",
        EXECUTION_COLUMNS
    ))?;
    result.executions = collect_rows(stmt.query_map(params![id], execution_from_row)?)?;
    Ok(result)
}

fn ensure_transition(result: &TestResult, next: RunStatus) -> Result<()> {
    if !result.status.can_transition_to(next) {
        return Err(Error::InvalidStateTransition {
            from: result.status.to_string(),
            to: next.to_string(),
        });
    }
    Ok(())
}

impl Database {
    /// Record a pending run with one pending execution per test case.
    pub fn create_test_result(&self, run: NewTestResult) -> Result<TestResult> {
        if run.test_case_ids.is_empty() {
            return Err(Error::validation("a run needs at least one test case"));
        }

        let id = new_id();
        self.transaction(|tx| {
            let project: Option<String> = tx
                .query_row(
                    "SELECT id FROM projects WHERE id = ?1",
                    params![run.project_id],
                    |row| row.get(0),
                )
                .optional()?;
            if project.is_none() {
                return Err(Error::not_found("project", &run.project_id));
            }

            let now = now_millis();
            tx.execute(
                "INSERT INTO test_results (id, project_id, success, status, browser, command, created_at, updated_at)
                 VALUES (?1, ?2, 0, 'pending', ?3, ?4, ?5, ?5)",
                params![id, run.project_id, run.browser, run.command, now],
            )?;
            for (position, case_id) in run.test_case_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO test_case_executions (id, test_result_id, test_case_id, position, status, retries)
                     VALUES (?1, ?2, ?3, ?4, 'pending', 0)",
                    params![new_id(), id, case_id, position as i64],
                )?;
            }
            Ok(())
        })?;

        info!(
            "Created test result {} for {} test case(s)",
            id,
            run.test_case_ids.len()
        );
        self.get_test_result(&id)
    }

    pub fn get_test_result(&self, id: &str) -> Result<TestResult> {
        self.read(|conn| load_result(conn, id))
    }

    /// Runs of a project, newest first
    pub fn list_test_results(&self, project_id: &str, limit: Option<usize>) -> Result<Vec<TestResult>> {
        self.read(|conn| {
            get_project_in(conn, project_id)?;
            let ids: Vec<String> = {
                let mut stmt = conn.prepare(
                    "SELECT id FROM test_results WHERE project_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2",
                )?;
                let limit = limit.map(|l| l as i64).unwrap_or(-1);
                let rows = stmt.query_map(params![project_id, limit], |row| row.get(0))?;
                collect_rows(rows)?
            };
            ids.iter().map(|id| load_result(conn, id)).collect()
        })
    }

    /// `pending -> running`
    pub fn mark_running(&self, id: &str) -> Result<TestResult> {
        self.transaction(|tx| {
            let result = load_result(tx, id)?;
            ensure_transition(&result, RunStatus::Running)?;
            let now = now_millis();
            tx.execute(
                "UPDATE test_results SET status = 'running', started_at = ?1, updated_at = ?1 WHERE id = ?2",
                params![now, id],
            )?;
            debug!("Test result {} is running", id);
            load_result(tx, id)
        })
    }

    /// Write the terminal state of a run. The status is `completed` when
    /// the outcome succeeded and `failed` otherwise. A run that already
    /// reached a terminal state is never overwritten.
    pub fn finish_test_result(&self, id: &str, outcome: RunOutcome) -> Result<TestResult> {
        let next = if outcome.success {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };

        self.transaction(|tx| {
            let result = load_result(tx, id)?;
            ensure_transition(&result, next)?;

            let now = now_millis();
            let duration = outcome
                .duration_ms
                .or_else(|| result.started_at.map(|s| now - s));
            tx.execute(
                "UPDATE test_results SET status = ?1, success = ?2, finished_at = ?3, duration_ms = ?4, output = ?5,
                 error_message = ?6, video_url = ?7, screenshot_url = ?8, updated_at = ?3 WHERE id = ?9",
                params![
                    next.to_string(),
                    outcome.success,
                    now,
                    duration,
                    outcome.output,
                    outcome.error_message,
                    outcome.video_url,
                    outcome.screenshot_url,
                    id,
                ],
            )?;

            for update in &outcome.executions {
                let changed = tx.execute(
                    "UPDATE test_case_executions SET status = ?1, duration_ms = ?2, retries = ?3, error_message = ?4
                     WHERE test_result_id = ?5 AND test_case_id = ?6",
                    params![
                        update.status.to_string(),
                        update.duration_ms,
                        update.retries,
                        update.error_message,
                        id,
                        update.test_case_id,
                    ],
                )?;
                if changed == 0 {
                    warn!(
                        "Test result {} has no execution for test case {}",
                        id, update.test_case_id
                    );
                }
            }

            // Anything the report did not mention did not run.
            let leftover = if outcome.success {
                ExecutionStatus::Skipped
            } else {
                ExecutionStatus::Failed
            };
            tx.execute(
                "UPDATE test_case_executions SET status = ?1 WHERE test_result_id = ?2 AND status = 'pending'",
                params![leftover.to_string(), id],
            )?;

            info!("Test result {} finished as {}", id, next);
            load_result(tx, id)
        })
    }

    /// Move a run straight to `failed`, from pending or running.
    pub fn fail_test_result(&self, id: &str, error_message: impl Into<String>) -> Result<TestResult> {
        self.finish_test_result(
            id,
            RunOutcome {
                success: false,
                error_message: Some(error_message.into()),
                ..Default::default()
            },
        )
    }

    /// Delete a finished run. Pending and running runs still have a task
    /// that writes to them, so deleting one is a `Conflict`.
    pub fn delete_test_result(&self, id: &str) -> Result<()> {
        self.transaction(|tx| {
            let result = load_result(tx, id)?;
            if !result.status.is_terminal() {
                return Err(Error::Conflict(format!(
                    "test result {} is still {}",
                    id, result.status
                )));
            }
            tx.execute("DELETE FROM test_results WHERE id = ?1", params![id])?;
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> (Database, TestResult) {
        let db = Database::open_memory().unwrap();
        let project = db
            .create_project(NewProject {
                name: "Shop".to_string(),
                ..Default::default()
            })
            .unwrap();
        let run = db
            .create_test_result(NewTestResult {
                project_id: project.id,
                browser: "chromium".to_string(),
                command: "npx playwright test".to_string(),
                test_case_ids: vec!["tc-1".to_string(), "tc-2".to_string()],
            })
            .unwrap();
        (db, run)
    }

    #[test]
    fn test_new_run_is_pending() {
        let (_, run) = setup();
        assert_eq!(run.status, RunStatus::Pending);
        assert!(!run.success);
        assert_eq!(run.executions.len(), 2);
        assert!(run
            .executions
            .iter()
            .all(|e| e.status == ExecutionStatus::Pending));
    }

    #[test]
    fn test_run_lifecycle() {
        let (db, run) = setup();
        let running = db.mark_running(&run.id).unwrap();
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.started_at.is_some());

        let done = db
            .finish_test_result(
                &run.id,
                RunOutcome {
                    success: true,
                    output: Some("2 passed".to_string()),
                    executions: vec![ExecutionUpdate {
                        test_case_id: "tc-1".to_string(),
                        status: ExecutionStatus::Passed,
                        duration_ms: Some(1200),
                        ..Default::default()
                    }],
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(done.status, RunStatus::Completed);
        assert!(done.success);
        assert!(done.finished_at.is_some());
        assert_eq!(done.executions[0].status, ExecutionStatus::Passed);
        assert_eq!(done.executions[0].duration_ms, Some(1200));
        assert_eq!(done.executions[1].status, ExecutionStatus::Skipped);
    }

    #[test]
    fn test_terminal_runs_are_final() {
        let (db, run) = setup();
        db.mark_running(&run.id).unwrap();
        db.fail_test_result(&run.id, "browser crashed").unwrap();

        let err = db
            .finish_test_result(
                &run.id,
                RunOutcome {
                    success: true,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));
        assert!(matches!(
            db.mark_running(&run.id),
            Err(Error::InvalidStateTransition { .. })
        ));

        let stored = db.get_test_result(&run.id).unwrap();
        assert_eq!(stored.status, RunStatus::Failed);
        assert_eq!(stored.error_message.as_deref(), Some("browser crashed"));
        assert!(stored
            .executions
            .iter()
            .all(|e| e.status == ExecutionStatus::Failed));
    }

    #[test]
    fn test_pending_can_fail_but_not_complete() {
        let (db, run) = setup();
        let err = db
            .finish_test_result(
                &run.id,
                RunOutcome {
                    success: true,
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, Error::InvalidStateTransition { .. }));

        let failed = db.fail_test_result(&run.id, "npx not found").unwrap();
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.started_at, None);
    }

    #[test]
    fn test_empty_run_is_rejected() {
        let (db, run) = setup();
        let err = db
            .create_test_result(NewTestResult {
                project_id: run.project_id.clone(),
                browser: "chromium".to_string(),
                command: String::new(),
                test_case_ids: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_list_is_newest_first() {
        let (db, first) = setup();
        let second = db
            .create_test_result(NewTestResult {
                project_id: first.project_id.clone(),
                browser: "firefox".to_string(),
                command: String::new(),
                test_case_ids: vec!["tc-3".to_string()],
            })
            .unwrap();
        let runs = db.list_test_results(&first.project_id, None).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second.id);

        let limited = db.list_test_results(&first.project_id, Some(1)).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_list_for_unknown_project_is_not_found() {
        let (db, _) = setup();
        let err = db.list_test_results("missing", None).unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
    }

    #[test]
    fn test_only_finished_runs_can_be_deleted() {
        let (db, run) = setup();
        assert!(matches!(db.delete_test_result(&run.id), Err(Error::Conflict(_))));
        db.mark_running(&run.id).unwrap();
        assert!(matches!(db.delete_test_result(&run.id), Err(Error::Conflict(_))));
        assert_eq!(db.get_test_result(&run.id).unwrap().status, RunStatus::Running);

        db.fail_test_result(&run.id, "cancelled").unwrap();
        db.delete_test_result(&run.id).unwrap();
        assert!(matches!(
            db.get_test_result(&run.id),
            Err(Error::NotFound { .. })
        ));
        assert!(matches!(
            db.delete_test_result(&run.id),
            Err(Error::NotFound { .. })
        ));
    }
}
