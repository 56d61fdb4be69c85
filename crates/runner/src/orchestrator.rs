//! Run orchestration
//!
//! `start` validates the request, writes the spec file, stores a pending
//! TestResult and then either hands execution to a background task or
//! awaits it. State transitions are enforced by the store.

use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use testdeck_common::{
    Database, Error, NewTestResult, RunOutcome, TestCaseStatus, TestResult,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::error::{RunnerError, RunnerResult};
use crate::playwright::{Browser, PlaywrightCommand, PlaywrightConfig};
use crate::poll::{poll_until, PollOutcome};
use crate::process::{PlaywrightRunner, ProcessOutput};
use crate::report::parse_report;
use crate::script::{render_spec, CaseWithSteps, FixtureIndex};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Return the TestResult id immediately
    #[default]
    Background,
    /// Return once the runner process has finished
    Wait,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunRequest {
    /// Empty selects every automated, non-deprecated test case
    #[serde(default)]
    pub test_case_ids: Vec<String>,
    #[serde(default)]
    pub browser: Option<Browser>,
    #[serde(default)]
    pub headed: bool,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub retries: Option<u32>,
    #[serde(default)]
    pub workers: Option<u32>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub mode: RunMode,
}

#[derive(Debug, Clone)]
pub enum RunStarted {
    Background { test_result_id: String },
    Finished(TestResult),
}

/// A run that has been recorded but not yet executed
struct PreparedRun {
    test_result_id: String,
    command: PlaywrightCommand,
}

#[derive(Clone)]
pub struct Orchestrator {
    db: Database,
    runner: Arc<dyn PlaywrightRunner>,
    config: Arc<PlaywrightConfig>,
}

impl Orchestrator {
    pub fn new(db: Database, runner: Arc<dyn PlaywrightRunner>, config: PlaywrightConfig) -> Self {
        Self {
            db,
            runner,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &PlaywrightConfig {
        &self.config
    }

    pub async fn start(&self, project_id: &str, request: RunRequest) -> RunnerResult<RunStarted> {
        let prepared = self.prepare(project_id, &request)?;

        match request.mode {
            RunMode::Background => {
                let this = self.clone();
                let id = prepared.test_result_id.clone();
                tokio::spawn(async move {
                    let _ = this.execute_or_fail(prepared).await;
                });
                Ok(RunStarted::Background { test_result_id: id })
            }
            RunMode::Wait => Ok(RunStarted::Finished(self.execute_or_fail(prepared).await?)),
        }
    }

    /// Run `prepared`; when its status writes fail, try once more to leave
    /// the record `failed` so pollers see a terminal state.
    async fn execute_or_fail(&self, prepared: PreparedRun) -> RunnerResult<TestResult> {
        let id = prepared.test_result_id.clone();
        match self.execute(prepared).await {
            Ok(result) => Ok(result),
            Err(e) => {
                error!("Failed to record outcome of run {}: {}", id, e);
                let message = format!("failed to record run outcome: {}", e);
                if let Err(fail) = self.db.fail_test_result(&id, message) {
                    error!("Could not mark run {} as failed: {}", id, fail);
                }
                Err(e)
            }
        }
    }

    /// Poll the store until the run reaches a terminal state.
    pub async fn wait_for(
        &self,
        test_result_id: &str,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> RunnerResult<Option<TestResult>> {
        let outcome = poll_until(
            interval,
            cancel,
            move || async move { self.db.get_test_result(test_result_id) },
            |r| r.status.is_terminal(),
        )
        .await?;
        Ok(match outcome {
            PollOutcome::Done(result) => Some(result),
            PollOutcome::Cancelled(_) => None,
        })
    }

    fn prepare(&self, project_id: &str, request: &RunRequest) -> RunnerResult<PreparedRun> {
        let project = self.db.get_project(project_id)?;
        let cases = self.select_cases(project_id, &request.test_case_ids)?;
        let fixtures = self.collect_fixtures(&cases)?;

        let browser = request.browser.unwrap_or(self.config.default_browser);
        let run_key = uuid::Uuid::new_v4().to_string();
        let mut command = PlaywrightCommand::new(self.config.spec_path(&run_key), browser)
            .program(self.config.npx_program.clone())
            .headed(request.headed)
            .timeout_ms(request.timeout_ms.or(self.config.default_timeout_ms))
            .retries(request.retries)
            .workers(request.workers);
        let base_url = request
            .base_url
            .clone()
            .or_else(|| project.url.clone())
            .or_else(|| self.config.base_url.clone());
        if let Some(base_url) = base_url {
            command = command.env("BASE_URL", base_url);
        }

        let record = self.db.create_test_result(NewTestResult {
            project_id: project_id.to_string(),
            browser: browser.to_string(),
            command: command.to_shell_string(),
            test_case_ids: cases.iter().map(|c| c.item.id.clone()).collect(),
        })?;

        let spec = render_spec(&project.name, &cases, &fixtures);
        let written = std::fs::create_dir_all(self.config.run_dir(&run_key))
            .and_then(|_| std::fs::write(self.config.workdir.join(&command.spec_path), spec));
        if let Err(e) = written {
            warn!("Could not write spec file for run {}: {}", record.id, e);
            self.db
                .fail_test_result(&record.id, format!("failed to write spec file: {}", e))?;
            return Err(RunnerError::Io(e));
        }

        info!(
            "Prepared run {} with {} test case(s) on {}",
            record.id,
            cases.len(),
            browser
        );
        Ok(PreparedRun {
            test_result_id: record.id,
            command,
        })
    }

    fn select_cases(&self, project_id: &str, ids: &[String]) -> RunnerResult<Vec<CaseWithSteps>> {
        if ids.is_empty() {
            let cases: Vec<CaseWithSteps> = self
                .db
                .list_test_cases(project_id, &Default::default())?
                .into_iter()
                .filter(|c| !c.is_manual && c.status != TestCaseStatus::Deprecated)
                .map(|c| self.db.get_test_case_with_steps(&c.id))
                .collect::<testdeck_common::Result<_>>()?;
            if cases.is_empty() {
                return Err(RunnerError::InvalidRequest(
                    "project has no automated test cases to run".to_string(),
                ));
            }
            return Ok(cases);
        }

        let mut seen = HashSet::new();
        let mut cases = Vec::with_capacity(ids.len());
        for id in ids {
            if !seen.insert(id.as_str()) {
                continue;
            }
            let case = self.db.get_test_case_with_steps(id)?;
            if case.item.project_id != project_id {
                return Err(RunnerError::InvalidRequest(format!(
                    "test case {} does not belong to project {}",
                    id, project_id
                )));
            }
            cases.push(case);
        }
        Ok(cases)
    }

    /// Every fixture reachable from the cases' steps
    fn collect_fixtures(&self, cases: &[CaseWithSteps]) -> RunnerResult<FixtureIndex> {
        let mut index = FixtureIndex::new();
        let mut queue: VecDeque<String> = cases
            .iter()
            .flat_map(|c| c.steps.iter())
            .filter_map(|s| s.fixture_ref.clone())
            .collect();

        while let Some(id) = queue.pop_front() {
            if index.contains_key(&id) {
                continue;
            }
            match self.db.get_fixture_with_steps(&id) {
                Ok(fixture) => {
                    queue.extend(fixture.steps.iter().filter_map(|s| s.fixture_ref.clone()));
                    index.insert(id, fixture);
                }
                Err(Error::NotFound { .. }) => {
                    warn!("Step references missing fixture {}", id);
                }
                Err(e) => return Err(e.into()),
            }
        }
        Ok(index)
    }

    async fn execute(&self, prepared: PreparedRun) -> RunnerResult<TestResult> {
        let id = prepared.test_result_id;
        self.db.mark_running(&id)?;

        let outcome = match self.runner.run(&prepared.command).await {
            Ok(output) => outcome_from_output(&id, output),
            Err(e) => {
                warn!("Runner for {} failed: {}", id, e);
                RunOutcome {
                    success: false,
                    error_message: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };

        let result = self.db.finish_test_result(&id, outcome)?;
        if result.success {
            info!("Run {} completed", id);
        } else {
            error!(
                "Run {} failed: {}",
                id,
                result.error_message.as_deref().unwrap_or("unknown error")
            );
        }
        Ok(result)
    }
}

fn outcome_from_output(id: &str, output: ProcessOutput) -> RunOutcome {
    let success = output.success();
    let report = match parse_report(&output.stdout) {
        Ok(report) => report,
        Err(e) => {
            debug!("No usable report for run {}: {}", id, e);
            Default::default()
        }
    };

    let error_message = if success {
        None
    } else if !output.stderr.trim().is_empty() {
        Some(output.stderr.trim().to_string())
    } else if !report.errors.is_empty() {
        Some(report.errors.join("\n"))
    } else {
        Some(match output.exit_code {
            Some(code) => format!("runner exited with code {}", code),
            None => "runner was terminated by a signal".to_string(),
        })
    };

    RunOutcome {
        success,
        output: Some(output.stdout),
        error_message,
        duration_ms: Some(output.duration_ms),
        video_url: report.video,
        screenshot_url: report.screenshot,
        executions: report.cases,
    }
}
