//! Run commands
//!
//! `start --wait` submits a background run and polls its record until it
//! reaches a terminal state. Ctrl-C stops polling; the run keeps going on
//! the server.

use anyhow::{anyhow, Result};
use clap::Subcommand;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::time::Duration;
use testdeck_common::{ExecutionStatus, TestResult};
use testdeck_runner::{poll_until, Browser, PollOutcome, RunMode, RunRequest, RUN_POLL_INTERVAL};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::ApiClient;
use crate::output::{print_item, print_json, print_list, print_success, print_warning, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum RunCommands {
    /// Start a Playwright run
    Start {
        project: String,

        /// Test case IDs; all automated, non-deprecated cases when omitted
        #[arg(long = "case")]
        cases: Vec<String>,

        /// chromium, firefox or webkit
        #[arg(long, value_parser = parse_browser)]
        browser: Option<Browser>,

        #[arg(long)]
        headed: bool,

        /// Overrides the project URL
        #[arg(long)]
        base_url: Option<String>,

        /// Per-test timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        #[arg(long)]
        retries: Option<u32>,

        #[arg(long)]
        workers: Option<u32>,

        /// Poll until the run finishes
        #[arg(short, long)]
        wait: bool,

        /// Poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,
    },

    /// List recent runs of a project
    List {
        project: String,

        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show a run and its per-test-case results
    Get { id: String },

    /// Delete a run record
    Delete { id: String },
}

fn parse_browser(raw: &str) -> Result<Browser, String> {
    raw.parse().map_err(|e: testdeck_runner::RunnerError| e.to_string())
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StartResponse {
    Accepted {
        #[serde(rename = "testResultId")]
        test_result_id: String,
    },
    Finished(Box<TestResult>),
}

#[derive(serde::Serialize)]
#[serde(transparent)]
struct ExecutionRow<'a>(&'a testdeck_common::TestCaseExecution);

impl TableDisplay for ExecutionRow<'_> {
    fn headers() -> Vec<&'static str> {
        vec!["Test case", "Status", "Duration", "Retries", "Error"]
    }

    fn row(&self) -> Vec<String> {
        let e = self.0;
        let status = match e.status {
            ExecutionStatus::Passed => e.status.to_string().green().to_string(),
            ExecutionStatus::Failed => e.status.to_string().red().to_string(),
            _ => e.status.to_string().dimmed().to_string(),
        };
        vec![
            e.test_case_id.clone(),
            status,
            e.duration_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string()),
            e.retries.to_string(),
            e.error_message
                .as_deref()
                .map(|m| crate::output::truncate(m, 60))
                .unwrap_or_else(|| "-".to_string()),
        ]
    }
}

fn print_result(result: &TestResult, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(result),
        OutputFormat::Table => {
            print_item(result, format);
            let rows: Vec<ExecutionRow> = result.executions.iter().map(ExecutionRow).collect();
            print_list(&rows, format);
            if let Some(error) = &result.error_message {
                println!("{} {}", "Error:".red().bold(), error);
            }
        }
    }
}

async fn wait_for_run(client: &ApiClient, id: &str, interval: Duration) -> Result<Option<TestResult>> {
    let cancel = CancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.cyan} {msg} [{elapsed}]")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!("Run {} pending", id));

    let path = format!("/api/test-results/{}", id);
    let path = path.as_str();
    let spinner_ref = &spinner;
    let outcome = poll_until(
        interval,
        &cancel,
        move || async move {
            let result: TestResult = client.get(path).await?;
            debug!("Run {} is {}", id, result.status);
            spinner_ref.set_message(format!("Run {} {}", id, result.status));
            Ok::<_, anyhow::Error>(result)
        },
        |r| r.status.is_terminal(),
    )
    .await;
    spinner.finish_and_clear();

    match outcome? {
        PollOutcome::Done(result) => Ok(Some(result)),
        PollOutcome::Cancelled(_) => Ok(None),
    }
}

pub async fn execute(cmd: RunCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        RunCommands::Start {
            project,
            cases,
            browser,
            headed,
            base_url,
            timeout_ms,
            retries,
            workers,
            wait,
            interval,
        } => {
            let request = RunRequest {
                test_case_ids: cases,
                browser,
                headed,
                timeout_ms,
                retries,
                workers,
                base_url,
                mode: RunMode::Background,
            };
            let started: StartResponse = client
                .post(
                    &format!("/api/projects/{}/runs", project),
                    &serde_json::to_value(&request)?,
                )
                .await?;

            let id = match started {
                StartResponse::Finished(result) => {
                    print_result(&result, format);
                    return Ok(());
                }
                StartResponse::Accepted { test_result_id } => test_result_id,
            };

            if !wait {
                match format {
                    OutputFormat::Json => print_json(&serde_json::json!({ "testResultId": id })),
                    OutputFormat::Table => print_success(&format!("Run {} started", id)),
                }
                return Ok(());
            }

            let interval = interval.map(Duration::from_secs).unwrap_or(RUN_POLL_INTERVAL);
            let Some(result) = wait_for_run(&client, &id, interval).await? else {
                print_warning(&format!("Stopped waiting; run {} continues on the server", id));
                return Ok(());
            };
            print_result(&result, format);
            if !result.success {
                return Err(anyhow!("run {} failed", id));
            }
        }

        RunCommands::List { project, limit } => {
            let mut path = format!("/api/projects/{}/test-results", project);
            if let Some(limit) = limit {
                path = format!("{}?limit={}", path, limit);
            }
            let results: Vec<TestResult> = client.get(&path).await?;
            print_list(&results, format);
        }

        RunCommands::Get { id } => {
            let result: TestResult = client.get(&format!("/api/test-results/{}", id)).await?;
            print_result(&result, format);
        }

        RunCommands::Delete { id } => {
            client.delete(&format!("/api/test-results/{}", id)).await?;
            print_success(&format!("Run {} deleted", id));
        }
    }
    Ok(())
}
