//! Runner process abstraction

use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::{RunnerError, RunnerResult};
use crate::playwright::PlaywrightCommand;

/// Captured result of one runner invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProcessOutput {
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration_ms: i64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Something that can execute a Playwright command
#[async_trait]
pub trait PlaywrightRunner: Send + Sync {
    async fn run(&self, command: &PlaywrightCommand) -> RunnerResult<ProcessOutput>;
}

/// Runs commands as a child process via tokio
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    workdir: PathBuf,
    /// Upper bound on wall time for one invocation
    deadline: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

#[async_trait]
impl PlaywrightRunner for ProcessRunner {
    async fn run(&self, command: &PlaywrightCommand) -> RunnerResult<ProcessOutput> {
        let mut cmd = Command::new(&command.program);
        cmd.args(command.args())
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running Playwright: {}", command.to_shell_string());
        let start = Instant::now();

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => RunnerError::PlaywrightNotFound,
            _ => RunnerError::Spawn {
                program: command.program.clone(),
                reason: e.to_string(),
            },
        })?;

        let output = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, child.wait_with_output())
                .await
                .map_err(|_| RunnerError::Timeout(deadline.as_millis() as u64))??,
            None => child.wait_with_output().await?,
        };

        Ok(ProcessOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            duration_ms: start.elapsed().as_millis() as i64,
        })
    }
}
