//! Playwright command construction

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{RunnerError, RunnerResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    #[default]
    Chromium,
    Firefox,
    Webkit,
}

impl Browser {
    pub fn as_str(&self) -> &'static str {
        match self {
            Browser::Chromium => "chromium",
            Browser::Firefox => "firefox",
            Browser::Webkit => "webkit",
        }
    }
}

impl std::fmt::Display for Browser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Browser {
    type Err = RunnerError;

    fn from_str(s: &str) -> RunnerResult<Self> {
        match s.to_ascii_lowercase().as_str() {
            "chromium" | "chrome" => Ok(Browser::Chromium),
            "firefox" => Ok(Browser::Firefox),
            "webkit" | "safari" => Ok(Browser::Webkit),
            other => Err(RunnerError::InvalidRequest(format!(
                "unknown browser: {}",
                other
            ))),
        }
    }
}

/// One `npx playwright test` invocation
#[derive(Debug, Clone, PartialEq)]
pub struct PlaywrightCommand {
    /// Program that launches playwright, normally `npx`
    pub program: String,
    pub spec_path: PathBuf,
    pub browser: Browser,
    pub headed: bool,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
    pub workers: Option<u32>,
    /// Environment assignments placed before the command
    pub env: Vec<(String, String)>,
}

impl PlaywrightCommand {
    pub fn new(spec_path: impl Into<PathBuf>, browser: Browser) -> Self {
        Self {
            program: "npx".to_string(),
            spec_path: spec_path.into(),
            browser,
            headed: false,
            timeout_ms: None,
            retries: None,
            workers: None,
            env: Vec::new(),
        }
    }

    pub fn program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn headed(mut self, headed: bool) -> Self {
        self.headed = headed;
        self
    }

    pub fn timeout_ms(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn retries(mut self, retries: Option<u32>) -> Self {
        self.retries = retries;
        self
    }

    pub fn workers(mut self, workers: Option<u32>) -> Self {
        self.workers = workers;
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Arguments passed to [`Self::program`]
    pub fn args(&self) -> Vec<String> {
        let mut args = vec![
            "playwright".to_string(),
            "test".to_string(),
            self.spec_path.to_string_lossy().into_owned(),
            format!("--project={}", self.browser),
        ];
        if self.headed {
            args.push("--headed".to_string());
        }
        if let Some(timeout) = self.timeout_ms {
            args.push(format!("--timeout={}", timeout));
        }
        if let Some(retries) = self.retries {
            args.push(format!("--retries={}", retries));
        }
        if let Some(workers) = self.workers {
            args.push(format!("--workers={}", workers));
        }
        args.push("--reporter=json".to_string());
        args
    }

    /// The command as a single shell line, as stored on the run record
    pub fn to_shell_string(&self) -> String {
        let mut parts: Vec<String> = self
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
            .collect();
        parts.push(shell_quote(&self.program));
        parts.extend(self.args().iter().map(|a| shell_quote(a)));
        parts.join(" ")
    }
}

/// POSIX single-quote `value` when it contains anything outside a safe set.
pub fn shell_quote(value: &str) -> String {
    let safe = !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=@%+,".contains(c));
    if safe {
        value.to_string()
    } else {
        format!("'{}'", value.replace('\'', r"'\''"))
    }
}

/// Settings shared by every run
#[derive(Debug, Clone)]
pub struct PlaywrightConfig {
    /// Directory holding `playwright.config` and generated specs
    pub workdir: PathBuf,
    pub npx_program: String,
    pub default_browser: Browser,
    pub base_url: Option<String>,
    pub default_timeout_ms: Option<u64>,
}

impl Default for PlaywrightConfig {
    fn default() -> Self {
        Self {
            workdir: PathBuf::from("playwright"),
            npx_program: "npx".to_string(),
            default_browser: Browser::Chromium,
            base_url: None,
            default_timeout_ms: Some(30_000),
        }
    }
}

const RUNS_DIR: &str = "testdeck-runs";
const SPEC_FILE: &str = "testdeck.spec.ts";

impl PlaywrightConfig {
    /// Spec file of one run, relative to the workdir
    pub fn spec_path(&self, run_key: &str) -> PathBuf {
        PathBuf::from(RUNS_DIR).join(run_key).join(SPEC_FILE)
    }

    /// Absolute directory holding the generated files of one run
    pub fn run_dir(&self, run_key: &str) -> PathBuf {
        self.workdir.join(RUNS_DIR).join(run_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("chromium", Browser::Chromium)]
    #[test_case("Firefox", Browser::Firefox)]
    #[test_case("safari", Browser::Webkit)]
    fn test_browser_parse(input: &str, expected: Browser) {
        assert_eq!(input.parse::<Browser>().unwrap(), expected);
    }

    #[test]
    fn test_unknown_browser() {
        assert!("netscape".parse::<Browser>().is_err());
    }

    #[test]
    fn test_minimal_command() {
        let cmd = PlaywrightCommand::new("tests/run.spec.ts", Browser::Chromium);
        assert_eq!(
            cmd.to_shell_string(),
            "npx playwright test tests/run.spec.ts --project=chromium --reporter=json"
        );
    }

    #[test]
    fn test_full_command() {
        let cmd = PlaywrightCommand::new("tests/run.spec.ts", Browser::Firefox)
            .headed(true)
            .timeout_ms(Some(15000))
            .retries(Some(2))
            .workers(Some(4))
            .env("BASE_URL", "https://shop.example.com");
        assert_eq!(
            cmd.to_shell_string(),
            "BASE_URL=https://shop.example.com npx playwright test tests/run.spec.ts --project=firefox --headed --timeout=15000 --retries=2 --workers=4 --reporter=json"
        );
    }

    #[test_case("plain", "plain" ; "safe value")]
    #[test_case("has space", "'has space'" ; "space")]
    #[test_case("it's", r"'it'\''s'" ; "single quote")]
    #[test_case("", "''" ; "empty")]
    #[test_case("a;rm -rf /", "'a;rm -rf /'" ; "metacharacters")]
    fn test_shell_quote(input: &str, expected: &str) {
        assert_eq!(shell_quote(input), expected);
    }

    #[test]
    fn test_quoted_env_value() {
        let cmd = PlaywrightCommand::new("a.spec.ts", Browser::Webkit)
            .env("BASE_URL", "http://localhost:3000/?q=a b");
        assert!(cmd
            .to_shell_string()
            .starts_with("BASE_URL='http://localhost:3000/?q=a b' npx"));
    }

    #[test]
    fn test_spec_path_layout() {
        let config = PlaywrightConfig {
            workdir: PathBuf::from("/srv/pw"),
            ..Default::default()
        };
        assert_eq!(
            config.spec_path("abc"),
            PathBuf::from("testdeck-runs/abc/testdeck.spec.ts")
        );
        assert_eq!(
            config.workdir.join(config.spec_path("abc")),
            config.run_dir("abc").join("testdeck.spec.ts")
        );
    }
}
