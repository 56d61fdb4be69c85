//! Playwright JSON reporter parsing

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use testdeck_common::{ExecutionStatus, ExecutionUpdate};

use crate::error::{RunnerError, RunnerResult};

/// Trailing `[<id>]` of a generated test title
static TITLE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]\s*$").expect("valid regex"));

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport {
    #[serde(default)]
    suites: Vec<JsonSuite>,
    #[serde(default)]
    errors: Vec<JsonError>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonSuite {
    #[serde(default)]
    specs: Vec<JsonSpec>,
    #[serde(default)]
    suites: Vec<JsonSuite>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonSpec {
    #[serde(default)]
    title: String,
    #[serde(default)]
    tests: Vec<JsonTest>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonTest {
    #[serde(default)]
    results: Vec<JsonResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonResult {
    #[serde(default)]
    status: String,
    #[serde(default)]
    duration: i64,
    #[serde(default)]
    retry: i64,
    #[serde(default)]
    error: Option<JsonError>,
    #[serde(default)]
    attachments: Vec<JsonAttachment>,
}

#[derive(Debug, Default, Deserialize)]
struct JsonError {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonAttachment {
    #[serde(default)]
    name: String,
    #[serde(default)]
    content_type: String,
    #[serde(default)]
    path: Option<String>,
}

/// Per-test-case outcome extracted from a report
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub cases: Vec<ExecutionUpdate>,
    /// First video attachment in the run
    pub video: Option<String>,
    /// First screenshot attachment in the run
    pub screenshot: Option<String>,
    /// Errors reported outside any test, e.g. a spec that failed to load
    pub errors: Vec<String>,
}

/// The test case id embedded in a generated test title
pub fn test_case_id_from_title(title: &str) -> Option<&str> {
    TITLE_ID
        .captures(title)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn execution_status(status: &str) -> ExecutionStatus {
    match status {
        "passed" => ExecutionStatus::Passed,
        "skipped" => ExecutionStatus::Skipped,
        // failed, timedOut, interrupted
        _ => ExecutionStatus::Failed,
    }
}

fn collect_specs<'a>(suite: &'a JsonSuite, out: &mut Vec<&'a JsonSpec>) {
    out.extend(suite.specs.iter());
    for child in &suite.suites {
        collect_specs(child, out);
    }
}

/// Parse reporter output. Anything printed before the JSON document is
/// ignored.
pub fn parse_report(stdout: &str) -> RunnerResult<RunReport> {
    let start = stdout
        .find('{')
        .ok_or_else(|| RunnerError::Report("no JSON document in runner output".to_string()))?;
    let end = stdout
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| RunnerError::Report("unterminated JSON document".to_string()))?;
    let report: JsonReport = serde_json::from_str(&stdout[start..=end])
        .map_err(|e| RunnerError::Report(e.to_string()))?;

    let mut specs = Vec::new();
    for suite in &report.suites {
        collect_specs(suite, &mut specs);
    }

    let mut parsed = RunReport {
        errors: report
            .errors
            .iter()
            .filter_map(|e| e.message.clone())
            .collect(),
        ..Default::default()
    };

    for spec in specs {
        let Some(test_case_id) = test_case_id_from_title(&spec.title) else {
            continue;
        };
        let results: Vec<&JsonResult> = spec.tests.iter().flat_map(|t| t.results.iter()).collect();
        let Some(last) = results.iter().max_by_key(|r| r.retry) else {
            continue;
        };

        for attachment in results.iter().flat_map(|r| r.attachments.iter()) {
            let Some(path) = &attachment.path else {
                continue;
            };
            if parsed.video.is_none()
                && (attachment.name == "video" || attachment.content_type.starts_with("video/"))
            {
                parsed.video = Some(path.clone());
            }
            if parsed.screenshot.is_none()
                && (attachment.name == "screenshot" || attachment.content_type.starts_with("image/"))
            {
                parsed.screenshot = Some(path.clone());
            }
        }

        parsed.cases.push(ExecutionUpdate {
            test_case_id: test_case_id.to_string(),
            status: execution_status(&last.status),
            duration_ms: Some(results.iter().map(|r| r.duration).sum()),
            retries: last.retry,
            error_message: results
                .iter()
                .rev()
                .find_map(|r| r.error.as_ref().and_then(|e| e.message.clone())),
        });
    }

    Ok(parsed)
}
