//! Core types for Testdeck

use serde::{Deserialize, Deserializer, Serialize};

/// Current time as Unix epoch milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Distinguishes an absent field from an explicit `null` in patch bodies.
pub(crate) fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    T::deserialize(deserializer).map(Some)
}

// ============================================================================
// Projects
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub name: String,
    pub url: Option<String>,
    pub environment: Option<String>,
    pub description: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub environment: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ProjectPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub environment: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub description: Option<Option<String>>,
}

// ============================================================================
// Test cases and fixtures
// ============================================================================

/// Test case lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestCaseStatus {
    Draft,
    Active,
    Deprecated,
}

impl Default for TestCaseStatus {
    fn default() -> Self {
        Self::Draft
    }
}

impl std::fmt::Display for TestCaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Active => write!(f, "active"),
            Self::Deprecated => write!(f, "deprecated"),
        }
    }
}

impl std::str::FromStr for TestCaseStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "active" => Ok(Self::Active),
            "deprecated" => Ok(Self::Deprecated),
            _ => Err(format!("unknown test case status: {}", s)),
        }
    }
}

/// Role a fixture plays in a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixtureType {
    Setup,
    Teardown,
    Shared,
}

impl Default for FixtureType {
    fn default() -> Self {
        Self::Shared
    }
}

impl std::fmt::Display for FixtureType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Setup => write!(f, "setup"),
            Self::Teardown => write!(f, "teardown"),
            Self::Shared => write!(f, "shared"),
        }
    }
}

impl std::str::FromStr for FixtureType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "setup" => Ok(Self::Setup),
            "teardown" => Ok(Self::Teardown),
            "shared" => Ok(Self::Shared),
            _ => Err(format!("unknown fixture type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub status: TestCaseStatus,
    pub tags: Vec<String>,
    pub is_manual: bool,
    pub playwright_script: Option<String>,
    pub current_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewTestCase {
    pub name: String,
    #[serde(default)]
    pub status: TestCaseStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub is_manual: bool,
    #[serde(default)]
    pub playwright_script: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct TestCasePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<TestCaseStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub is_manual: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub playwright_script: Option<Option<String>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub fixture_type: FixtureType,
    pub tags: Vec<String>,
    pub export_name: Option<String>,
    pub playwright_script: Option<String>,
    pub current_version: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewFixture {
    pub name: String,
    #[serde(default)]
    pub fixture_type: FixtureType,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub export_name: Option<String>,
    #[serde(default)]
    pub playwright_script: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FixturePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub fixture_type: Option<FixtureType>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub export_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub playwright_script: Option<Option<String>>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// An entity together with its ordered steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithSteps<T> {
    #[serde(flatten)]
    pub item: T,
    pub steps: Vec<Step>,
}

// ============================================================================
// Steps
// ============================================================================

/// Entity type that owns a step list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentKind {
    TestCase,
    Fixture,
}

impl ParentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParentKind::TestCase => "test_case",
            ParentKind::Fixture => "fixture",
        }
    }

    pub(crate) fn table(&self) -> &'static str {
        match self {
            ParentKind::TestCase => "test_cases",
            ParentKind::Fixture => "fixtures",
        }
    }

    pub(crate) fn step_column(&self) -> &'static str {
        match self {
            ParentKind::TestCase => "test_case_id",
            ParentKind::Fixture => "fixture_id",
        }
    }
}

impl std::fmt::Display for ParentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ParentKind {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "test_case" => Ok(Self::TestCase),
            "fixture" => Ok(Self::Fixture),
            _ => Err(format!("unknown parent kind: {}", s)),
        }
    }
}

/// Reference to a test case or fixture owning steps
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepParent {
    pub kind: ParentKind,
    pub id: String,
}

impl StepParent {
    pub fn test_case(id: impl Into<String>) -> Self {
        Self {
            kind: ParentKind::TestCase,
            id: id.into(),
        }
    }

    pub fn fixture(id: impl Into<String>) -> Self {
        Self {
            kind: ParentKind::Fixture,
            id: id.into(),
        }
    }
}

impl std::fmt::Display for StepParent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub id: String,
    pub test_case_id: Option<String>,
    pub fixture_id: Option<String>,
    pub order: i64,
    pub action: String,
    pub data: Option<String>,
    pub expected: Option<String>,
    pub disabled: bool,
    /// Fixture invoked by this step
    pub fixture_ref: Option<String>,
    pub playwright_script: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Step {
    pub fn parent(&self) -> StepParent {
        match (&self.test_case_id, &self.fixture_id) {
            (Some(id), _) => StepParent::test_case(id.clone()),
            (None, Some(id)) => StepParent::fixture(id.clone()),
            // The schema CHECK forbids rows with neither parent.
            (None, None) => StepParent::test_case(String::new()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct NewStep {
    pub action: String,
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub fixture_ref: Option<String>,
    #[serde(default)]
    pub playwright_script: Option<String>,
}

impl NewStep {
    pub fn new(action: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StepPatch {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub data: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub expected: Option<Option<String>>,
    #[serde(default)]
    pub disabled: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub fixture_ref: Option<Option<String>>,
    #[serde(default, deserialize_with = "deserialize_some")]
    pub playwright_script: Option<Option<String>>,
    /// Version of the owning parent the caller last saw
    #[serde(default)]
    pub expected_version: Option<i64>,
}

impl StepPatch {
    pub fn is_empty(&self) -> bool {
        self.action.is_none()
            && self.data.is_none()
            && self.expected.is_none()
            && self.disabled.is_none()
            && self.fixture_ref.is_none()
            && self.playwright_script.is_none()
    }
}

// ============================================================================
// Versions
// ============================================================================

/// Step as captured inside a version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepSnapshot {
    pub id: String,
    pub order: i64,
    pub action: String,
    pub data: Option<String>,
    pub expected: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    pub fixture_ref: Option<String>,
    pub playwright_script: Option<String>,
}

impl From<&Step> for StepSnapshot {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id.clone(),
            order: step.order,
            action: step.action.clone(),
            data: step.data.clone(),
            expected: step.expected.clone(),
            disabled: step.disabled,
            fixture_ref: step.fixture_ref.clone(),
            playwright_script: step.playwright_script.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Version {
    pub id: String,
    pub parent_kind: ParentKind,
    pub parent_id: String,
    pub version: i64,
    pub name: String,
    pub playwright_script: Option<String>,
    pub steps: Vec<StepSnapshot>,
    pub created_at: i64,
    pub created_by: Option<String>,
    pub reverted_from: Option<i64>,
}

impl Version {
    pub fn parent(&self) -> StepParent {
        StepParent {
            kind: self.parent_kind,
            id: self.parent_id.clone(),
        }
    }
}

// ============================================================================
// Test runs
// ============================================================================

/// Test run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl Default for RunStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// `pending -> running -> {completed | failed}`, plus `pending -> failed`
    /// when the runner never started.
    pub fn can_transition_to(&self, next: RunStatus) -> bool {
        matches!(
            (self, next),
            (RunStatus::Pending, RunStatus::Running)
                | (RunStatus::Pending, RunStatus::Failed)
                | (RunStatus::Running, RunStatus::Completed)
                | (RunStatus::Running, RunStatus::Failed)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "pending"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for RunStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "running" => Ok(Self::Running),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("unknown run status: {}", s)),
        }
    }
}

/// Per-test-case outcome inside a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Passed,
    Failed,
    Skipped,
}

impl Default for ExecutionStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "passed" => Ok(Self::Passed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("unknown execution status: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseExecution {
    pub id: String,
    pub test_result_id: String,
    pub test_case_id: String,
    pub status: ExecutionStatus,
    pub duration_ms: Option<i64>,
    pub retries: i64,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestResult {
    pub id: String,
    pub project_id: String,
    pub success: bool,
    pub status: RunStatus,
    pub browser: String,
    pub command: String,
    pub started_at: Option<i64>,
    pub finished_at: Option<i64>,
    pub duration_ms: Option<i64>,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub video_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
    #[serde(default)]
    pub executions: Vec<TestCaseExecution>,
}

/// Input for a new pending run record
#[derive(Debug, Clone)]
pub struct NewTestResult {
    pub project_id: String,
    pub browser: String,
    pub command: String,
    pub test_case_ids: Vec<String>,
}

/// Per-test-case update applied when a run finishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionUpdate {
    pub test_case_id: String,
    pub status: ExecutionStatus,
    pub duration_ms: Option<i64>,
    pub retries: i64,
    pub error_message: Option<String>,
}

/// Terminal payload for a run
#[derive(Debug, Clone, Default)]
pub struct RunOutcome {
    pub success: bool,
    pub output: Option<String>,
    pub error_message: Option<String>,
    pub duration_ms: Option<i64>,
    pub video_url: Option<String>,
    pub screenshot_url: Option<String>,
    pub executions: Vec<ExecutionUpdate>,
}
