//! Testdeck Playwright run orchestration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Orchestrator                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  start(project, RunRequest)                                 │
//! │    ├── select test cases + reachable fixtures               │
//! │    ├── render_spec() -> testdeck-runs/<key>/*.spec.ts       │
//! │    ├── PlaywrightCommand -> stored on the pending record    │
//! │    └── Background: tokio::spawn | Wait: await               │
//! ├─────────────────────────────────────────────────────────────┤
//! │  execute                                                    │
//! │    ├── pending -> running                                   │
//! │    ├── PlaywrightRunner::run (tokio process or fake)        │
//! │    ├── parse_report(stdout) -> per-test-case executions     │
//! │    └── running -> completed | failed                        │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod error;
pub mod orchestrator;
pub mod playwright;
pub mod poll;
pub mod process;
pub mod report;
pub mod script;

pub use error::{RunnerError, RunnerResult};
pub use orchestrator::{Orchestrator, RunMode, RunRequest, RunStarted};
pub use playwright::{Browser, PlaywrightCommand, PlaywrightConfig};
pub use poll::{poll_until, PollOutcome, RUN_POLL_INTERVAL};
pub use process::{PlaywrightRunner, ProcessOutput, ProcessRunner};
