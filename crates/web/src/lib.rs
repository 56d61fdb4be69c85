//! Testdeck HTTP API
//!
//! Axum router over the step, version, run and AI import engines.

pub mod ai;
pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod server;

pub use config::WebConfig;
pub use error::{ApiError, ApiResult};
pub use server::{router, AppState, WebServer};
