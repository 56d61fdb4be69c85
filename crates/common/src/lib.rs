//! Testdeck Common Library
//!
//! Shared types, persistence, and the step ordering and versioning
//! engines for the Testdeck platform.

pub mod catalog;
pub mod db;
pub mod error;
pub mod runs;
pub mod steps;
pub mod types;
pub mod users;
pub mod versions;

// Re-export commonly used types
pub use catalog::{normalize_tags, TestCaseFilter};
pub use db::Database;
pub use error::{Error, Result};
pub use steps::{is_dense, EditContext};
pub use types::*;
pub use users::User;

/// Testdeck version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default store path
pub fn default_store_path() -> std::path::PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join(".testdeck")
}

/// Default database path
pub fn default_db_path() -> std::path::PathBuf {
    default_store_path().join("testdeck.db")
}

/// Home directory helper
mod dirs {
    pub fn home_dir() -> Option<std::path::PathBuf> {
        std::env::var_os("HOME").map(std::path::PathBuf::from)
    }
}
