//! Testdeck CLI
//!
//! Command-line client for the Testdeck HTTP API.

pub mod client;
pub mod commands;
pub mod output;
