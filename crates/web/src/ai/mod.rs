//! AI-assisted step generation
//!
//! Free-text lines are turned into steps by a completion provider, with a
//! keyword heuristic standing in for every line the provider cannot
//! answer.

pub mod heuristic;
pub mod importer;
pub mod provider;

pub use heuristic::{fallback_test_case_name, generate_step, GeneratedStep};
pub use importer::StepImporter;
pub use provider::{build_provider, AiError, CompletionProvider, HttpProvider, ProviderKind};
