//! CLI Commands

pub mod ai;
pub mod auth;
pub mod cases;
pub mod fixtures;
pub mod projects;
pub mod runs;
pub mod steps;
pub mod versions;

use clap::Args;

/// Test case or fixture that owns a step list
#[derive(Args, Debug, Clone)]
#[group(required = true, multiple = false)]
pub struct ParentArgs {
    /// Test case ID
    #[arg(long = "case")]
    pub test_case: Option<String>,

    /// Fixture ID
    #[arg(long)]
    pub fixture: Option<String>,
}

impl ParentArgs {
    /// `/api/test-cases/<id>` or `/api/fixtures/<id>`
    pub fn path(&self) -> String {
        match (&self.test_case, &self.fixture) {
            (Some(id), _) => format!("/api/test-cases/{}", id),
            (None, Some(id)) => format!("/api/fixtures/{}", id),
            (None, None) => String::new(),
        }
    }

    /// Path segment used below `/api/projects/<pid>/`
    pub fn project_scoped(&self) -> String {
        match (&self.test_case, &self.fixture) {
            (Some(id), _) => format!("test-cases/{}", id),
            (None, Some(id)) => format!("fixtures/{}", id),
            (None, None) => String::new(),
        }
    }
}

/// Comma or repeat separated tags, trimmed
pub fn split_tags(raw: &[String]) -> Vec<String> {
    raw.iter()
        .flat_map(|t| t.split(','))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parent_paths() {
        let case = ParentArgs {
            test_case: Some("tc-1".to_string()),
            fixture: None,
        };
        assert_eq!(case.path(), "/api/test-cases/tc-1");
        assert_eq!(case.project_scoped(), "test-cases/tc-1");

        let fixture = ParentArgs {
            test_case: None,
            fixture: Some("fx-1".to_string()),
        };
        assert_eq!(fixture.path(), "/api/fixtures/fx-1");
    }

    #[test]
    fn test_split_tags() {
        let raw = vec!["smoke, login".to_string(), " ".to_string(), "checkout".to_string()];
        assert_eq!(split_tags(&raw), vec!["smoke", "login", "checkout"]);
    }
}
