use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Map, Value};
use testdeck_common::{TestCase, TestCaseStatus, WithSteps};

use super::split_tags;
use crate::client::ApiClient;
use crate::output::{print_item, print_json, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum CaseCommands {
    /// List test cases in a project
    List {
        project: String,

        #[arg(long)]
        status: Option<TestCaseStatus>,

        #[arg(long)]
        tag: Option<String>,
    },

    /// Show a test case with its steps
    Get { id: String },

    /// Create a test case
    Create {
        project: String,

        #[arg(short, long)]
        name: String,

        #[arg(long)]
        status: Option<TestCaseStatus>,

        /// Tags, comma separated or repeated
        #[arg(long = "tag")]
        tags: Vec<String>,

        /// Manual cases are never selected for automated runs
        #[arg(long)]
        manual: bool,
    },

    /// Update a test case
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        status: Option<TestCaseStatus>,

        /// Replaces the tag list
        #[arg(long = "tag")]
        tags: Vec<String>,

        #[arg(long)]
        manual: Option<bool>,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Delete a test case
    Delete { id: String },

    /// Copy a test case and its steps
    Clone { id: String },
}

pub(crate) fn print_with_steps<T>(detail: &WithSteps<T>, format: OutputFormat)
where
    T: serde::Serialize + crate::output::TableDisplay,
{
    match format {
        OutputFormat::Json => print_json(detail),
        OutputFormat::Table => {
            print_item(&detail.item, format);
            print_list(&detail.steps, format);
        }
    }
}

pub async fn execute(cmd: CaseCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        CaseCommands::List { project, status, tag } => {
            let mut query = Vec::new();
            if let Some(status) = status {
                query.push(format!("status={}", status));
            }
            if let Some(tag) = tag {
                query.push(format!("tag={}", tag));
            }
            let mut path = format!("/api/projects/{}/test-cases", project);
            if !query.is_empty() {
                path = format!("{}?{}", path, query.join("&"));
            }
            let cases: Vec<TestCase> = client.get(&path).await?;
            print_list(&cases, format);
        }

        CaseCommands::Get { id } => {
            let detail: WithSteps<TestCase> = client.get(&format!("/api/test-cases/{}", id)).await?;
            print_with_steps(&detail, format);
        }

        CaseCommands::Create {
            project,
            name,
            status,
            tags,
            manual,
        } => {
            let mut body = json!({
                "name": name,
                "tags": split_tags(&tags),
                "isManual": manual,
            });
            if let Some(status) = status {
                body["status"] = json!(status);
            }
            let case: TestCase = client
                .post(&format!("/api/projects/{}/test-cases", project), &body)
                .await?;
            print_success(&format!("Test case '{}' created", case.name));
            print_item(&case, format);
        }

        CaseCommands::Update {
            id,
            name,
            status,
            tags,
            manual,
            expected_version,
        } => {
            let mut patch = Map::new();
            if let Some(name) = name {
                patch.insert("name".into(), json!(name));
            }
            if let Some(status) = status {
                patch.insert("status".into(), json!(status));
            }
            if !tags.is_empty() {
                patch.insert("tags".into(), json!(split_tags(&tags)));
            }
            if let Some(manual) = manual {
                patch.insert("isManual".into(), json!(manual));
            }
            if let Some(expected) = expected_version {
                patch.insert("expectedVersion".into(), json!(expected));
            }
            let case: TestCase = client
                .put(&format!("/api/test-cases/{}", id), &Value::Object(patch))
                .await?;
            print_item(&case, format);
        }

        CaseCommands::Delete { id } => {
            client.delete(&format!("/api/test-cases/{}", id)).await?;
            print_success(&format!("Test case '{}' deleted", id));
        }

        CaseCommands::Clone { id } => {
            let copy: WithSteps<TestCase> = client
                .post(&format!("/api/test-cases/{}/clone", id), &json!({}))
                .await?;
            print_success(&format!("Cloned into '{}'", copy.item.name));
            print_with_steps(&copy, format);
        }
    }
    Ok(())
}
