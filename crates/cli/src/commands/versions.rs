use anyhow::Result;
use clap::Subcommand;
use serde_json::json;
use testdeck_common::{StepSnapshot, Version};

use super::ParentArgs;
use crate::client::{expected_version_query, ApiClient};
use crate::output::{print_item, print_json, print_list, print_success, OutputFormat, TableDisplay};

#[derive(Subcommand)]
pub enum VersionCommands {
    /// Version history, newest first
    List {
        #[command(flatten)]
        parent: ParentArgs,
    },

    /// Show one version and its step snapshot
    Show { id: String },

    /// Restore the steps of an earlier version
    Revert {
        #[command(flatten)]
        parent: ParentArgs,

        /// Version ID to restore
        #[arg(id = "version_id", value_name = "VERSION")]
        version: String,

        #[arg(long)]
        expected_version: Option<i64>,
    },
}

impl TableDisplay for StepSnapshot {
    fn headers() -> Vec<&'static str> {
        vec!["#", "Action", "Expected", "Fixture"]
    }

    fn row(&self) -> Vec<String> {
        vec![
            self.order.to_string(),
            self.action.clone(),
            self.expected.clone().unwrap_or_else(|| "-".to_string()),
            self.fixture_ref.clone().unwrap_or_else(|| "-".to_string()),
        ]
    }
}

pub async fn execute(cmd: VersionCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        VersionCommands::List { parent } => {
            let versions: Vec<Version> = client.get(&format!("{}/versions", parent.path())).await?;
            print_list(&versions, format);
        }

        VersionCommands::Show { id } => {
            let version: Version = client.get(&format!("/api/versions/{}", id)).await?;
            match format {
                OutputFormat::Json => print_json(&version),
                OutputFormat::Table => {
                    print_item(&version, format);
                    print_list(&version.steps, format);
                }
            }
        }

        VersionCommands::Revert {
            parent,
            version,
            expected_version,
        } => {
            let created: Version = client
                .post(
                    &format!(
                        "{}/versions/{}/revert{}",
                        parent.path(),
                        version,
                        expected_version_query(expected_version)
                    ),
                    &json!({}),
                )
                .await?;
            print_success(&format!(
                "Restored version {}; previous state saved as version {}",
                created
                    .reverted_from
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| "?".to_string()),
                created.version
            ));
            print_item(&created, format);
        }
    }
    Ok(())
}
