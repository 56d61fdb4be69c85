use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Map, Value};
use testdeck_common::{Fixture, FixtureType, WithSteps};

use super::cases::print_with_steps;
use super::split_tags;
use crate::client::ApiClient;
use crate::output::{print_item, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum FixtureCommands {
    /// List fixtures in a project
    List { project: String },

    /// Show a fixture with its steps
    Get { id: String },

    /// Create a fixture
    Create {
        project: String,

        #[arg(short, long)]
        name: String,

        #[arg(long = "type")]
        fixture_type: Option<FixtureType>,

        /// Identifier the generated spec exports the fixture under
        #[arg(long)]
        export_name: Option<String>,

        #[arg(long = "tag")]
        tags: Vec<String>,
    },

    /// Update a fixture
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long = "type")]
        fixture_type: Option<FixtureType>,

        #[arg(long)]
        export_name: Option<String>,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Delete a fixture no step references
    Delete { id: String },

    /// Copy a fixture and its steps
    Clone { id: String },
}

pub async fn execute(cmd: FixtureCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        FixtureCommands::List { project } => {
            let fixtures: Vec<Fixture> = client
                .get(&format!("/api/projects/{}/fixtures", project))
                .await?;
            print_list(&fixtures, format);
        }

        FixtureCommands::Get { id } => {
            let detail: WithSteps<Fixture> = client.get(&format!("/api/fixtures/{}", id)).await?;
            print_with_steps(&detail, format);
        }

        FixtureCommands::Create {
            project,
            name,
            fixture_type,
            export_name,
            tags,
        } => {
            let mut body = json!({
                "name": name,
                "exportName": export_name,
                "tags": split_tags(&tags),
            });
            if let Some(kind) = fixture_type {
                body["fixtureType"] = json!(kind);
            }
            let fixture: Fixture = client
                .post(&format!("/api/projects/{}/fixtures", project), &body)
                .await?;
            print_success(&format!("Fixture '{}' created", fixture.name));
            print_item(&fixture, format);
        }

        FixtureCommands::Update {
            id,
            name,
            fixture_type,
            export_name,
            expected_version,
        } => {
            let mut patch = Map::new();
            if let Some(name) = name {
                patch.insert("name".into(), json!(name));
            }
            if let Some(kind) = fixture_type {
                patch.insert("fixtureType".into(), json!(kind));
            }
            if let Some(export_name) = export_name {
                patch.insert("exportName".into(), json!(export_name));
            }
            if let Some(expected) = expected_version {
                patch.insert("expectedVersion".into(), json!(expected));
            }
            let fixture: Fixture = client
                .put(&format!("/api/fixtures/{}", id), &Value::Object(patch))
                .await?;
            print_item(&fixture, format);
        }

        FixtureCommands::Delete { id } => {
            client.delete(&format!("/api/fixtures/{}", id)).await?;
            print_success(&format!("Fixture '{}' deleted", id));
        }

        FixtureCommands::Clone { id } => {
            let copy: WithSteps<Fixture> = client
                .post(&format!("/api/fixtures/{}/clone", id), &json!({}))
                .await?;
            print_success(&format!("Cloned into '{}'", copy.item.name));
            print_with_steps(&copy, format);
        }
    }
    Ok(())
}
