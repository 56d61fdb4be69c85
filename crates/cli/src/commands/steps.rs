use anyhow::Result;
use clap::{Args, Subcommand};
use serde_json::{json, Map};
use testdeck_common::Step;

use super::ParentArgs;
use crate::client::{expected_version_query, ApiClient};
use crate::output::{print_item, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum StepCommands {
    /// List steps in order
    List {
        #[command(flatten)]
        parent: ParentArgs,
    },

    /// Insert a step; appended unless --position is given
    Add {
        #[command(flatten)]
        parent: ParentArgs,

        action: String,

        #[command(flatten)]
        fields: StepFields,

        /// Zero-based position, clamped to the list
        #[arg(long)]
        position: Option<i64>,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Edit a step in place
    Edit {
        id: String,

        #[arg(long)]
        action: Option<String>,

        #[command(flatten)]
        fields: StepFields,

        #[arg(long)]
        disabled: Option<bool>,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Move a step to a zero-based position
    Move {
        id: String,
        position: i64,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Swap a step with the one above it
    Up {
        id: String,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Swap a step with the one below it
    Down {
        id: String,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Delete a step and close the gap
    Delete {
        id: String,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Copy a step directly after itself
    Dup {
        id: String,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Set the complete order from a list of step IDs
    Reorder {
        #[command(flatten)]
        parent: ParentArgs,

        #[arg(required = true)]
        ids: Vec<String>,

        #[arg(long)]
        expected_version: Option<i64>,
    },
}

#[derive(Args, Debug, Default)]
pub struct StepFields {
    /// Input data for the step
    #[arg(long)]
    pub data: Option<String>,

    /// Expected result
    #[arg(long)]
    pub expected: Option<String>,

    /// Fixture this step invokes
    #[arg(long)]
    pub fixture_ref: Option<String>,

    /// Playwright code for the step
    #[arg(long)]
    pub script: Option<String>,
}

impl StepFields {
    fn write_into(self, body: &mut Map<String, serde_json::Value>) {
        if let Some(data) = self.data {
            body.insert("data".into(), json!(data));
        }
        if let Some(expected) = self.expected {
            body.insert("expected".into(), json!(expected));
        }
        if let Some(fixture) = self.fixture_ref {
            body.insert("fixtureRef".into(), json!(fixture));
        }
        if let Some(script) = self.script {
            body.insert("playwrightScript".into(), json!(script));
        }
    }
}

pub async fn execute(cmd: StepCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        StepCommands::List { parent } => {
            let steps: Vec<Step> = client.get(&format!("{}/steps", parent.path())).await?;
            print_list(&steps, format);
        }

        StepCommands::Add {
            parent,
            action,
            fields,
            position,
            expected_version,
        } => {
            let mut body = Map::new();
            body.insert("action".into(), json!(action));
            fields.write_into(&mut body);
            if let Some(position) = position {
                body.insert("position".into(), json!(position));
            }
            if let Some(expected) = expected_version {
                body.insert("expectedVersion".into(), json!(expected));
            }
            let step: Step = client
                .post(&format!("{}/steps", parent.path()), &body.into())
                .await?;
            print_success(&format!("Step inserted at position {}", step.order));
            print_item(&step, format);
        }

        StepCommands::Edit {
            id,
            action,
            fields,
            disabled,
            expected_version,
        } => {
            let mut body = Map::new();
            if let Some(action) = action {
                body.insert("action".into(), json!(action));
            }
            fields.write_into(&mut body);
            if let Some(disabled) = disabled {
                body.insert("disabled".into(), json!(disabled));
            }
            if let Some(expected) = expected_version {
                body.insert("expectedVersion".into(), json!(expected));
            }
            let step: Step = client.put(&format!("/api/steps/{}", id), &body.into()).await?;
            print_item(&step, format);
        }

        StepCommands::Move {
            id,
            position,
            expected_version,
        } => {
            let steps: Vec<Step> = client
                .put(
                    &format!("/api/steps/{}/move", id),
                    &json!({ "position": position, "expectedVersion": expected_version }),
                )
                .await?;
            print_list(&steps, format);
        }

        StepCommands::Up { id, expected_version } => {
            let steps: Vec<Step> = client
                .post(
                    &format!("/api/steps/{}/move-up{}", id, expected_version_query(expected_version)),
                    &json!({}),
                )
                .await?;
            print_list(&steps, format);
        }

        StepCommands::Down { id, expected_version } => {
            let steps: Vec<Step> = client
                .post(
                    &format!("/api/steps/{}/move-down{}", id, expected_version_query(expected_version)),
                    &json!({}),
                )
                .await?;
            print_list(&steps, format);
        }

        StepCommands::Delete { id, expected_version } => {
            let steps: Vec<Step> = client
                .delete_returning(&format!(
                    "/api/steps/{}{}",
                    id,
                    expected_version_query(expected_version)
                ))
                .await?;
            print_success(&format!("Step '{}' deleted", id));
            print_list(&steps, format);
        }

        StepCommands::Dup { id, expected_version } => {
            let copy: Step = client
                .post(
                    &format!("/api/steps/duplicate/{}{}", id, expected_version_query(expected_version)),
                    &json!({}),
                )
                .await?;
            print_success(&format!("Copied to position {}", copy.order));
            print_item(&copy, format);
        }

        StepCommands::Reorder {
            parent,
            ids,
            expected_version,
        } => {
            let steps: Vec<Step> = client
                .put(
                    &format!("{}/steps/reorder", parent.path()),
                    &json!({ "stepIds": ids, "expectedVersion": expected_version }),
                )
                .await?;
            print_list(&steps, format);
        }
    }
    Ok(())
}
