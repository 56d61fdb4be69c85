use anyhow::Result;
use clap::Subcommand;
use serde_json::{json, Map, Value};
use testdeck_common::Project;

use super::split_tags;
use crate::client::ApiClient;
use crate::output::{print_item, print_json, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// List projects
    List,

    /// Get project details
    Get { id: String },

    /// Create a project
    Create {
        #[arg(short, long)]
        name: String,

        /// Application URL, used as BASE_URL for runs
        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Update a project
    Update {
        id: String,

        #[arg(short, long)]
        name: Option<String>,

        #[arg(long)]
        url: Option<String>,

        #[arg(long)]
        environment: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    /// Delete a project and everything in it
    Delete { id: String },

    /// List tags used in a project
    Tags { id: String },

    /// Declare tags on a project
    AddTags {
        id: String,

        /// Tags, comma separated or repeated
        #[arg(required = true)]
        tags: Vec<String>,
    },
}

pub async fn execute(cmd: ProjectCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        ProjectCommands::List => {
            let projects: Vec<Project> = client.get("/api/projects").await?;
            print_list(&projects, format);
        }

        ProjectCommands::Get { id } => {
            let project: Project = client.get(&format!("/api/projects/{}", id)).await?;
            print_item(&project, format);
        }

        ProjectCommands::Create {
            name,
            url,
            environment,
            description,
        } => {
            let body = json!({
                "name": name,
                "url": url,
                "environment": environment,
                "description": description,
            });
            let project: Project = client.post("/api/projects", &body).await?;
            print_success(&format!("Project '{}' created", project.name));
            print_item(&project, format);
        }

        ProjectCommands::Update {
            id,
            name,
            url,
            environment,
            description,
        } => {
            let mut patch = Map::new();
            if let Some(name) = name {
                patch.insert("name".into(), Value::String(name));
            }
            if let Some(url) = url {
                patch.insert("url".into(), Value::String(url));
            }
            if let Some(environment) = environment {
                patch.insert("environment".into(), Value::String(environment));
            }
            if let Some(description) = description {
                patch.insert("description".into(), Value::String(description));
            }
            let project: Project = client
                .put(&format!("/api/projects/{}", id), &Value::Object(patch))
                .await?;
            print_item(&project, format);
        }

        ProjectCommands::Delete { id } => {
            client.delete(&format!("/api/projects/{}", id)).await?;
            print_success(&format!("Project '{}' deleted", id));
        }

        ProjectCommands::Tags { id } => {
            let tags: Vec<String> = client.get(&format!("/api/projects/{}/tags", id)).await?;
            print_tags(&tags, format);
        }

        ProjectCommands::AddTags { id, tags } => {
            let tags: Vec<String> = client
                .post(
                    &format!("/api/projects/{}/tags", id),
                    &json!({ "tags": split_tags(&tags) }),
                )
                .await?;
            print_tags(&tags, format);
        }
    }
    Ok(())
}

fn print_tags(tags: &[String], format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(tags),
        OutputFormat::Table if tags.is_empty() => println!("No tags."),
        OutputFormat::Table => tags.iter().for_each(|t| println!("{}", t)),
    }
}
