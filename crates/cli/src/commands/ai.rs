use anyhow::{bail, Context, Result};
use clap::Subcommand;
use serde::Deserialize;
use serde_json::json;
use std::io::Read;
use std::path::PathBuf;
use testdeck_common::Step;

use super::ParentArgs;
use crate::client::ApiClient;
use crate::output::{print_json, print_list, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum AiCommands {
    /// Turn free-text instructions or pasted Playwright code into steps
    Import {
        /// Project that owns the test case or fixture
        project: String,

        #[command(flatten)]
        parent: ParentArgs,

        /// Instructions, one step each
        lines: Vec<String>,

        /// Read instructions from a file, one per line; `-` reads stdin
        #[arg(short, long)]
        file: Option<PathBuf>,

        #[arg(long)]
        expected_version: Option<i64>,
    },

    /// Suggest a cleaned-up test case name
    FixName { name: String },
}

#[derive(Debug, Deserialize, serde::Serialize)]
struct FixedName {
    original: String,
    name: String,
    provider: String,
}

fn read_text(file: &PathBuf) -> Result<String> {
    if file.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))
}

pub async fn execute(cmd: AiCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AiCommands::Import {
            project,
            parent,
            lines,
            file,
            expected_version,
        } => {
            let text = file.as_ref().map(read_text).transpose()?;
            if lines.is_empty() && text.as_deref().map_or(true, |t| t.trim().is_empty()) {
                bail!("nothing to import: pass instructions or --file");
            }

            let steps: Vec<Step> = client
                .post(
                    &format!("/api/projects/{}/{}/steps/analyze", project, parent.project_scoped()),
                    &json!({
                        "lines": lines,
                        "text": text,
                        "expectedVersion": expected_version,
                    }),
                )
                .await?;
            print_success(&format!("Imported {} steps", steps.len()));
            print_list(&steps, format);
        }

        AiCommands::FixName { name } => {
            let fixed: FixedName = client
                .post("/api/ai/fix-test-case-name", &json!({ "name": name }))
                .await?;
            match format {
                OutputFormat::Json => print_json(&fixed),
                OutputFormat::Table => println!("{}  ({})", fixed.name, fixed.provider),
            }
        }
    }
    Ok(())
}
