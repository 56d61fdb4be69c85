use anyhow::Result;
use clap::Subcommand;
use serde::Deserialize;
use serde_json::{json, Value};
use testdeck_common::User;

use crate::client::{save_token, token_path, ApiClient};
use crate::output::{format_millis, print_json, print_success, OutputFormat};

#[derive(Subcommand)]
pub enum AuthCommands {
    /// Sign in and save the session token
    Login {
        #[arg(short, long)]
        email: String,

        #[arg(short, long, env = "TESTDECK_PASSWORD", hide_env_values = true)]
        password: String,

        /// Print the token instead of saving it
        #[arg(long)]
        print: bool,
    },

    /// Show the signed-in principal
    Whoami,

    /// Forget the saved token
    Logout,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    token: String,
    expires_at: i64,
    user: User,
}

pub async fn execute(cmd: AuthCommands, client: ApiClient, format: OutputFormat) -> Result<()> {
    match cmd {
        AuthCommands::Login {
            email,
            password,
            print,
        } => {
            let login: LoginResponse = client
                .post("/api/auth/login", &json!({ "email": email, "password": password }))
                .await?;
            if print {
                println!("{}", login.token);
                return Ok(());
            }
            let path = save_token(&login.token)?;
            print_success(&format!(
                "Signed in as {} ({}), token saved to {}, valid until {}",
                login.user.email,
                login.user.roles.join(", "),
                path.display(),
                format_millis(login.expires_at.saturating_mul(1000)),
            ));
        }

        AuthCommands::Whoami => {
            let me: Value = client.get("/api/auth/whoami").await?;
            match format {
                OutputFormat::Json => print_json(&me),
                OutputFormat::Table => println!(
                    "{} [{}]",
                    me["email"].as_str().unwrap_or("-"),
                    me["roles"]
                        .as_array()
                        .map(|roles| {
                            roles
                                .iter()
                                .filter_map(Value::as_str)
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default()
                ),
            }
        }

        AuthCommands::Logout => {
            let path = token_path();
            if path.exists() {
                std::fs::remove_file(&path)?;
            }
            print_success("Signed out");
        }
    }
    Ok(())
}
