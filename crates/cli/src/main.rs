//! Testdeck CLI - Main Entry Point

use clap::{Parser, Subcommand};

use testdeck_cli::client::{load_saved_token, ApiClient};
use testdeck_cli::commands::{ai, auth, cases, fixtures, projects, runs, steps, versions};
use testdeck_cli::output::{print_error, print_success, OutputFormat};

/// Testdeck CLI - test cases, ordered steps and Playwright runs
#[derive(Parser)]
#[command(name = "testdeck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// API server address
    #[arg(long, env = "TESTDECK_SERVER", default_value = "http://127.0.0.1:8080", global = true)]
    server: String,

    /// Session token; defaults to the one saved by `testdeck auth login`
    #[arg(long, env = "TESTDECK_TOKEN", hide_env_values = true, global = true)]
    token: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and out
    #[command(subcommand)]
    Auth(auth::AuthCommands),

    /// Manage projects
    #[command(subcommand)]
    Projects(projects::ProjectCommands),

    /// Manage test cases
    #[command(subcommand)]
    Cases(cases::CaseCommands),

    /// Manage fixtures
    #[command(subcommand)]
    Fixtures(fixtures::FixtureCommands),

    /// Insert, move and delete steps
    #[command(subcommand)]
    Steps(steps::StepCommands),

    /// Version history and revert
    #[command(subcommand)]
    Versions(versions::VersionCommands),

    /// Start and inspect Playwright runs
    #[command(subcommand)]
    Runs(runs::RunCommands),

    /// AI-assisted step import
    #[command(subcommand)]
    Ai(ai::AiCommands),

    /// Check server status
    Status,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let token = cli.token.or_else(load_saved_token);
    let client = ApiClient::new(&cli.server, token)?;
    let format = cli.format;

    match cli.command {
        Commands::Auth(cmd) => auth::execute(cmd, client, format).await?,
        Commands::Projects(cmd) => projects::execute(cmd, client, format).await?,
        Commands::Cases(cmd) => cases::execute(cmd, client, format).await?,
        Commands::Fixtures(cmd) => fixtures::execute(cmd, client, format).await?,
        Commands::Steps(cmd) => steps::execute(cmd, client, format).await?,
        Commands::Versions(cmd) => versions::execute(cmd, client, format).await?,
        Commands::Runs(cmd) => runs::execute(cmd, client, format).await?,
        Commands::Ai(cmd) => ai::execute(cmd, client, format).await?,
        Commands::Status => {
            let health = client.health().await?;
            print_success(&format!(
                "Testdeck API v{} is running at {}",
                health["version"].as_str().unwrap_or("?"),
                client.base_url()
            ));
        }
    }

    Ok(())
}
