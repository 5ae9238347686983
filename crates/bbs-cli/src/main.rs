// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for runtime errors.
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "bbs-cli", version, about = "Admin client for a running bbs-daemon")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Base URL of the daemon's HTTP façade.
    #[arg(long, default_value = "http://127.0.0.1:8080", global = true)]
    url: String,

    /// HTTP Basic Auth username (an `http_users` login).
    #[arg(long, global = true)]
    user: Option<String>,

    /// HTTP Basic Auth password.
    #[arg(long, global = true)]
    password: Option<String>,

    /// Print machine-readable JSON instead of pretty output.
    #[arg(long, global = true)]
    json: bool,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Orchestrator admin operations.
    Orchestrator {
        #[command(subcommand)]
        action: OrchestratorAction,
    },
    /// Job admin operations.
    Job {
        #[command(subcommand)]
        action: JobAction,
    },
    /// Configuration validation.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum OrchestratorAction {
    /// Show active runner count and admission state.
    Status,
    /// Stop accepting new runners and signal every tracked container to shut down.
    Stop,
}

#[derive(Subcommand, Debug)]
enum JobAction {
    /// List the caller's own jobs.
    List,
    /// Cancel a job that hasn't started yet.
    Cancel {
        /// Job id to cancel.
        #[arg(long)]
        id: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Load and validate a `bbs-daemon` TOML config file.
    Validate {
        /// Path to the config file.
        #[arg(long)]
        config: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug { EnvFilter::new("bbs_cli=debug") } else { EnvFilter::new("bbs_cli=info") };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let result = run(cli).await;
    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(EXIT_RUNTIME_ERROR);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Config { action: ConfigAction::Validate { config } } => cmd_config_validate(&config),
        Commands::Orchestrator { action } => cmd_orchestrator(&cli.url, &cli.user, &cli.password, cli.json, action).await,
        Commands::Job { action } => cmd_job(&cli.url, &cli.user, &cli.password, cli.json, action).await,
    }
}

fn cmd_config_validate(path: &std::path::Path) -> Result<()> {
    let config = bbs_config::load_config(Some(path)).with_context(|| format!("loading {}", path.display()))?;
    let warnings = bbs_config::validate_config(&config).context("validating configuration")?;
    if warnings.is_empty() {
        println!("{}: valid, no warnings", path.display());
    } else {
        for warning in &warnings {
            println!("warning: {warning}");
        }
    }
    Ok(())
}

fn client(user: &Option<String>, password: &Option<String>) -> Result<(reqwest::Client, String, String)> {
    let user = user.clone().context("--user is required for daemon-facing commands")?;
    let password = password.clone().unwrap_or_default();
    Ok((reqwest::Client::new(), user, password))
}

async fn cmd_orchestrator(url: &str, user: &Option<String>, password: &Option<String>, json: bool, action: OrchestratorAction) -> Result<()> {
    let (client, user, password) = client(user, password)?;
    let (method, path) = match action {
        OrchestratorAction::Status => (reqwest::Method::GET, "/admin/orchestrator"),
        OrchestratorAction::Stop => (reqwest::Method::POST, "/admin/orchestrator/stop"),
    };
    let resp = client
        .request(method, format!("{url}{path}"))
        .basic_auth(&user, Some(&password))
        .send()
        .await
        .with_context(|| format!("requesting {path} from {url}"))?;
    print_response(resp, json).await
}

async fn cmd_job(url: &str, user: &Option<String>, password: &Option<String>, json: bool, action: JobAction) -> Result<()> {
    let (client, user, password) = client(user, password)?;
    let resp = match action {
        JobAction::List => {
            client.get(format!("{url}/api/v1/job")).basic_auth(&user, Some(&password)).send().await
        }
        JobAction::Cancel { id } => {
            client
                .delete(format!("{url}/api/v1/job"))
                .query(&[("id", id)])
                .basic_auth(&user, Some(&password))
                .send()
                .await
        }
    };
    print_response(resp.with_context(|| format!("requesting {url}"))?, json).await
}

async fn print_response(resp: reqwest::Response, json: bool) -> Result<()> {
    let status = resp.status();
    let body: serde_json::Value = resp.json().await.unwrap_or(serde_json::Value::Null);
    if json {
        println!("{body}");
    } else {
        println!("{}", serde_json::to_string_pretty(&body)?);
    }
    if !status.is_success() {
        bail!("daemon responded with {status}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_validate_rejects_a_missing_file() {
        let err = cmd_config_validate(std::path::Path::new("/nonexistent/bbs.toml")).unwrap_err();
        assert!(err.to_string().contains("loading"));
    }

    #[test]
    fn config_validate_accepts_a_minimal_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("bbs.toml");
        std::fs::write(&path, "store_path = \"./store.json\"\n").unwrap();
        cmd_config_validate(&path).unwrap();
    }
}
