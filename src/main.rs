mod aggregate;
mod charts;
mod colors;
mod config;
mod dates;
mod error;
mod models;
mod output;
mod providers;
mod service;
mod ui;

use clap::{Parser, Subcommand};
use colors::ColorAssigner;
use config::{ensure_initialized, load_config, AppConfig};
use dates::DateRangeBuilder;
use error::AppError;
use models::{Credentials, Query};
use output::{render_billing, render_users, OutputFormat};
use providers::openai::OpenAiUsageSource;
use service::{http_client, Session};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;
use ui::run::run_tui;

#[derive(Debug, Parser)]
#[command(name = "usage-charts")]
#[command(about = "Per-user and billing usage charts for an OpenAI organization")]
struct Cli {
    /// Organization id sent with every request.
    #[arg(long, global = true, env = "OPENAI_ORG_ID", hide_env_values = true)]
    org_id: Option<String>,

    #[arg(long, global = true, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Overrides `api_base_url` from config.toml.
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    /// Per-user requests, tokens and audio usage for a range of days.
    Users {
        /// `Nd` for the last N days, `Nm` for the month N-1 months back.
        #[arg(long)]
        window: Option<String>,
        #[arg(long, default_value = "table")]
        format: String,
    },
    /// Daily line-item costs for one calendar month.
    Billing {
        #[arg(long, default_value_t = 0)]
        months_back: u32,
        #[arg(long, default_value = "table")]
        format: String,
    },
    Tui {
        #[arg(long)]
        window: Option<String>,
    },
}

fn init_tracing(quiet: bool, interactive: bool) {
    // The TUI owns the terminal; only log there when explicitly asked to.
    if interactive && std::env::var_os("RUST_LOG").is_none() {
        return;
    }

    let filter = if quiet {
        EnvFilter::new("warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("usage_charts=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn resolve_query(window: Option<&str>, cfg: &AppConfig) -> Result<Query, AppError> {
    match window {
        Some(raw) => raw.parse(),
        None => cfg.default_query(),
    }
}

fn build_session(cfg: &AppConfig, base_url: Option<&str>) -> Result<Session, AppError> {
    let client = http_client(cfg.request_timeout_seconds)?;
    let source = OpenAiUsageSource::new(client, base_url.unwrap_or(&cfg.api_base_url))?;
    let colors = ColorAssigner::with_palette(cfg.palette()?);
    Ok(Session::new(Box::new(source), colors))
}

fn required_credentials(org_id: Option<&str>, api_key: Option<&str>) -> Result<Credentials, AppError> {
    Credentials::new(org_id.unwrap_or_default(), api_key.unwrap_or_default())
}

async fn run(cli: Cli) -> Result<(), AppError> {
    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!("Initialized usage-charts config directory.");
        }
        Commands::Users { window, format } => {
            ensure_initialized()?;
            let cfg = load_config()?;
            let query = resolve_query(window.as_deref(), &cfg)?;
            let format: OutputFormat = format.parse()?;
            let credentials = required_credentials(cli.org_id.as_deref(), cli.api_key.as_deref())?;
            let mut session =
                build_session(&cfg, cli.base_url.as_deref())?.with_credentials(credentials);
            let summary = session
                .user_summary(query, &DateRangeBuilder::for_today())
                .await?;
            println!("{}", render_users(&summary, format)?);
        }
        Commands::Billing {
            months_back,
            format,
        } => {
            ensure_initialized()?;
            let cfg = load_config()?;
            let format: OutputFormat = format.parse()?;
            let credentials = required_credentials(cli.org_id.as_deref(), cli.api_key.as_deref())?;
            let mut session =
                build_session(&cfg, cli.base_url.as_deref())?.with_credentials(credentials);
            let charts = session
                .billing(months_back, &DateRangeBuilder::for_today())
                .await?;
            println!("{}", render_billing(&charts, format)?);
        }
        Commands::Tui { window } => {
            ensure_initialized()?;
            let cfg = load_config()?;
            let query = resolve_query(window.as_deref(), &cfg)?;
            let mut session = build_session(&cfg, cli.base_url.as_deref())?;
            let mut startup_error = None;
            if cli.org_id.is_some() || cli.api_key.is_some() {
                let org = cli.org_id.as_deref().unwrap_or_default();
                let key = cli.api_key.as_deref().unwrap_or_default();
                if let Err(err) = session.set_credentials(org, key) {
                    startup_error = Some(err.to_string());
                }
            }
            run_tui(session, query, startup_error).await?;
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, matches!(cli.command, Commands::Tui { .. }));

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(AppError::EmptyResult) => {
            println!("{}", AppError::EmptyResult);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = %err, "command failed");
            eprintln!("{err}");
            ExitCode::FAILURE
        }
    }
}
