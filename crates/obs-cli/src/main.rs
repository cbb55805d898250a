use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use obs_cli::commands;
use obs_cli::config::{self, Overrides};
use obs_cli::pipeline;
use obs_core::suggestion::{DeferReason, SuggestionStatus};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "observatory")]
#[command(about = "Trace analytics and improvement suggestions for agent runs", long_about = None)]
struct Cli {
    /// Config file; defaults to observatory.toml in the state dir, then the user config dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true, env = "OBSERVATORY_TRACES_DIR")]
    traces_dir: Option<PathBuf>,
    #[arg(long, global = true, env = "OBSERVATORY_STATE_DIR")]
    state_dir: Option<PathBuf>,
    /// Clock override (RFC 3339), mainly for reproducible runs
    #[arg(long, global = true, value_parser = parse_timestamp)]
    now: Option<DateTime<Utc>>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full analysis pipeline
    Analyze,
    /// Show the pending suggestion, counts and due deferrals
    Status,
    /// Mark a suggestion implemented
    Implement { id: String },
    /// Reject a suggestion
    Reject { id: String },
    /// Return a deferred suggestion to proposed
    Propose { id: String },
    /// Defer a suggestion with context
    Defer {
        id: String,
        #[arg(long, value_parser = parse_reason)]
        reason: DeferReason,
        /// RFC 3339 timestamp or a relative offset such as 14d
        #[arg(long)]
        after: Option<String>,
        #[arg(long)]
        condition: Option<String>,
    },
    /// Return every due deferral to proposed
    Resurface,
    /// Re-render report.md from the stored analysis
    Report,
}

fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(input)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|err| format!("invalid RFC 3339 timestamp: {err}"))
}

fn parse_reason(input: &str) -> Result<DeferReason, String> {
    match input.parse::<DeferReason>()? {
        DeferReason::Legacy => Err("legacy is reserved for migrated entries".to_string()),
        reason => Ok(reason),
    }
}

fn init_logging() {
    let level = std::env::var("OBSERVATORY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging();

    let settings = config::resolve(&Overrides {
        config: cli.config,
        traces_dir: cli.traces_dir,
        state_dir: cli.state_dir,
    })
    .context("Failed to resolve configuration")?;
    let now = cli.now.unwrap_or_else(Utc::now);

    match cli.command {
        Commands::Analyze => {
            let summary = pipeline::run_analysis(&settings, now)?;
            println!("{summary}");
        }
        Commands::Status => {
            print!("{}", commands::status(&settings, now)?);
        }
        Commands::Implement { id } => {
            commands::transition(&settings, &id, SuggestionStatus::Implemented, now)?;
            println!("{id} implemented");
        }
        Commands::Reject { id } => {
            commands::transition(&settings, &id, SuggestionStatus::Rejected, now)?;
            println!("{id} rejected");
        }
        Commands::Propose { id } => {
            commands::transition(&settings, &id, SuggestionStatus::Proposed, now)?;
            println!("{id} proposed");
        }
        Commands::Defer {
            id,
            reason,
            after,
            condition,
        } => {
            let reassess_after = after
                .as_deref()
                .map(|value| commands::parse_reassess_after(value, now))
                .transpose()?;
            commands::defer(&settings, &id, reason, reassess_after, condition, now)?;
            match reassess_after {
                Some(after) => println!("{id} deferred until {}", after.to_rfc3339()),
                None => println!("{id} deferred"),
            }
        }
        Commands::Resurface => {
            let ids = commands::resurface(&settings, now)?;
            if ids.is_empty() {
                println!("nothing due");
            } else {
                println!("resurfaced {}", ids.join(", "));
            }
        }
        Commands::Report => {
            pipeline::rerender_report(&settings)?;
            println!(
                "wrote {}",
                settings.state_dir.join(obs_store::outputs::REPORT_FILE).display()
            );
        }
    }

    Ok(())
}
