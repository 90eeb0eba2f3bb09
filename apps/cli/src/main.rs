//! Quill CLI - research report orchestration from the command line.
//!
//! Provides the `quill` command: run a research workflow for a topic across
//! the configured model endpoints, or inspect those endpoints.

mod commands;
mod config;

use clap::{CommandFactory, Parser, Subcommand};
use commands::research::ResearchOptions;
use commands::{models, research};
use quill_orchestrator::AttemptCapPolicy;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Quill CLI - multi-model research reports
///
/// Quill plans, researches, writes and critiques a report on a topic,
/// failing over between model endpoints when one is rate limited or down.
#[derive(Parser, Debug)]
#[command(
    name = "quill",
    author,
    version,
    about = "Quill - multi-model research report orchestration",
    long_about = "Quill turns a topic into a research report through planning, research, \
                  writing and critique stages.\nModel calls fail over across the configured \
                  endpoints by priority."
)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Configuration file (overrides QUILL_CONFIG and ./quill.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Research a topic and print the report
    ///
    /// Runs the plan, research, write and critique stages until the critic
    /// approves the draft or a limit is reached. Ctrl-C cancels the run after
    /// the current stage.
    Research {
        /// Topic to research
        topic: String,

        /// Print the run outcome as JSON
        #[arg(long)]
        json: bool,

        /// Use mock models instead of the configured providers
        #[arg(long)]
        dry_run: bool,

        /// Override the maximum number of stage executions
        #[arg(long)]
        max_iterations: Option<u32>,

        /// Behavior when a revision cap is reached (force-approve, fail)
        #[arg(long)]
        on_attempt_cap: Option<AttemptCapPolicy>,

        /// Print endpoint health after the run
        #[arg(long)]
        show_models: bool,
    },

    /// List configured model endpoints
    ///
    /// Shows priority, credential availability and health for each endpoint.
    Models {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "error" => Level::ERROR,
        _ => Level::WARN,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // If no command provided, show help
    let Some(command) = args.command else {
        Args::command().print_help()?;
        return Ok(());
    };

    let quill_config = config::load_config(args.config.as_deref())?;

    match command {
        Command::Research { topic, json, dry_run, max_iterations, on_attempt_cap, show_models } => {
            let options = ResearchOptions {
                topic,
                json,
                dry_run,
                max_iterations,
                on_attempt_cap,
                show_models,
            };
            research::execute(quill_config, options).await?;
        }
        Command::Models { json } => {
            models::execute(&quill_config, json)?;
        }
    }

    Ok(())
}
