//! Research command implementation.

use super::{event_renderer, models};
use anyhow::{Context, Result};
use colored::Colorize;
use quill_orchestrator::{
    AttemptCapPolicy, Completion, ConfigLoader, ModelRouter, QuillConfig, RunOutcome, RunStatus,
    WorkflowController,
};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Options for one research run.
#[derive(Debug, Clone)]
pub struct ResearchOptions {
    /// Topic to research.
    pub topic: String,
    /// Print the outcome as JSON instead of rendering progress.
    pub json: bool,
    /// Swap every endpoint to the mock provider.
    pub dry_run: bool,
    /// Iteration limit override.
    pub max_iterations: Option<u32>,
    /// Attempt cap policy override.
    pub on_attempt_cap: Option<AttemptCapPolicy>,
    /// Print endpoint health after the run.
    pub show_models: bool,
}

/// Applies command-line overrides to the loaded configuration.
pub fn apply_overrides(config: QuillConfig, options: &ResearchOptions) -> Result<QuillConfig> {
    let mut config = if options.dry_run { config.into_dry_run() } else { config };
    if let Some(max_iterations) = options.max_iterations {
        config.workflow.max_iterations = max_iterations;
    }
    if let Some(policy) = options.on_attempt_cap {
        config.workflow.on_attempt_cap = policy;
    }
    ConfigLoader::validate(&config)?;
    Ok(config)
}

/// Execute the research command.
pub async fn execute(config: QuillConfig, options: ResearchOptions) -> Result<()> {
    let topic = options.topic.trim();
    if topic.is_empty() {
        anyhow::bail!("Topic must not be empty");
    }

    let config = apply_overrides(config, &options)?;
    let router =
        ModelRouter::from_config(&config).context("Failed to initialize model router")?;
    let router = Arc::new(router);
    let controller = WorkflowController::new(Arc::clone(&router), config.workflow.clone());

    let renderer = (!options.json)
        .then(|| event_renderer::spawn_progress_renderer(controller.subscribe()));

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("\n{} Cancelling after the current stage...", "⚠".yellow());
                cancel.cancel();
            }
        })
    };

    info!(topic = %topic, dry_run = options.dry_run, "Starting research run");
    let outcome = controller.run_with_cancel(topic, cancel).await;
    interrupt.abort();

    if let Some(handle) = renderer {
        if let Err(err) = handle.await {
            warn!(error = %err, "Progress renderer stopped unexpectedly");
        }
    }

    if options.json {
        let value = if options.show_models {
            json!({ "outcome": &outcome, "models": models::endpoint_rows(&config, Some(&router)) })
        } else {
            serde_json::to_value(&outcome)?
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else {
        print_outcome(&outcome);
        if options.show_models {
            models::print_endpoints(&models::endpoint_rows(&config, Some(&router)), false)?;
        }
    }

    if outcome.status == RunStatus::Failed {
        let reason = outcome
            .failure_reason
            .map_or_else(|| "unknown reason".to_string(), |r| r.to_string());
        anyhow::bail!("Research run failed: {reason}");
    }
    Ok(())
}

fn print_outcome(outcome: &RunOutcome) {
    let state = &outcome.state;

    println!();
    match outcome.completion {
        Completion::Approved => println!("{}", "✓ Report approved".green().bold()),
        Completion::ForcedApproval => {
            println!("{}", "⚠ Report accepted at revision limit".yellow().bold());
        }
        Completion::Failed => println!("{}", "✗ Research failed".red().bold()),
    }
    println!(
        "  {}",
        format!(
            "{} stages, {} critique rounds, {} research rounds, {} drafts",
            state.current_iteration,
            state.critique_rounds,
            state.research_attempts,
            state.writing_attempts
        )
        .dimmed()
    );
    if let Some(reason) = &outcome.failure_reason {
        println!("  {} {}", "Reason:".bold(), reason);
    }

    let (label, report) = match (&outcome.final_report, &state.draft_report) {
        (Some(report), _) => ("Report", report),
        (None, Some(draft)) => ("Partial draft", draft),
        (None, None) => return,
    };
    println!();
    println!("{}", format!("── {label} ").bold().cyan());
    println!();
    println!("{report}");
    println!();
}
