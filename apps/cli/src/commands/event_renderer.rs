//! Progress renderer for workflow runs.
//!
//! Subscribes to the controller's progress stream and prints each event as
//! it arrives. Rendering stops at the run's terminal event.

use colored::Colorize;
use quill_orchestrator::ProgressEvent;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;

/// Renders progress events to the terminal until the run finishes.
pub async fn render_progress(mut rx: broadcast::Receiver<ProgressEvent>) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let terminal = event.is_terminal();
                render_event(&event);
                if terminal {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                eprintln!("  {} Warning: {} progress events were skipped", "⚠".yellow(), skipped);
            }
            Err(RecvError::Closed) => break,
        }
    }
}

fn render_event(event: &ProgressEvent) {
    match event {
        ProgressEvent::RunStarted { run_id, topic, .. } => {
            println!();
            println!("{} {}", "🔬 Researching:".bold().cyan(), topic.bold());
            println!("   {}", format!("run {run_id}").dimmed());
            println!();
        }
        ProgressEvent::StageStarted { iteration, stage, .. } => {
            println!(
                "  {} {} {}...",
                format!("[{iteration:>2}]").dimmed(),
                "⏳".yellow(),
                stage.to_string().cyan()
            );
        }
        ProgressEvent::StageCompleted { iteration, stage, summary, .. } => {
            println!(
                "  {} {} {} {}",
                format!("[{iteration:>2}]").dimmed(),
                "✓".green(),
                stage.to_string().cyan(),
                format!("({summary})").dimmed()
            );
        }
        ProgressEvent::StageFailed { iteration, stage, error, .. } => {
            println!(
                "  {} {} {} failed: {}",
                format!("[{iteration:>2}]").dimmed(),
                "✗".red(),
                stage.to_string().red(),
                error
            );
        }
        ProgressEvent::RunFinished { approved, summary, .. } => {
            println!();
            if *approved {
                println!("{} {}", "✓".green().bold(), summary.green());
            } else {
                println!("{} {}", "✗".red().bold(), summary.red());
            }
        }
    }
}

/// Spawns a background task rendering progress events.
///
/// Returns a handle that completes after the run's terminal event.
pub fn spawn_progress_renderer(
    rx: broadcast::Receiver<ProgressEvent>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(render_progress(rx))
}
