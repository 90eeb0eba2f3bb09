//! Models command implementation.

use anyhow::Result;
use colored::Colorize;
use quill_models::{ModelType, resolve_credential};
use quill_orchestrator::{HealthSnapshot, ModelEndpoint, ModelRouter, QuillConfig};
use serde::Serialize;
use tracing::debug;

/// Whether an endpoint's credential can be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialStatus {
    /// The credential resolves to a key.
    Available,
    /// The credential reference names an unset variable.
    Missing,
    /// The provider needs no credential.
    NotRequired,
}

/// One row of the models listing.
#[derive(Debug, Clone, Serialize)]
pub struct EndpointRow {
    /// Endpoint name.
    pub name: String,
    /// Provider name.
    pub provider: String,
    /// Lower is tried first.
    pub priority: u32,
    /// Credential availability.
    pub credential: CredentialStatus,
    /// Health snapshot, when a router could be built.
    pub health: Option<HealthSnapshot>,
}

/// Execute the models command.
pub fn execute(config: &QuillConfig, json: bool) -> Result<()> {
    let router = match ModelRouter::from_config(config) {
        Ok(router) => Some(router),
        Err(err) => {
            debug!(error = %err, "Router unavailable, listing configuration only");
            None
        }
    };
    print_endpoints(&endpoint_rows(config, router.as_ref()), json)
}

/// Builds one row per configured endpoint, in priority order.
pub fn endpoint_rows(config: &QuillConfig, router: Option<&ModelRouter>) -> Vec<EndpointRow> {
    let status = router.map(ModelRouter::status).unwrap_or_default();
    let mut rows: Vec<EndpointRow> = config
        .endpoints
        .iter()
        .map(|endpoint| EndpointRow {
            name: endpoint.name.clone(),
            provider: endpoint.provider.clone(),
            priority: endpoint.priority,
            credential: credential_status(endpoint),
            health: status.get(&endpoint.name).cloned(),
        })
        .collect();
    rows.sort_by_key(|row| row.priority);
    rows
}

fn credential_status(endpoint: &ModelEndpoint) -> CredentialStatus {
    match endpoint.model_type() {
        Ok(ModelType::Mock) => CredentialStatus::NotRequired,
        _ if resolve_credential(&endpoint.credential_ref).is_ok() => CredentialStatus::Available,
        _ => CredentialStatus::Missing,
    }
}

/// Prints endpoint rows as a table or JSON.
pub fn print_endpoints(rows: &[EndpointRow], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }

    println!();
    println!("{}", format!("📋 Model Endpoints ({})", rows.len()).bold().cyan());
    println!();

    println!(
        "{:<24} {:<10} {:<9} {:<14} {}",
        "Name", "Provider", "Priority", "Credential", "Health"
    );
    println!("{}", "─".repeat(80));

    for row in rows {
        let credential = match row.credential {
            CredentialStatus::Available => "✓ OK".green(),
            CredentialStatus::Missing => "✗ MISSING".red(),
            CredentialStatus::NotRequired => "n/a".dimmed(),
        };
        let health = match &row.health {
            None => "unknown".dimmed(),
            Some(h) if h.disabled_reason.is_some() => "disabled".red(),
            Some(h) if !h.available => match h.cooldown_remaining {
                Some(remaining) => {
                    format!("cooling down ({:.0}s)", remaining.as_secs_f64()).yellow()
                }
                None => "unavailable".yellow(),
            },
            Some(h) => {
                format!("available ({} calls, {} failures)", h.total_calls, h.total_failures)
                    .green()
            }
        };

        println!(
            "{:<24} {:<10} {:<9} {:<14} {}",
            row.name.cyan(),
            row.provider.dimmed(),
            row.priority,
            credential,
            health
        );
    }

    println!();
    Ok(())
}
