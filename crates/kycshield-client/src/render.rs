//! Result rendering
//!
//! Pure functions of normalized outcomes: nothing here reads a raw
//! response, so a malformed body can never break the output.

use std::fmt::Write as _;

use kycshield_common::{Capability, KycError, Result, UnifiedResult, VerificationOutcome};
use serde::Serialize;
use serde_json::json;

use crate::api::HealthStatus;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    pub fn from_json_flag(json: bool) -> Self {
        if json {
            OutputFormat::Json
        } else {
            OutputFormat::Text
        }
    }
}

/// Render one capability's outcome
pub fn render_outcome(outcome: &VerificationOutcome, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(outcome),
        OutputFormat::Text => {
            let mut out = String::new();
            write_outcome(&mut out, outcome);
            Ok(out)
        }
    }
}

/// Render the combined result of a unified run
pub fn render_unified(result: &UnifiedResult, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return to_json(result);
    }

    let mut out = String::new();
    let _ = writeln!(out, "Unified verification {}", result.run_id);
    let _ = writeln!(out, "{}", "=".repeat(50));
    for outcome in result.outcomes() {
        write_outcome(&mut out, outcome);
    }
    let _ = writeln!(out, "{}", "-".repeat(50));
    let _ = writeln!(
        out,
        "Overall: {} ({} of 3 checks failed)",
        result.overall, result.fail_count
    );
    if result.coordinated_attack_suspected {
        let _ = writeln!(
            out,
            "WARNING: possible ProKYC attack, several checks failed together"
        );
    }
    Ok(out)
}

/// Render a failed check or run
pub fn render_error(err: &KycError, format: OutputFormat) -> String {
    match format {
        OutputFormat::Json => json!({
            "error": err.to_string(),
            "category": err.category(),
            "retryable": err.is_retryable(),
        })
        .to_string(),
        OutputFormat::Text => match err {
            KycError::Validation(inner) => format!("Cannot start: {}", inner),
            KycError::Cancelled => "Cancelled: a newer check replaced this one".to_string(),
            other => format!("Verification failed: {}", other),
        },
    }
}

/// Render health check results, one per capability
pub fn render_health(
    results: &[(Capability, Result<HealthStatus>)],
    format: OutputFormat,
) -> Result<String> {
    if format == OutputFormat::Json {
        let entries: Vec<_> = results
            .iter()
            .map(|(capability, result)| match result {
                Ok(status) => json!({ "capability": capability, "healthy": status.is_healthy(), "status": status }),
                Err(err) => json!({ "capability": capability, "healthy": false, "error": err.to_string() }),
            })
            .collect();
        return to_json(&entries);
    }

    let mut out = String::new();
    for (capability, result) in results {
        let line = match result {
            Ok(status) => match &status.model {
                Some(model) => format!("{} ({})", status.status, model),
                None => status.status.clone(),
            },
            Err(err) => format!("unreachable: {}", err),
        };
        let _ = writeln!(out, "{:<16} {}", capability.label(), line);
    }
    Ok(out)
}

fn write_outcome(out: &mut String, outcome: &VerificationOutcome) {
    let score_label = match outcome.capability {
        Capability::Face => "similarity",
        _ => "confidence",
    };
    let _ = writeln!(
        out,
        "{:<16} {:<4}  {:<11} {} {}",
        outcome.capability.label(),
        outcome.status_label(),
        outcome.verdict,
        score_label,
        outcome.display_confidence()
    );
    if let Some(frames) = outcome.frames_analyzed {
        let _ = writeln!(out, "{:<16} {} frames analyzed", "", frames);
    }
    if let Some(error) = &outcome.error {
        let _ = writeln!(out, "{:<16} service reported: {}", "", error);
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}
