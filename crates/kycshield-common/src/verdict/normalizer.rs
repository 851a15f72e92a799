//! Verdict normalizer
//!
//! Maps a heterogeneous service response into a strict [`VerificationOutcome`].
//! The upstream service is inconsistent about field names, so:
//!
//! - face: `match || verified || is_match`
//! - video/document: `is_real || verdict == "GENUINE" || verdict == "REAL"`
//!
//! Missing, null, or non-coercible fields are falsy and missing numbers are
//! zero. An `error` string the service put in a 200 body is carried on the
//! outcome so a failure can be explained. Nothing in here can fail.

use chrono::Utc;
use serde_json::Value;
use tracing::debug;

use crate::types::capability::Capability;
use crate::types::outcome::{RawResponse, VerificationOutcome};

/// Field names accepted as a positive face match
const FACE_MATCH_FIELDS: [&str; 3] = ["match", "verified", "is_match"];

/// Verdict strings accepted as authentic media
const AUTHENTIC_VERDICTS: [&str; 2] = ["GENUINE", "REAL"];

/// Every field the normalizer reads, used to spot empty/foreign responses
const KNOWN_FIELDS: [&str; 9] = [
    "is_real",
    "verdict",
    "confidence",
    "match",
    "verified",
    "is_match",
    "similarity",
    "frames_analyzed",
    "error",
];

/// Normalize one response into a strict outcome
pub fn normalize(capability: Capability, raw: &RawResponse) -> VerificationOutcome {
    if !KNOWN_FIELDS.iter().any(|k| raw.get(k).is_some()) {
        debug!(%capability, fields = raw.len(), "Response carries no recognized fields");
    }

    let passed = passed(capability, raw);

    VerificationOutcome {
        capability,
        passed,
        verdict: verdict_label(capability, raw, passed),
        confidence_pct: confidence_percent(capability, raw),
        frames_analyzed: match capability {
            Capability::Video => raw.get("frames_analyzed").and_then(count),
            _ => None,
        },
        error: reported_error(raw),
        checked_at: Utc::now(),
    }
}

/// Pass/fail signal for one capability
pub fn passed(capability: Capability, raw: &RawResponse) -> bool {
    match capability {
        Capability::Face => FACE_MATCH_FIELDS.iter().any(|k| is_truthy(raw.get(k))),
        Capability::Video | Capability::Document => {
            is_truthy(raw.get("is_real"))
                || raw
                    .get("verdict")
                    .and_then(Value::as_str)
                    .map(|v| AUTHENTIC_VERDICTS.contains(&v))
                    .unwrap_or(false)
        }
    }
}

/// Display percentage: face similarity is already 0-100, confidence is a 0-1 fraction
pub fn confidence_percent(capability: Capability, raw: &RawResponse) -> f64 {
    let pct = match capability {
        Capability::Face => number(raw.get("similarity")),
        Capability::Video | Capability::Document => number(raw.get("confidence")) * 100.0,
    };
    finite_or_zero(pct)
}

/// Format a percentage with exactly one decimal digit
pub fn format_percent(pct: f64) -> String {
    let pct = finite_or_zero(pct);
    // anything that rounds to zero prints as "0.0", never "-0.0"
    let pct = if pct.abs() < 0.05 { 0.0 } else { pct };
    format!("{:.1}%", pct)
}

fn reported_error(raw: &RawResponse) -> Option<String> {
    match raw.get("error") {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Null) | Some(Value::Bool(false)) | None => None,
        Some(Value::String(_)) => None,
        Some(other) => Some(other.to_string()),
    }
}

fn verdict_label(capability: Capability, raw: &RawResponse, passed: bool) -> String {
    let reported = raw
        .get("verdict")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty());

    match (capability, reported) {
        (Capability::Face, _) => (if passed { "MATCH" } else { "NO MATCH" }).to_string(),
        (_, Some(v)) => v.to_string(),
        (Capability::Video, None) => (if passed { "REAL" } else { "FAKE" }).to_string(),
        (Capability::Document, None) => {
            (if passed { "GENUINE" } else { "FRAUDULENT" }).to_string()
        }
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().map(|f| f != 0.0 && f.is_finite()).unwrap_or(false),
        Some(Value::String(s)) => {
            matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        _ => false,
    }
}

fn number(value: Option<&Value>) -> f64 {
    let n = match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().unwrap_or(0.0),
        _ => 0.0,
    };
    finite_or_zero(n)
}

fn count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        _ => None,
    }
}

fn finite_or_zero(v: f64) -> f64 {
    // also folds -0.0 so it never renders as "-0.0"
    if v.is_finite() && v != 0.0 {
        v
    } else {
        0.0
    }
}
