//! Verification outcomes
//!
//! [`RawResponse`] is the boundary type for whatever JSON the service
//! returned. It is only ever read by the normalizer, which produces the
//! strict [`VerificationOutcome`] used everywhere else.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::capability::Capability;

/// Opaque JSON object returned by a verification endpoint
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResponse(Map<String, Value>);

impl RawResponse {
    /// Wrap a decoded JSON body. Anything other than an object is treated as empty.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of top-level fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Value> for RawResponse {
    fn from(value: Value) -> Self {
        Self::from_value(value)
    }
}

/// Normalized result of a single capability check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Which check produced this outcome
    pub capability: Capability,

    /// Normalized pass/fail signal
    pub passed: bool,

    /// Categorical verdict label (e.g. REAL, FRAUDULENT, NO MATCH)
    pub verdict: String,

    /// Confidence (video/document) or similarity (face) as a percentage
    pub confidence_pct: f64,

    /// Frames the video model looked at, when reported
    pub frames_analyzed: Option<u64>,

    /// Analysis error the service reported alongside its verdict
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// When the outcome was produced
    pub checked_at: DateTime<Utc>,
}

impl VerificationOutcome {
    /// Percentage formatted with exactly one decimal digit
    pub fn display_confidence(&self) -> String {
        crate::verdict::normalizer::format_percent(self.confidence_pct)
    }

    /// "PASS" or "FAIL"
    pub fn status_label(&self) -> &'static str {
        if self.passed {
            "PASS"
        } else {
            "FAIL"
        }
    }
}
