//! UnifiedResult - combined verdict of a three-capability run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::outcome::VerificationOutcome;

/// Session-level verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OverallVerdict {
    Pass,
    Fail,
}

impl OverallVerdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, OverallVerdict::Pass)
    }
}

impl std::fmt::Display for OverallVerdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverallVerdict::Pass => write!(f, "PASS"),
            OverallVerdict::Fail => write!(f, "FAIL"),
        }
    }
}

/// Result bundle of one unified run
///
/// Invariants: `overall` is `Pass` iff all three outcomes passed;
/// `fail_count` counts the failed outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnifiedResult {
    /// Run identifier (UUIDv7, time-ordered)
    pub run_id: Uuid,

    pub video: VerificationOutcome,
    pub document: VerificationOutcome,
    pub face: VerificationOutcome,

    pub overall: OverallVerdict,

    /// Number of capabilities that failed (0-3)
    pub fail_count: u8,

    /// Heuristic flag for a coordinated synthetic-identity (ProKYC) attack
    pub coordinated_attack_suspected: bool,

    pub completed_at: DateTime<Utc>,
}

impl UnifiedResult {
    /// Outcomes in unified-run order
    pub fn outcomes(&self) -> [&VerificationOutcome; 3] {
        [&self.video, &self.document, &self.face]
    }
}
