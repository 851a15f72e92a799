//! Unified aggregator
//!
//! Combines the three per-capability signals into one session verdict:
//!
//! 1. `overall = video && document && face` (strict conjunction)
//! 2. `fail_count` = number of failed capabilities
//! 3. `coordinated_attack_suspected = fail_count >= prokyc_min_failures`
//!
//! The ProKYC threshold is a placeholder heuristic with no statistical
//! backing; it is kept configurable through [`AggregationPolicy`] but
//! defaults to the observed value of 2.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{KycError, Result};
use crate::types::capability::Capability;
use crate::types::outcome::VerificationOutcome;
use crate::types::unified::{OverallVerdict, UnifiedResult};

/// Aggregation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Failed capabilities needed to flag a coordinated attack
    pub prokyc_min_failures: usize,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            prokyc_min_failures: crate::DEFAULT_PROKYC_MIN_FAILURES,
        }
    }
}

/// Decision derived from three pass/fail signals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub overall: OverallVerdict,
    pub fail_count: u8,
    pub coordinated_attack_suspected: bool,
}

/// Combine three independent signals
pub fn combine(
    video_ok: bool,
    document_ok: bool,
    face_ok: bool,
    policy: &AggregationPolicy,
) -> Decision {
    let fail_count = [video_ok, document_ok, face_ok]
        .iter()
        .filter(|ok| !**ok)
        .count();

    let overall = if fail_count == 0 {
        OverallVerdict::Pass
    } else {
        OverallVerdict::Fail
    };

    Decision {
        overall,
        fail_count: fail_count as u8,
        coordinated_attack_suspected: fail_count >= policy.prokyc_min_failures,
    }
}

/// Build a [`UnifiedResult`] from the three normalized outcomes
pub fn aggregate(
    video: VerificationOutcome,
    document: VerificationOutcome,
    face: VerificationOutcome,
    policy: &AggregationPolicy,
) -> Result<UnifiedResult> {
    for (expected, outcome) in Capability::ALL.iter().zip([&video, &document, &face]) {
        if outcome.capability != *expected {
            return Err(KycError::CapabilityMismatch {
                expected: *expected,
                actual: outcome.capability,
            });
        }
    }

    let decision = combine(video.passed, document.passed, face.passed, policy);
    let run_id = Uuid::now_v7();

    if decision.coordinated_attack_suspected {
        warn!(
            %run_id,
            fail_count = decision.fail_count,
            "Multiple simultaneous failures, coordinated attack suspected"
        );
    } else {
        info!(%run_id, overall = %decision.overall, fail_count = decision.fail_count, "Unified verdict");
    }

    Ok(UnifiedResult {
        run_id,
        video,
        document,
        face,
        overall: decision.overall,
        fail_count: decision.fail_count,
        coordinated_attack_suspected: decision.coordinated_attack_suspected,
        completed_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::outcome::RawResponse;
    use crate::verdict::normalizer::normalize;
    use serde_json::json;

    fn outcome(capability: Capability, body: serde_json::Value) -> VerificationOutcome {
        normalize(capability, &RawResponse::from_value(body))
    }

    #[test]
    fn test_all_eight_triples() {
        let policy = AggregationPolicy::default();
        for bits in 0u8..8 {
            let (v, d, f) = (bits & 1 != 0, bits & 2 != 0, bits & 4 != 0);
            let decision = combine(v, d, f, &policy);
            let failures = [v, d, f].iter().filter(|ok| !**ok).count();

            assert_eq!(decision.fail_count as usize, failures);
            assert_eq!(decision.overall.is_pass(), v && d && f);
            assert_eq!(decision.coordinated_attack_suspected, failures >= 2, "triple {:?}", (v, d, f));
        }
    }

    #[test]
    fn test_single_failure_is_ordinary_rejection() {
        let decision = combine(true, false, true, &AggregationPolicy::default());
        assert_eq!(decision.overall, OverallVerdict::Fail);
        assert!(!decision.coordinated_attack_suspected);
    }

    #[test]
    fn test_custom_threshold() {
        let strict = AggregationPolicy {
            prokyc_min_failures: 3,
        };
        assert!(!combine(false, false, true, &strict).coordinated_attack_suspected);
        assert!(combine(false, false, false, &strict).coordinated_attack_suspected);
    }

    #[test]
    fn test_passing_scenario() {
        let result = aggregate(
            outcome(Capability::Video, json!({"is_real": true, "confidence": 0.999})),
            outcome(Capability::Document, json!({"verdict": "GENUINE", "confidence": 1.0})),
            outcome(Capability::Face, json!({"match": true, "similarity": 96.9})),
            &AggregationPolicy::default(),
        )
        .unwrap();

        assert_eq!(result.overall, OverallVerdict::Pass);
        assert_eq!(result.fail_count, 0);
        assert!(!result.coordinated_attack_suspected);
        assert_eq!(result.face.display_confidence(), "96.9%");
    }

    #[test]
    fn test_prokyc_scenario() {
        let result = aggregate(
            outcome(Capability::Video, json!({"is_real": false, "verdict": "FAKE"})),
            outcome(Capability::Document, json!({"is_real": true})),
            outcome(Capability::Face, json!({"match": false})),
            &AggregationPolicy::default(),
        )
        .unwrap();

        assert_eq!(result.fail_count, 2);
        assert_eq!(result.overall, OverallVerdict::Fail);
        assert!(result.coordinated_attack_suspected);
    }

    #[test]
    fn test_empty_responses_fail_everything() {
        let result = aggregate(
            outcome(Capability::Video, json!({})),
            outcome(Capability::Document, json!({})),
            outcome(Capability::Face, json!({})),
            &AggregationPolicy::default(),
        )
        .unwrap();

        assert_eq!(result.fail_count, 3);
        assert!(result.coordinated_attack_suspected);
        for o in result.outcomes() {
            assert_eq!(o.display_confidence(), "0.0%");
        }
    }

    #[test]
    fn test_slot_mismatch_rejected() {
        let err = aggregate(
            outcome(Capability::Document, json!({})),
            outcome(Capability::Video, json!({})),
            outcome(Capability::Face, json!({})),
            &AggregationPolicy::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err,
            KycError::CapabilityMismatch {
                expected: Capability::Video,
                actual: Capability::Document
            }
        ));
    }
}
