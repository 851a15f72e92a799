//! Unified verifier
//!
//! Runs the three capability calls strictly in order (video, document,
//! face), each one only after the previous response arrived. Any error
//! aborts the run: the state moves to `Failed` and every outcome gathered
//! so far is dropped. A run superseded by a newer one returns `Cancelled`
//! and never touches the state.

use std::sync::Arc;
use std::time::Duration;

use kycshield_common::{
    aggregate, normalize, AggregationPolicy, Capability, KycError, Result, UnifiedResult,
    VerificationOutcome,
};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::state::{FlowEvent, UnifiedState};
use super::{bounded_submit, RunScope, ScopeRegistry};
use crate::api::{VerificationApi, VerificationRequest};
use crate::upload::UploadCollector;

/// Drives the three-step verification and publishes its state
pub struct UnifiedVerifier<A> {
    api: Arc<A>,
    policy: AggregationPolicy,
    timeout: Duration,
    scopes: ScopeRegistry,
    state: watch::Sender<UnifiedState>,
}

impl<A: VerificationApi> UnifiedVerifier<A> {
    pub fn new(api: Arc<A>, policy: AggregationPolicy, timeout: Duration) -> Self {
        let (state, _) = watch::channel(UnifiedState::Idle);
        Self {
            api,
            policy,
            timeout,
            scopes: ScopeRegistry::new(),
            state,
        }
    }

    /// Receive every state change (for rendering progress)
    pub fn subscribe(&self) -> watch::Receiver<UnifiedState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state
    pub fn state(&self) -> UnifiedState {
        self.state.borrow().clone()
    }

    /// Report that the user selected or cleared files
    pub fn files_changed(&self, collector: &UploadCollector) -> Result<()> {
        self.transition(None, |s| {
            s.apply(FlowEvent::FilesChanged {
                present: collector.present_count(),
            })
        })
        .map(|_| ())
    }

    /// Cancel any run in flight and return to Idle
    pub fn reset(&self) {
        self.scopes.cancel_all();
        // Reset is valid from every state
        let _ = self.transition(None, |s| s.apply(FlowEvent::Reset));
    }

    /// Run video -> document -> face and aggregate the verdicts
    #[instrument(skip(self, collector))]
    pub async fn run(&self, collector: &UploadCollector) -> Result<UnifiedResult> {
        // validation failures make no call and leave the state alone
        collector.ensure_complete()?;
        let video_req = collector.request_for(Capability::Video)?;
        let document_req = collector.request_for(Capability::Document)?;
        let face_req = collector.request_for(Capability::Face)?;

        let scope = self.scopes.begin();
        let present = collector.present_count();
        self.transition(Some(&scope), |s| {
            // a superseded run may have left us mid-analysis
            let base = if s.is_busy() { UnifiedState::Idle } else { s.clone() };
            let ready = match base {
                UnifiedState::Resolved(_) | UnifiedState::Failed { .. } => base,
                other => other.apply(FlowEvent::FilesChanged { present })?,
            };
            ready.apply(FlowEvent::Start)
        })?;
        info!(run = scope.id(), "Unified verification started");

        let video = self.phase(&scope, &video_req).await?;
        self.advance(&scope, Capability::Document)?;
        let document = self.phase(&scope, &document_req).await?;
        self.advance(&scope, Capability::Face)?;
        let face = self.phase(&scope, &face_req).await?;

        let result = match aggregate(video, document, face, &self.policy) {
            Ok(result) => result,
            Err(err) => return Err(self.abort(&scope, err)),
        };

        let published = self.transition(Some(&scope), |s| {
            s.apply(FlowEvent::Completed(Box::new(result.clone())))
        })?;
        if !published {
            info!(run = scope.id(), "Discarding result of superseded run");
            return Err(KycError::Cancelled);
        }

        info!(
            run = scope.id(),
            overall = %result.overall,
            prokyc = result.coordinated_attack_suspected,
            "Unified verification resolved"
        );
        Ok(result)
    }

    async fn phase(
        &self,
        scope: &RunScope,
        request: &VerificationRequest,
    ) -> Result<VerificationOutcome> {
        let capability = request.capability;
        let response = scope
            .guard(bounded_submit(self.api.as_ref(), request, self.timeout))
            .await;

        match response {
            Ok(raw) => {
                let outcome = normalize(capability, &raw);
                debug!(%capability, passed = outcome.passed, "Phase complete");
                Ok(outcome)
            }
            Err(KycError::Cancelled) => Err(KycError::Cancelled),
            Err(err) => Err(self.abort(scope, err)),
        }
    }

    fn advance(&self, scope: &RunScope, next: Capability) -> Result<()> {
        if self.transition(Some(scope), |s| s.apply(FlowEvent::PhaseStarted(next)))? {
            Ok(())
        } else {
            Err(KycError::Cancelled)
        }
    }

    /// Move to Failed (if this run still owns the state) and hand the error back
    fn abort(&self, scope: &RunScope, err: KycError) -> KycError {
        warn!(run = scope.id(), error = %err, "Unified verification aborted");
        if let Err(transition_err) =
            self.transition(Some(scope), |s| s.apply(FlowEvent::Errored(err.to_string())))
        {
            warn!(error = %transition_err, "Could not record failure");
        }
        err
    }

    /// Apply a transition atomically; `Ok(false)` when `scope` is no longer current
    fn transition<F>(&self, scope: Option<&RunScope>, f: F) -> Result<bool>
    where
        F: FnOnce(&UnifiedState) -> Result<UnifiedState>,
    {
        let mut outcome = Ok(false);
        self.state.send_if_modified(|state| {
            if scope.map(|s| !s.is_current()).unwrap_or(false) {
                return false;
            }
            match f(state) {
                Ok(next) => {
                    debug!(from = state.name(), to = next.name(), "State transition");
                    let changed = *state != next;
                    *state = next;
                    outcome = Ok(true);
                    changed
                }
                Err(err) => {
                    outcome = Err(err);
                    false
                }
            }
        });
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HealthStatus, MockVerificationApi};
    use crate::upload::{MediaFile, Slot};
    use async_trait::async_trait;
    use kycshield_common::{OverallVerdict, RawResponse, ValidationError};
    use mockall::Sequence;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn full_collector() -> UploadCollector {
        let mut collector = UploadCollector::unified();
        collector
            .select(Slot::Video, MediaFile::from_bytes("live.mp4", vec![0u8; 16]))
            .unwrap();
        collector
            .select(Slot::Document, MediaFile::from_bytes("passport.jpg", vec![1u8; 16]))
            .unwrap();
        collector
            .select(Slot::Selfie, MediaFile::from_bytes("selfie.png", vec![2u8; 16]))
            .unwrap();
        collector
    }

    fn expect(
        api: &mut MockVerificationApi,
        seq: &mut Sequence,
        capability: Capability,
        body: serde_json::Value,
    ) {
        api.expect_submit()
            .withf(move |req| req.capability == capability)
            .times(1)
            .in_sequence(seq)
            .returning(move |_| Ok(RawResponse::from_value(body.clone())));
    }

    fn verifier(api: MockVerificationApi) -> UnifiedVerifier<MockVerificationApi> {
        UnifiedVerifier::new(
            Arc::new(api),
            AggregationPolicy::default(),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_all_pass() {
        let mut api = MockVerificationApi::new();
        let mut seq = Sequence::new();
        expect(&mut api, &mut seq, Capability::Video, json!({"is_real": true, "confidence": 0.999}));
        expect(&mut api, &mut seq, Capability::Document, json!({"verdict": "GENUINE", "confidence": 1.0}));
        expect(&mut api, &mut seq, Capability::Face, json!({"match": true, "similarity": 96.9}));

        let verifier = verifier(api);
        let result = verifier.run(&full_collector()).await.unwrap();

        assert_eq!(result.overall, OverallVerdict::Pass);
        assert!(!result.coordinated_attack_suspected);
        assert_eq!(verifier.state().result(), Some(&result));
    }

    #[tokio::test]
    async fn test_prokyc_flagged() {
        let mut api = MockVerificationApi::new();
        let mut seq = Sequence::new();
        expect(&mut api, &mut seq, Capability::Video, json!({"is_real": false, "verdict": "FAKE"}));
        expect(&mut api, &mut seq, Capability::Document, json!({"is_real": true}));
        expect(&mut api, &mut seq, Capability::Face, json!({"match": false}));

        let result = verifier(api).run(&full_collector()).await.unwrap();

        assert_eq!(result.fail_count, 2);
        assert_eq!(result.overall, OverallVerdict::Fail);
        assert!(result.coordinated_attack_suspected);
    }

    #[tokio::test]
    async fn test_document_error_discards_video_result() {
        let mut api = MockVerificationApi::new();
        let mut seq = Sequence::new();
        expect(&mut api, &mut seq, Capability::Video, json!({"is_real": true, "confidence": 0.98}));
        api.expect_submit()
            .withf(|req| req.capability == Capability::Document)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(KycError::Transport("connection reset by peer".into())));
        api.expect_submit()
            .withf(|req| req.capability == Capability::Face)
            .times(0);

        let verifier = verifier(api);
        let err = verifier.run(&full_collector()).await.unwrap_err();

        assert!(matches!(err, KycError::Transport(_)));
        match verifier.state() {
            UnifiedState::Failed { error } => assert!(error.contains("connection reset by peer")),
            other => panic!("expected Failed, got {:?}", other),
        }
        assert!(verifier.state().result().is_none());
    }

    #[tokio::test]
    async fn test_face_call_carries_document_as_id_photo() {
        let mut api = MockVerificationApi::new();
        let mut seq = Sequence::new();
        expect(&mut api, &mut seq, Capability::Video, json!({"is_real": true}));
        expect(&mut api, &mut seq, Capability::Document, json!({"is_real": true}));
        api.expect_submit()
            .withf(|req| {
                req.capability == Capability::Face
                    && req.parts.iter().any(|p| p.field == "id_photo" && p.file.file_name == "passport.jpg")
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(RawResponse::from_value(json!({"is_match": true}))));

        let result = verifier(api).run(&full_collector()).await.unwrap();
        assert!(result.overall.is_pass());
    }

    #[tokio::test]
    async fn test_missing_files_leave_state_untouched() {
        let mut api = MockVerificationApi::new();
        api.expect_submit().times(0);

        let verifier = verifier(api);
        let mut collector = UploadCollector::unified();
        collector
            .select(Slot::Video, MediaFile::from_bytes("live.mp4", vec![0u8; 16]))
            .unwrap();
        verifier.files_changed(&collector).unwrap();

        let err = verifier.run(&collector).await.unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::MissingFiles(_))));
        assert_eq!(verifier.state(), UnifiedState::Collecting { present: 1 });
    }

    #[tokio::test]
    async fn test_subscriber_sees_resolution() {
        let mut api = MockVerificationApi::new();
        let mut seq = Sequence::new();
        for cap in Capability::ALL {
            expect(&mut api, &mut seq, cap, json!({"is_real": true, "match": true}));
        }

        let verifier = verifier(api);
        let mut rx = verifier.subscribe();
        verifier.run(&full_collector()).await.unwrap();

        // watch keeps only the latest value
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().name(), "resolved");
    }

    /// Video call hangs on the first run only
    struct SlowFirstVideo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VerificationApi for SlowFirstVideo {
        async fn submit(&self, request: &VerificationRequest) -> Result<RawResponse> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            let body = match request.capability {
                Capability::Face => json!({"match": true, "similarity": 97.0}),
                _ => json!({"is_real": true, "confidence": 0.9}),
            };
            Ok(RawResponse::from_value(body))
        }

        async fn health(&self, _capability: Capability) -> Result<HealthStatus> {
            Err(KycError::Transport("not used".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_fails_run() {
        let api = SlowFirstVideo {
            calls: AtomicUsize::new(0),
        };
        let verifier = UnifiedVerifier::new(
            Arc::new(api),
            AggregationPolicy::default(),
            Duration::from_secs(2),
        );

        let err = verifier.run(&full_collector()).await.unwrap_err();
        assert!(matches!(
            err,
            KycError::Timeout {
                capability: Capability::Video,
                limit_ms: 2000
            }
        ));
        assert_eq!(verifier.state().name(), "failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_run_supersedes_older() {
        let api = SlowFirstVideo {
            calls: AtomicUsize::new(0),
        };
        let verifier = Arc::new(UnifiedVerifier::new(
            Arc::new(api),
            AggregationPolicy::default(),
            Duration::from_secs(7200),
        ));

        let stale = tokio::spawn({
            let verifier = Arc::clone(&verifier);
            async move { verifier.run(&full_collector()).await }
        });
        tokio::task::yield_now().await;
        assert!(verifier.state().is_busy());

        let fresh = verifier.run(&full_collector()).await.unwrap();
        assert!(fresh.overall.is_pass());

        let stale = stale.await.unwrap();
        assert!(matches!(stale, Err(KycError::Cancelled)));
        assert_eq!(verifier.state().result(), Some(&fresh));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_cancels_run() {
        let api = SlowFirstVideo {
            calls: AtomicUsize::new(0),
        };
        let verifier = Arc::new(UnifiedVerifier::new(
            Arc::new(api),
            AggregationPolicy::default(),
            Duration::from_secs(7200),
        ));

        let running = tokio::spawn({
            let verifier = Arc::clone(&verifier);
            async move { verifier.run(&full_collector()).await }
        });
        tokio::task::yield_now().await;

        verifier.reset();
        assert_eq!(verifier.state(), UnifiedState::Idle);
        assert!(matches!(running.await.unwrap(), Err(KycError::Cancelled)));
        assert_eq!(verifier.state(), UnifiedState::Idle);
    }
}
