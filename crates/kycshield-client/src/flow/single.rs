//! Single-capability check
//!
//! Issues exactly one request at a time. Starting a new check supersedes
//! the one in flight; the older result is discarded as `Cancelled`.

use std::sync::Arc;
use std::time::Duration;

use kycshield_common::{normalize, Capability, KycError, Result, VerificationOutcome};
use tracing::{info, instrument};

use super::{bounded_submit, ScopeRegistry};
use crate::api::VerificationApi;
use crate::upload::UploadCollector;

/// Runs checks for one capability
pub struct SingleCheck<A> {
    api: Arc<A>,
    capability: Capability,
    timeout: Duration,
    scopes: ScopeRegistry,
}

impl<A: VerificationApi> SingleCheck<A> {
    pub fn new(api: Arc<A>, capability: Capability, timeout: Duration) -> Self {
        Self {
            api,
            capability,
            timeout,
            scopes: ScopeRegistry::new(),
        }
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    /// Validate the selected files, call the service, and normalize the answer
    #[instrument(skip(self, collector), fields(capability = %self.capability))]
    pub async fn check(&self, collector: &UploadCollector) -> Result<VerificationOutcome> {
        // no call is made for an incomplete request
        let request = collector.request_for(self.capability)?;

        let scope = self.scopes.begin();
        let raw = scope
            .guard(bounded_submit(self.api.as_ref(), &request, self.timeout))
            .await?;

        if !scope.is_current() {
            info!(scope = scope.id(), "Discarding result of superseded check");
            return Err(KycError::Cancelled);
        }

        let outcome = normalize(self.capability, &raw);
        info!(passed = outcome.passed, confidence = %outcome.display_confidence(), "Check complete");
        Ok(outcome)
    }

    /// Cancel whatever check is in flight
    pub fn cancel(&self) {
        self.scopes.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{HealthStatus, MockVerificationApi, VerificationRequest};
    use crate::upload::{MediaFile, Slot};
    use async_trait::async_trait;
    use kycshield_common::{RawResponse, ValidationError};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn face_collector() -> UploadCollector {
        let mut collector = UploadCollector::for_capability(Capability::Face);
        collector
            .select(Slot::Selfie, MediaFile::from_bytes("me.jpg", vec![1u8; 8]))
            .unwrap();
        collector
            .select(Slot::IdPhoto, MediaFile::from_bytes("id.png", vec![2u8; 8]))
            .unwrap();
        collector
    }

    #[tokio::test]
    async fn test_face_check_normalizes_response() {
        let mut api = MockVerificationApi::new();
        api.expect_submit()
            .withf(|req| req.capability == Capability::Face && req.parts.len() == 2)
            .times(1)
            .returning(|_| Ok(RawResponse::from_value(json!({"verified": true, "similarity": 91.04}))));

        let check = SingleCheck::new(Arc::new(api), Capability::Face, Duration::from_secs(5));
        let outcome = check.check(&face_collector()).await.unwrap();

        assert!(outcome.passed);
        assert_eq!(outcome.verdict, "MATCH");
        assert_eq!(outcome.display_confidence(), "91.0%");
    }

    #[tokio::test]
    async fn test_incomplete_request_makes_no_call() {
        let mut api = MockVerificationApi::new();
        api.expect_submit().times(0);

        let check = SingleCheck::new(Arc::new(api), Capability::Video, Duration::from_secs(5));
        let err = check
            .check(&UploadCollector::for_capability(Capability::Video))
            .await
            .unwrap_err();

        assert!(matches!(err, KycError::Validation(ValidationError::MissingFiles(_))));
    }

    /// First call hangs, later calls answer immediately
    struct FirstCallHangs {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl VerificationApi for FirstCallHangs {
        async fn submit(&self, _request: &VerificationRequest) -> Result<RawResponse> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(RawResponse::from_value(json!({"match": true, "similarity": 99.5})))
        }

        async fn health(&self, _capability: Capability) -> Result<HealthStatus> {
            Err(KycError::Transport("not used".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported() {
        let api = FirstCallHangs {
            calls: AtomicUsize::new(0),
        };
        let check = SingleCheck::new(Arc::new(api), Capability::Face, Duration::from_millis(500));

        let err = check.check(&face_collector()).await.unwrap_err();
        assert!(matches!(
            err,
            KycError::Timeout {
                capability: Capability::Face,
                limit_ms: 500
            }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_newer_check_supersedes_older() {
        let api = FirstCallHangs {
            calls: AtomicUsize::new(0),
        };
        let check = Arc::new(SingleCheck::new(
            Arc::new(api),
            Capability::Face,
            Duration::from_secs(7200),
        ));

        let stale = tokio::spawn({
            let check = Arc::clone(&check);
            async move { check.check(&face_collector()).await }
        });
        tokio::task::yield_now().await;

        let fresh = check.check(&face_collector()).await.unwrap();
        assert!(fresh.passed);

        let stale = stale.await.unwrap();
        assert!(matches!(stale, Err(KycError::Cancelled)));
    }
}
