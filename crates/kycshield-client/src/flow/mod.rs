//! Verification flows
//!
//! - [`single::SingleCheck`]: one capability, one outstanding request
//! - [`unified::UnifiedVerifier`]: video -> document -> face, strictly sequential
//!
//! Both run every call inside a [`scope::RunScope`] and under a timeout.

pub mod scope;
pub mod single;
pub mod state;
pub mod unified;

use std::time::Duration;

use kycshield_common::{KycError, RawResponse, Result};

use crate::api::{VerificationApi, VerificationRequest};

pub use scope::{RunScope, ScopeRegistry};
pub use single::SingleCheck;
pub use state::{FlowEvent, UnifiedState};
pub use unified::UnifiedVerifier;

/// Submit a request, failing with [`KycError::Timeout`] past `limit`
pub(crate) async fn bounded_submit<A>(
    api: &A,
    request: &VerificationRequest,
    limit: Duration,
) -> Result<RawResponse>
where
    A: VerificationApi + ?Sized,
{
    match tokio::time::timeout(limit, api.submit(request)).await {
        Ok(result) => result,
        Err(_) => Err(KycError::Timeout {
            capability: request.capability,
            limit_ms: limit.as_millis() as u64,
        }),
    }
}
