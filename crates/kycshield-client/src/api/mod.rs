//! Verification API client
//!
//! [`VerificationApi`] is the seam between the flows and the remote
//! service. [`http::HttpVerificationApi`] talks to the real endpoints;
//! tests substitute mocks.

pub mod http;

use async_trait::async_trait;
use kycshield_common::{Capability, RawResponse, Result};
use serde::{Deserialize, Serialize};

use crate::upload::MediaFile;

pub use http::HttpVerificationApi;

/// One multipart file field
#[derive(Debug, Clone)]
pub struct FormPart {
    /// Form field name (e.g. `selfie`, `id_photo`)
    pub field: String,
    pub file: MediaFile,
}

/// A ready-to-send verification call
#[derive(Debug, Clone)]
pub struct VerificationRequest {
    pub capability: Capability,
    pub parts: Vec<FormPart>,
}

impl VerificationRequest {
    /// Total upload size in bytes
    pub fn payload_bytes(&self) -> u64 {
        self.parts.iter().map(|p| p.file.len()).sum()
    }
}

/// Response of a capability health endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        self.status.eq_ignore_ascii_case("healthy")
    }
}

/// Trait for verification service clients
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VerificationApi: Send + Sync {
    /// Upload the request's files and return the decoded JSON body
    async fn submit(&self, request: &VerificationRequest) -> Result<RawResponse>;

    /// Query a capability's health endpoint
    async fn health(&self, capability: Capability) -> Result<HealthStatus>;
}
