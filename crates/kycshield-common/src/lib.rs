//! # KYCShield Common
//!
//! Shared types, errors, and verdict policy for clients of the KYCShield
//! verification service.
//!
//! ## Core Types
//!
//! - [`Capability`]: the three remote checks (video deepfake, document fraud, face match)
//! - [`RawResponse`]: the loosely-typed JSON body returned by the service
//! - [`VerificationOutcome`]: strict, normalized result of one capability
//! - [`UnifiedResult`]: combined verdict of all three capabilities
//!
//! ## Verdict Policy
//!
//! - [`verdict::normalizer`]: maps a [`RawResponse`] into a pass/fail signal
//! - [`verdict::aggregator`]: combines three signals and flags coordinated attacks
//!
//! Nothing in this crate performs I/O. The HTTP side lives in `kycshield-client`.

pub mod error;
pub mod types;
pub mod verdict;

// Re-export commonly used types at crate root
pub use error::{ErrorCategory, KycError, Result, ValidationError};
pub use types::{
    capability::Capability,
    outcome::{RawResponse, VerificationOutcome},
    unified::{OverallVerdict, UnifiedResult},
};
pub use verdict::{
    aggregator::{aggregate, combine, AggregationPolicy, Decision},
    normalizer::{confidence_percent, format_percent, normalize, passed},
};

/// KYCShield version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Number of failed capabilities at which a coordinated (ProKYC) attack is suspected
pub const DEFAULT_PROKYC_MIN_FAILURES: usize = 2;

/// Maximum accepted video upload (50 MiB)
pub const MAX_VIDEO_BYTES: u64 = 50 * 1024 * 1024;

/// Maximum accepted image upload (10 MiB)
pub const MAX_IMAGE_BYTES: u64 = 10 * 1024 * 1024;

/// Default per-call timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 60_000;
