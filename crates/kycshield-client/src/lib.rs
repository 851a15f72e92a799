//! # KYCShield Client
//!
//! Client side of the KYCShield verification service: collects media,
//! uploads it to the video-deepfake, document-fraud and face-match
//! endpoints, and turns the answers into verdicts.
//!
//! ## Modules
//!
//! - [`config`]: `KYCSHIELD_*` environment configuration
//! - [`session`]: bearer token held for the lifetime of a client
//! - [`upload`]: file selection and client-side validation
//! - [`api`]: the [`api::VerificationApi`] seam and its reqwest implementation
//! - [`flow`]: single checks and the sequential unified run
//! - [`render`]: text and JSON output

pub mod api;
pub mod config;
pub mod flow;
pub mod render;
pub mod session;
pub mod upload;

pub use api::{HttpVerificationApi, VerificationApi, VerificationRequest};
pub use config::ClientConfig;
pub use flow::{SingleCheck, UnifiedState, UnifiedVerifier};
pub use render::OutputFormat;
pub use session::{AccessToken, Session};
pub use upload::{CollectorMode, MediaFile, Slot, UploadCollector};
