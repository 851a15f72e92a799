//! Client configuration

use kycshield_common::{AggregationPolicy, KycError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

/// Verification client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL of the verification API (no trailing slash)
    pub base_url: String,
    /// Timeout settings
    pub timeouts: TimeoutSettings,
    /// Client-side upload limits
    pub limits: UploadLimits,
    /// Verdict aggregation policy
    pub policy: AggregationPolicy,
    /// Emit logs as JSON lines
    pub log_json: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeouts: TimeoutSettings::default(),
            limits: UploadLimits::default(),
            policy: AggregationPolicy::default(),
            log_json: false,
        }
    }
}

impl ClientConfig {
    /// Load configuration from `.env` and the process environment
    pub fn load() -> Result<Self> {
        // Try to load .env file
        let _ = dotenvy::dotenv();

        Self::from_env()
    }

    /// Load from the process environment only (`.env` already applied)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Whether JSON logs were requested, read before logging is set up
    ///
    /// Quiet on bad input: [`ClientConfig::from_lookup`] reports it once a
    /// subscriber exists.
    pub fn log_json_from_lookup<F>(lookup: F) -> bool
    where
        F: Fn(&str) -> Option<String>,
    {
        lookup("KYCSHIELD_LOG_JSON")
            .and_then(|raw| raw.trim().parse().ok())
            .unwrap_or(false)
    }

    /// Build configuration from an arbitrary `KYCSHIELD_*` variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(url) = lookup("KYCSHIELD_BASE_URL") {
            cfg.base_url = url;
        }

        // Timeouts
        if let Some(v) = parse_var(&lookup, "KYCSHIELD_TIMEOUT_MS") {
            cfg.timeouts.request_timeout_ms = v;
        }
        if let Some(v) = parse_var(&lookup, "KYCSHIELD_CONNECT_TIMEOUT_MS") {
            cfg.timeouts.connect_timeout_ms = v;
        }

        // Upload limits
        if let Some(v) = parse_var(&lookup, "KYCSHIELD_MAX_VIDEO_BYTES") {
            cfg.limits.max_video_bytes = v;
        }
        if let Some(v) = parse_var(&lookup, "KYCSHIELD_MAX_IMAGE_BYTES") {
            cfg.limits.max_image_bytes = v;
        }

        if let Some(v) = parse_var(&lookup, "KYCSHIELD_PROKYC_MIN_FAILURES") {
            cfg.policy.prokyc_min_failures = v;
        }
        if let Some(v) = parse_var(&lookup, "KYCSHIELD_LOG_JSON") {
            cfg.log_json = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values that would make every call fail
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(KycError::Config(format!(
                "base URL must be http(s): {}",
                self.base_url
            )));
        }
        if self.timeouts.request_timeout_ms == 0 {
            return Err(KycError::Config("request timeout must be positive".to_string()));
        }
        if self.policy.prokyc_min_failures == 0 || self.policy.prokyc_min_failures > 3 {
            return Err(KycError::Config(format!(
                "ProKYC threshold must be between 1 and 3, got {}",
                self.policy.prokyc_min_failures
            )));
        }
        Ok(())
    }

    /// Base URL without trailing slash
    pub fn base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

fn parse_var<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

/// Remote call timeouts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Upper bound for one verification call, including upload
    pub request_timeout_ms: u64,
    /// TCP/TLS connect timeout
    pub connect_timeout_ms: u64,
}

impl TimeoutSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: kycshield_common::DEFAULT_TIMEOUT_MS,
            connect_timeout_ms: 10_000,
        }
    }
}

/// Upload size limits enforced before any call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadLimits {
    pub max_video_bytes: u64,
    pub max_image_bytes: u64,
}

impl Default for UploadLimits {
    fn default() -> Self {
        Self {
            max_video_bytes: kycshield_common::MAX_VIDEO_BYTES,
            max_image_bytes: kycshield_common::MAX_IMAGE_BYTES,
        }
    }
}
