//! Capability - the remote checks offered by the verification service
//!
//! Each capability maps to one multipart endpoint. The unified flow runs
//! them in the fixed order of [`Capability::ALL`].

use serde::{Deserialize, Serialize};

/// A single verification capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Deepfake detection on a liveness video
    Video,
    /// Fraud detection on an ID document image
    Document,
    /// Selfie vs. ID photo face match
    Face,
}

impl Capability {
    /// All capabilities in unified-run order
    pub const ALL: [Capability; 3] = [Capability::Video, Capability::Document, Capability::Face];

    /// Path of the verification endpoint, relative to the API base URL
    pub fn endpoint_path(&self) -> &'static str {
        match self {
            Capability::Video => "/api/v1/video-deepfake/verify",
            Capability::Document => "/api/v1/document/verify",
            Capability::Face => "/api/v1/face/verify",
        }
    }

    /// Path of the unauthenticated health endpoint
    pub fn health_path(&self) -> &'static str {
        match self {
            Capability::Video => "/api/v1/video-deepfake/health",
            Capability::Document => "/api/v1/document/health",
            Capability::Face => "/api/v1/face/health",
        }
    }

    /// Multipart field names the endpoint expects
    pub fn form_fields(&self) -> &'static [&'static str] {
        match self {
            Capability::Video => &["video"],
            Capability::Document => &["document"],
            Capability::Face => &["selfie", "id_photo"],
        }
    }

    /// Human-readable name
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Video => "Video deepfake",
            Capability::Document => "Document fraud",
            Capability::Face => "Face match",
        }
    }

    /// The capability that follows this one in a unified run
    pub fn next(&self) -> Option<Capability> {
        match self {
            Capability::Video => Some(Capability::Document),
            Capability::Document => Some(Capability::Face),
            Capability::Face => None,
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Capability::Video => write!(f, "video"),
            Capability::Document => write!(f, "document"),
            Capability::Face => write!(f, "face"),
        }
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "video" => Ok(Capability::Video),
            "document" => Ok(Capability::Document),
            "face" => Ok(Capability::Face),
            other => Err(format!("unknown capability: {}", other)),
        }
    }
}
