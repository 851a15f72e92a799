//! Upload collector
//!
//! Holds the files a user selected for a check and refuses to build a
//! request until every required slot is filled with acceptable media.
//! Validation happens here, before any remote call is attempted.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use kycshield_common::{Capability, KycError, Result, ValidationError};
use tracing::debug;

use crate::api::{FormPart, VerificationRequest};
use crate::config::UploadLimits;

const VIDEO_TYPES: [&str; 3] = ["video/mp4", "video/mpeg", "video/quicktime"];
const IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/jpg", "image/png"];

/// A user-selected file slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Slot {
    Video,
    Document,
    Selfie,
    IdPhoto,
}

impl Slot {
    /// Multipart field name used when this slot is uploaded
    pub fn field_name(&self) -> &'static str {
        match self {
            Slot::Video => "video",
            Slot::Document => "document",
            Slot::Selfie => "selfie",
            Slot::IdPhoto => "id_photo",
        }
    }

    fn is_video(&self) -> bool {
        matches!(self, Slot::Video)
    }
}

impl std::fmt::Display for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// In-memory copy of a selected file
#[derive(Clone)]
pub struct MediaFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Arc<[u8]>,
}

impl MediaFile {
    /// Build from raw bytes, inferring the content type from the file name
    pub fn from_bytes(file_name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        let file_name = file_name.into();
        let content_type = content_type_for(&file_name).to_string();
        let bytes: Vec<u8> = bytes.into();
        Self {
            file_name,
            content_type,
            bytes: Arc::from(bytes),
        }
    }

    /// Read a file from disk
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| KycError::Io(format!("{}: {}", path.display(), e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        Ok(Self::from_bytes(file_name, bytes))
    }

    /// Override the inferred content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for MediaFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaFile")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Content type from file extension
pub fn content_type_for(file_name: &str) -> &'static str {
    let ext = Path::new(file_name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp4" | "m4v" => "video/mp4",
        "mpeg" | "mpg" => "video/mpeg",
        "mov" | "qt" => "video/quicktime",
        "webm" => "video/webm",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}

/// Which page the collector serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectorMode {
    /// One capability at a time
    Single(Capability),
    /// Video + document + selfie for the three-step run
    Unified,
}

impl CollectorMode {
    pub fn accepted_slots(&self) -> &'static [Slot] {
        match self {
            CollectorMode::Single(Capability::Video) => &[Slot::Video],
            CollectorMode::Single(Capability::Document) => &[Slot::Document],
            CollectorMode::Single(Capability::Face) => &[Slot::Selfie, Slot::IdPhoto],
            CollectorMode::Unified => &[Slot::Video, Slot::Document, Slot::Selfie],
        }
    }
}

/// Files selected for one check
#[derive(Debug, Clone)]
pub struct UploadCollector {
    mode: CollectorMode,
    limits: UploadLimits,
    files: BTreeMap<Slot, MediaFile>,
}

impl UploadCollector {
    pub fn new(mode: CollectorMode, limits: UploadLimits) -> Self {
        Self {
            mode,
            limits,
            files: BTreeMap::new(),
        }
    }

    /// Collector for a single-capability check with default limits
    pub fn for_capability(capability: Capability) -> Self {
        Self::new(CollectorMode::Single(capability), UploadLimits::default())
    }

    /// Collector for the unified run with default limits
    pub fn unified() -> Self {
        Self::new(CollectorMode::Unified, UploadLimits::default())
    }

    pub fn mode(&self) -> CollectorMode {
        self.mode
    }

    /// Put a file into a slot, replacing any previous selection
    pub fn select(&mut self, slot: Slot, file: MediaFile) -> Result<()> {
        self.validate(slot, &file)?;
        debug!(%slot, file = %file.file_name, bytes = file.len(), "File selected");
        self.files.insert(slot, file);
        Ok(())
    }

    /// Remove the file in a slot
    pub fn clear(&mut self, slot: Slot) -> Option<MediaFile> {
        self.files.remove(&slot)
    }

    /// Remove every selected file
    pub fn reset(&mut self) {
        self.files.clear();
    }

    pub fn get(&self, slot: Slot) -> Option<&MediaFile> {
        self.files.get(&slot)
    }

    /// Number of filled slots
    pub fn present_count(&self) -> usize {
        self.files.len()
    }

    /// Required slots that are still empty
    pub fn missing(&self) -> Vec<Slot> {
        self.mode
            .accepted_slots()
            .iter()
            .copied()
            .filter(|s| !self.files.contains_key(s))
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing().is_empty()
    }

    /// Fail with a validation error naming every empty slot
    pub fn ensure_complete(&self) -> Result<()> {
        missing_error(self.missing())
    }

    /// Build the multipart request for one capability
    pub fn request_for(&self, capability: Capability) -> Result<VerificationRequest> {
        let slots = self.slots_for(capability)?;
        missing_error(
            slots
                .iter()
                .map(|(_, slot)| *slot)
                .filter(|s| !self.files.contains_key(s))
                .collect(),
        )?;

        let parts = slots
            .iter()
            .filter_map(|(field, slot)| {
                self.files.get(slot).map(|file| FormPart {
                    field: field.to_string(),
                    file: file.clone(),
                })
            })
            .collect();

        Ok(VerificationRequest { capability, parts })
    }

    /// (multipart field, source slot) pairs for a capability
    fn slots_for(&self, capability: Capability) -> Result<Vec<(&'static str, Slot)>> {
        match (self.mode, capability) {
            (CollectorMode::Single(c), _) if c != capability => Err(KycError::Validation(
                ValidationError::SlotNotAccepted {
                    slot: capability.to_string(),
                },
            )),
            (_, Capability::Video) => Ok(vec![("video", Slot::Video)]),
            (_, Capability::Document) => Ok(vec![("document", Slot::Document)]),
            (CollectorMode::Single(_), Capability::Face) => {
                Ok(vec![("selfie", Slot::Selfie), ("id_photo", Slot::IdPhoto)])
            }
            // the ID document doubles as the reference photo
            (CollectorMode::Unified, Capability::Face) => {
                Ok(vec![("selfie", Slot::Selfie), ("id_photo", Slot::Document)])
            }
        }
    }

    fn validate(&self, slot: Slot, file: &MediaFile) -> Result<()> {
        if !self.mode.accepted_slots().contains(&slot) {
            return Err(ValidationError::SlotNotAccepted {
                slot: slot.to_string(),
            }
            .into());
        }
        if file.is_empty() {
            return Err(ValidationError::EmptyFile {
                slot: slot.to_string(),
            }
            .into());
        }

        let (allowed, max, expected): (&[&str], u64, &str) = if slot.is_video() {
            (&VIDEO_TYPES[..], self.limits.max_video_bytes, "MP4, MPEG or MOV video")
        } else {
            (&IMAGE_TYPES[..], self.limits.max_image_bytes, "JPEG or PNG image")
        };

        if !allowed.contains(&file.content_type.as_str()) {
            return Err(ValidationError::UnsupportedMediaType {
                slot: slot.to_string(),
                content_type: file.content_type.clone(),
                expected: expected.to_string(),
            }
            .into());
        }
        if file.len() > max {
            return Err(ValidationError::FileTooLarge {
                slot: slot.to_string(),
                size: file.len(),
                max,
            }
            .into());
        }
        Ok(())
    }
}

fn missing_error(missing: Vec<Slot>) -> Result<()> {
    if missing.is_empty() {
        Ok(())
    } else {
        Err(ValidationError::MissingFiles(missing.iter().map(Slot::to_string).collect()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn video() -> MediaFile {
        MediaFile::from_bytes("liveness.mp4", vec![0u8; 64])
    }

    fn image(name: &str) -> MediaFile {
        MediaFile::from_bytes(name, vec![1u8; 32])
    }

    #[test]
    fn test_content_type_inference() {
        assert_eq!(content_type_for("clip.MOV"), "video/quicktime");
        assert_eq!(content_type_for("id.jpeg"), "image/jpeg");
        assert_eq!(content_type_for("notes"), "application/octet-stream");
    }

    #[test]
    fn test_unified_collects_three_files() {
        let mut collector = UploadCollector::unified();
        assert_eq!(collector.present_count(), 0);
        assert_eq!(collector.missing(), vec![Slot::Video, Slot::Document, Slot::Selfie]);

        collector.select(Slot::Video, video()).unwrap();
        collector.select(Slot::Document, image("passport.png")).unwrap();
        assert!(!collector.is_complete());

        collector.select(Slot::Selfie, image("me.jpg")).unwrap();
        assert!(collector.is_complete());
        assert_eq!(collector.present_count(), 3);

        collector.reset();
        assert_eq!(collector.present_count(), 0);
    }

    #[test]
    fn test_unified_face_uses_document_as_id_photo() {
        let mut collector = UploadCollector::unified();
        collector.select(Slot::Video, video()).unwrap();
        collector.select(Slot::Document, image("passport.png")).unwrap();
        collector.select(Slot::Selfie, image("me.jpg")).unwrap();

        let request = collector.request_for(Capability::Face).unwrap();
        let fields: Vec<_> = request.parts.iter().map(|p| p.field.as_str()).collect();
        assert_eq!(fields, vec!["selfie", "id_photo"]);
        assert_eq!(request.parts[1].file.file_name, "passport.png");
    }

    #[test]
    fn test_missing_file_blocks_request() {
        let mut collector = UploadCollector::for_capability(Capability::Face);
        collector.select(Slot::Selfie, image("me.jpg")).unwrap();

        let err = collector.request_for(Capability::Face).unwrap_err();
        assert!(matches!(
            err,
            KycError::Validation(ValidationError::MissingFiles(ref slots)) if slots == &["id_photo".to_string()]
        ));
    }

    #[test]
    fn test_clear_slot() {
        let mut collector = UploadCollector::for_capability(Capability::Video);
        collector.select(Slot::Video, video()).unwrap();
        assert!(collector.clear(Slot::Video).is_some());
        assert!(collector.ensure_complete().is_err());
    }

    #[test]
    fn test_slot_not_accepted() {
        let mut collector = UploadCollector::for_capability(Capability::Video);
        let err = collector.select(Slot::Selfie, image("me.jpg")).unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::SlotNotAccepted { .. })));

        let err = collector.request_for(Capability::Document).unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::SlotNotAccepted { .. })));
    }

    #[test]
    fn test_media_type_and_size_limits() {
        let limits = UploadLimits {
            max_video_bytes: 16,
            max_image_bytes: 1024,
        };
        let mut collector = UploadCollector::new(CollectorMode::Unified, limits);

        let err = collector.select(Slot::Video, video()).unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::FileTooLarge { size: 64, max: 16, .. })));

        let err = collector.select(Slot::Selfie, image("me.gif")).unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::UnsupportedMediaType { .. })));

        let err = collector
            .select(Slot::Document, MediaFile::from_bytes("id.png", Vec::new()))
            .unwrap_err();
        assert!(matches!(err, KycError::Validation(ValidationError::EmptyFile { .. })));
    }

    #[tokio::test]
    async fn test_from_path_missing_file() {
        let err = MediaFile::from_path("/nonexistent/kycshield/selfie.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, KycError::Io(_)));
    }
}
