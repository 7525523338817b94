// Artifacts and artifact kinds
//
// An artifact is either an uploaded transcript file or a reference to a
// recording held by an external recording service. An ArtifactKind bundles
// everything that differs between workflow variants: validation rules, the
// insight fields that must be present, and where the push lands in the CRM.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

use crate::config::WorkflowConfig;
use crate::error::ValidationError;
use crate::insights::InsightField;

pub const TEXT_PLAIN: &str = "text/plain";
pub const TEXT_VTT: &str = "text/vtt";
pub const APPLICATION_PDF: &str = "application/pdf";

/// A file selected by the user
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    /// Declared MIME type, may be empty when the client does not know it
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A recording stored by an external recording service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct RecordingRef {
    /// Name of the recording service, e.g. "gong"
    pub provider: String,
    /// Opaque recording id at that service
    pub id: String,
}

/// Input to `ingest`
#[derive(Debug, Clone)]
pub enum Artifact {
    Upload(UploadedFile),
    Recording(RecordingRef),
}

impl Artifact {
    pub fn upload(
        filename: impl Into<String>,
        content_type: impl Into<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Artifact::Upload(UploadedFile {
            filename: filename.into(),
            content_type: content_type.into(),
            bytes: bytes.into(),
        })
    }

    pub fn recording(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Artifact::Recording(RecordingRef {
            provider: provider.into(),
            id: id.into(),
        })
    }

    fn source_name(&self) -> &'static str {
        match self {
            Artifact::Upload(_) => "file uploads",
            Artifact::Recording(_) => "recording references",
        }
    }
}

/// Opaque handle to an accepted artifact, stored on the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ArtifactRef {
    pub id: Uuid,
    /// Filename for uploads, "provider:id" for recordings
    pub label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// SHA-256 of the uploaded bytes, hex encoded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    pub accepted_at: DateTime<Utc>,
}

/// CRM object a workflow variant writes to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
#[serde(rename_all = "snake_case")]
pub enum PushTarget {
    /// Notes on the deal/opportunity
    DealNotes,
    /// Activity entry on the contact timeline
    ContactActivity,
}

/// Descriptor for one workflow variant
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ArtifactKind {
    /// Stable identifier, e.g. "call_transcript"
    pub name: String,
    pub accepts_uploads: bool,
    pub accepts_recordings: bool,
    pub max_size_bytes: u64,
    pub allowed_content_types: Vec<String>,
    /// Fields the insight service must populate
    pub required_fields: Vec<InsightField>,
    pub push_target: PushTarget,
    /// Number of wizard steps; the last one is the terminal success step
    pub step_count: u32,
}

impl ArtifactKind {
    pub const CALL_TRANSCRIPT: &'static str = "call_transcript";
    pub const CALL_RECORDING: &'static str = "call_recording";

    /// Uploaded transcript files
    pub fn call_transcript(config: &WorkflowConfig) -> Self {
        Self {
            name: Self::CALL_TRANSCRIPT.to_string(),
            accepts_uploads: true,
            accepts_recordings: false,
            max_size_bytes: config.max_artifact_bytes,
            allowed_content_types: config.allowed_content_types.clone(),
            required_fields: vec![InsightField::SummaryText, InsightField::KeyPoints],
            push_target: PushTarget::DealNotes,
            step_count: 3,
        }
    }

    /// Recordings synced from an external recording service
    pub fn call_recording(config: &WorkflowConfig) -> Self {
        Self {
            name: Self::CALL_RECORDING.to_string(),
            accepts_uploads: false,
            accepts_recordings: true,
            max_size_bytes: config.max_artifact_bytes,
            allowed_content_types: config.allowed_content_types.clone(),
            required_fields: vec![
                InsightField::SummaryText,
                InsightField::KeyPoints,
                InsightField::EmailDraft,
            ],
            push_target: PushTarget::ContactActivity,
            step_count: 3,
        }
    }

    /// Look up a preset by name
    pub fn by_name(name: &str, config: &WorkflowConfig) -> Option<Self> {
        match name {
            Self::CALL_TRANSCRIPT => Some(Self::call_transcript(config)),
            Self::CALL_RECORDING => Some(Self::call_recording(config)),
            _ => None,
        }
    }

    /// Validate an artifact against this kind's rules
    ///
    /// Rules are checked in order: source, emptiness, filename, size, type.
    /// Pure; never touches the network.
    pub fn validate(&self, artifact: &Artifact) -> Result<ArtifactRef, ValidationError> {
        let accepted = match artifact {
            Artifact::Upload(_) => self.accepts_uploads,
            Artifact::Recording(_) => self.accepts_recordings,
        };
        if !accepted {
            return Err(ValidationError::UnsupportedSource {
                kind: self.name.clone(),
                source_name: artifact.source_name().to_string(),
            });
        }

        match artifact {
            Artifact::Upload(file) => self.validate_upload(file),
            Artifact::Recording(recording) => {
                if recording.id.trim().is_empty() {
                    return Err(ValidationError::MissingRecordingId);
                }
                Ok(ArtifactRef {
                    id: Uuid::now_v7(),
                    label: format!("{}:{}", recording.provider, recording.id),
                    content_type: None,
                    size_bytes: None,
                    sha256: None,
                    accepted_at: Utc::now(),
                })
            }
        }
    }

    fn validate_upload(&self, file: &UploadedFile) -> Result<ArtifactRef, ValidationError> {
        if file.bytes.is_empty() {
            return Err(ValidationError::Empty);
        }

        if !is_safe_filename(&file.filename) {
            return Err(ValidationError::UnsafeFilename {
                filename: file.filename.clone(),
            });
        }

        let size = file.bytes.len() as u64;
        if size > self.max_size_bytes {
            return Err(ValidationError::Oversized {
                size,
                max: self.max_size_bytes,
            });
        }

        let content_type = resolve_content_type(&file.content_type, &file.filename);
        if !self
            .allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&content_type))
        {
            return Err(ValidationError::UnsupportedType {
                content_type,
                allowed: self.allowed_content_types.join(", "),
            });
        }

        Ok(ArtifactRef {
            id: Uuid::now_v7(),
            label: file.filename.clone(),
            content_type: Some(content_type),
            size_bytes: Some(size),
            sha256: Some(hex::encode(Sha256::digest(&file.bytes))),
            accepted_at: Utc::now(),
        })
    }
}

/// A filename is safe when it is a single, printable path component
pub fn is_safe_filename(filename: &str) -> bool {
    let trimmed = filename.trim();
    !trimmed.is_empty()
        && trimmed != "."
        && !trimmed.contains("..")
        && !trimmed.contains(['/', '\\', ':'])
        && !trimmed.chars().any(char::is_control)
}

/// Normalize a declared MIME type, falling back to the file extension
///
/// Parameters such as `; charset=utf-8` are dropped. An empty or generic
/// `application/octet-stream` type is inferred from the extension.
pub fn resolve_content_type(declared: &str, filename: &str) -> String {
    let essence = declared
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    if !essence.is_empty() && essence != "application/octet-stream" {
        return essence;
    }

    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "txt" => TEXT_PLAIN.to_string(),
        "vtt" => TEXT_VTT.to_string(),
        "pdf" => APPLICATION_PDF.to_string(),
        _ if essence.is_empty() => "application/octet-stream".to_string(),
        _ => essence,
    }
}
