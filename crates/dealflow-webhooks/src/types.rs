// Webhook wire types
//
// Request and response bodies exchanged with the AI and CRM webhooks.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use dealflow_core::{
    resolve_content_type, Artifact, CurrentUser, FieldValue, InsightField, RegenerateRequest,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Who the request is made for
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserPayload {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_signature: Option<String>,
}

impl From<&CurrentUser> for UserPayload {
    fn from(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            name: user.name.clone(),
            company: user.company.clone(),
            email_signature: user.email_signature.clone(),
        }
    }
}

/// Artifact as sent to the insights webhook
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum ArtifactPayload {
    Upload {
        filename: String,
        content_type: String,
        content_base64: String,
    },
    Recording {
        provider: String,
        id: String,
    },
}

impl From<&Artifact> for ArtifactPayload {
    fn from(artifact: &Artifact) -> Self {
        match artifact {
            Artifact::Upload(file) => ArtifactPayload::Upload {
                filename: file.filename.clone(),
                content_type: resolve_content_type(&file.content_type, &file.filename),
                content_base64: BASE64.encode(&file.bytes),
            },
            Artifact::Recording(recording) => ArtifactPayload::Recording {
                provider: recording.provider.clone(),
                id: recording.id.clone(),
            },
        }
    }
}

/// Body of the insights webhook call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzeBody {
    /// Artifact kind name, e.g. `call_transcript`
    pub kind: String,
    pub required_fields: Vec<InsightField>,
    pub artifact: ArtifactPayload,
    pub user: UserPayload,
}

/// Body of the regenerate webhook call
#[derive(Debug, Clone, Serialize)]
pub struct RegenerateBody<'a> {
    #[serde(flatten)]
    pub request: &'a RegenerateRequest,
    pub user: UserPayload,
}

/// Response of the regenerate webhook
#[derive(Debug, Clone, Deserialize)]
pub struct RegenerateResponse {
    pub value: FieldValue,
}
