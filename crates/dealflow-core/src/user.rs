// Current user identity
//
// The signed-in user is an immutable record handed to the engine when it is
// built. Profile changes go through ProfileUpdate, which returns a new record
// for the caller to store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[cfg(feature = "openapi")]
use utoipa::ToSchema;

/// The user on whose behalf sessions run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct CurrentUser {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Signature appended to generated follow-up emails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_signature: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl CurrentUser {
    pub fn new(id: Uuid, email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            name: name.into(),
            company: None,
            email_signature: None,
            updated_at: Utc::now(),
        }
    }

    /// Placeholder identity for single-user deployments
    pub fn anonymous() -> Self {
        Self::new(Uuid::nil(), "anonymous@local", "Anonymous")
    }
}

/// Profile edit command; only provided fields change
#[derive(Debug, Clone, Default, Deserialize)]
#[cfg_attr(feature = "openapi", derive(ToSchema))]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email_signature: Option<String>,
}

impl ProfileUpdate {
    /// Produce the updated record; `user` itself is left untouched
    pub fn apply(&self, user: &CurrentUser) -> CurrentUser {
        let mut updated = user.clone();
        if let Some(name) = self.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            updated.name = name.to_string();
        }
        if let Some(company) = &self.company {
            updated.company = non_blank(company);
        }
        if let Some(signature) = &self.email_signature {
            updated.email_signature = non_blank(signature);
        }
        if updated != *user {
            updated.updated_at = Utc::now();
        }
        updated
    }
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
