// Webhook Collaborators
//
// This crate provides HTTP implementations of the dealflow-core collaborator
// traits. The insight, regeneration and CRM services are plain JSON webhooks;
// their URLs and an optional bearer key come from WebhookConfig.

mod client;
mod config;
mod services;
mod types;

#[cfg(test)]
mod tests;

pub use config::{WebhookConfig, DEFAULT_WEBHOOK_TIMEOUT};
pub use services::{WebhookCrmClient, WebhookInsightService, WebhookRegenerator};
pub use types::{AnalyzeBody, ArtifactPayload, RegenerateBody, RegenerateResponse, UserPayload};
