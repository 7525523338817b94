// Webhook-backed collaborators
//
// Implements InsightService, Regenerator and CrmClient from dealflow-core by
// posting JSON to the configured webhooks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use dealflow_core::{
    Artifact, ArtifactKind, CrmClient, CrmPushRequest, CrmReceipt, CurrentUser, FieldValue,
    InsightService, InsightsBundle, RegenerateRequest, Regenerator,
};

use crate::client::WebhookClient;
use crate::config::WebhookConfig;
use crate::types::{AnalyzeBody, RegenerateBody, RegenerateResponse, UserPayload};

/// Insight service behind `DEALFLOW_INSIGHTS_URL`
pub struct WebhookInsightService {
    client: WebhookClient,
    url: String,
}

impl WebhookInsightService {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        Ok(Self {
            client: WebhookClient::new(config)?,
            url: config.insights_url.clone(),
        })
    }
}

#[async_trait]
impl InsightService for WebhookInsightService {
    async fn analyze(
        &self,
        artifact: &Artifact,
        kind: &ArtifactKind,
        user: &CurrentUser,
    ) -> Result<InsightsBundle> {
        let body = AnalyzeBody {
            kind: kind.name.clone(),
            required_fields: kind.required_fields.clone(),
            artifact: artifact.into(),
            user: user.into(),
        };
        self.client.post_json("insights", &self.url, &body).await
    }
}

/// Regeneration service behind `DEALFLOW_REGENERATE_URL`
pub struct WebhookRegenerator {
    client: WebhookClient,
    url: String,
}

impl WebhookRegenerator {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        Ok(Self {
            client: WebhookClient::new(config)?,
            url: config.regenerate_url.clone(),
        })
    }
}

#[async_trait]
impl Regenerator for WebhookRegenerator {
    async fn regenerate(&self, request: &RegenerateRequest, user: &CurrentUser) -> Result<FieldValue> {
        let body = RegenerateBody {
            request,
            user: UserPayload::from(user),
        };
        let response: RegenerateResponse =
            self.client.post_json("regenerate", &self.url, &body).await?;
        Ok(response.value)
    }
}

/// CRM behind `DEALFLOW_CRM_URL`
///
/// A 2xx response with an empty body counts as accepted without a record id.
pub struct WebhookCrmClient {
    client: WebhookClient,
    url: String,
}

impl WebhookCrmClient {
    pub fn new(config: &WebhookConfig) -> Result<Self> {
        Ok(Self {
            client: WebhookClient::new(config)?,
            url: config.crm_url.clone(),
        })
    }
}

#[async_trait]
impl CrmClient for WebhookCrmClient {
    async fn push(&self, request: &CrmPushRequest) -> Result<CrmReceipt> {
        let text = self.client.post("crm", &self.url, request).await?;
        if text.trim().is_empty() {
            return Ok(CrmReceipt::default());
        }
        serde_json::from_str(&text).context("Failed to parse crm response")
    }
}
