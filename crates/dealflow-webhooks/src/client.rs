// Shared JSON-over-HTTP client

use anyhow::{Context, Result};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::WebhookConfig;

/// Thin wrapper around reqwest that posts JSON and decodes JSON
#[derive(Debug, Clone)]
pub(crate) struct WebhookClient {
    client: Client,
    api_key: Option<String>,
}

impl WebhookClient {
    pub(crate) fn new(config: &WebhookConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
        })
    }

    /// POST `body` to `url` and decode the JSON response
    ///
    /// `service` names the webhook in error messages.
    pub(crate) async fn post_json<B, R>(&self, service: &str, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let text = self.post(service, url, body).await?;
        serde_json::from_str(&text).with_context(|| format!("Failed to parse {service} response"))
    }

    /// POST `body` to `url` and return the raw response body
    pub(crate) async fn post<B>(&self, service: &str, url: &str, body: &B) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let mut request = self
            .client
            .post(url)
            .header("Content-Type", "application/json")
            .json(body);
        if let Some(api_key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        tracing::debug!(service, url, "Calling webhook");
        let response = request
            .send()
            .await
            .with_context(|| format!("Failed to send {service} request"))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("{service} webhook failed with status {status}: {error_text}");
        }

        response
            .text()
            .await
            .with_context(|| format!("Failed to read {service} response"))
    }
}
