// Webhook endpoints and credentials

use anyhow::{Context, Result};
use std::time::Duration;

/// Default per-request timeout for webhook calls
pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the collaborator webhooks live
#[derive(Debug, Clone)]
pub struct WebhookConfig {
    /// Endpoint that turns an artifact into an insights bundle
    pub insights_url: String,
    /// Endpoint that regenerates one insight field
    pub regenerate_url: String,
    /// Endpoint that writes insights to the CRM
    pub crm_url: String,
    /// Sent as `Authorization: Bearer <key>` when set
    pub api_key: Option<String>,
    pub timeout: Duration,
}

impl WebhookConfig {
    /// Create a config with one base URL for all three services
    ///
    /// Paths are `/insights`, `/regenerate` and `/crm/push`.
    pub fn with_base_url(base_url: &str) -> Self {
        let base = base_url.trim_end_matches('/');
        Self {
            insights_url: format!("{base}/insights"),
            regenerate_url: format!("{base}/regenerate"),
            crm_url: format!("{base}/crm/push"),
            api_key: None,
            timeout: DEFAULT_WEBHOOK_TIMEOUT,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Load from DEALFLOW_* environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read variables
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("{key} environment variable not set"))
        };

        let timeout = match lookup("DEALFLOW_WEBHOOK_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("DEALFLOW_WEBHOOK_TIMEOUT_SECS is not a number: {raw}"))?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_WEBHOOK_TIMEOUT,
        };

        Ok(Self {
            insights_url: required("DEALFLOW_INSIGHTS_URL")?,
            regenerate_url: required("DEALFLOW_REGENERATE_URL")?,
            crm_url: required("DEALFLOW_CRM_URL")?,
            api_key: lookup("DEALFLOW_WEBHOOK_API_KEY").filter(|k| !k.is_empty()),
            timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup() {
        let config = WebhookConfig::from_lookup(lookup(&[
            ("DEALFLOW_INSIGHTS_URL", "http://ai/insights"),
            ("DEALFLOW_REGENERATE_URL", "http://ai/regenerate"),
            ("DEALFLOW_CRM_URL", "http://crm/push"),
            ("DEALFLOW_WEBHOOK_API_KEY", "secret"),
            ("DEALFLOW_WEBHOOK_TIMEOUT_SECS", "5"),
        ]))
        .unwrap();

        assert_eq!(config.crm_url, "http://crm/push");
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_missing_url_is_named() {
        let err = WebhookConfig::from_lookup(lookup(&[(
            "DEALFLOW_INSIGHTS_URL",
            "http://ai/insights",
        )]))
        .unwrap_err();

        assert!(err.to_string().contains("DEALFLOW_REGENERATE_URL"));
    }

    #[test]
    fn test_with_base_url() {
        let config = WebhookConfig::with_base_url("http://hooks.local/");
        assert_eq!(config.insights_url, "http://hooks.local/insights");
        assert_eq!(config.crm_url, "http://hooks.local/crm/push");
        assert!(config.api_key.is_none());
    }
}
