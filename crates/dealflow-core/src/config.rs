// Workflow configuration
//
// WorkflowConfig can be:
// - Created with defaults for standalone usage and tests
// - Built fluently with WorkflowConfigBuilder
// - Loaded from DEALFLOW_* environment variables via `from_env`

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::artifact::{APPLICATION_PDF, TEXT_PLAIN, TEXT_VTT};

/// Default upload limit: 10 MiB
pub const DEFAULT_MAX_ARTIFACT_BYTES: u64 = 10 * 1024 * 1024;

/// Configuration shared by all workflow sessions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Largest accepted upload, in bytes
    #[serde(default = "default_max_artifact_bytes")]
    pub max_artifact_bytes: u64,

    /// MIME types accepted for uploads
    #[serde(default = "default_allowed_content_types")]
    pub allowed_content_types: Vec<String>,

    /// Interval between simulated progress ticks
    #[serde(default = "default_progress_tick", with = "duration_millis")]
    pub progress_tick: Duration,

    /// Percentage added per simulated tick
    #[serde(default = "default_progress_step")]
    pub progress_step: u8,

    /// Simulated progress never passes this value before the result arrives
    #[serde(default = "default_progress_ceiling")]
    pub progress_ceiling: u8,

    /// Upper bound for the insight service call
    #[serde(default = "default_ingest_timeout", with = "duration_millis")]
    pub ingest_timeout: Duration,

    /// Upper bound for the CRM push call
    #[serde(default = "default_push_timeout", with = "duration_millis")]
    pub push_timeout: Duration,

    /// Upper bound for a single-field regeneration call
    #[serde(default = "default_regenerate_timeout", with = "duration_millis")]
    pub regenerate_timeout: Duration,
}

fn default_max_artifact_bytes() -> u64 {
    DEFAULT_MAX_ARTIFACT_BYTES
}

fn default_allowed_content_types() -> Vec<String> {
    vec![
        TEXT_PLAIN.to_string(),
        TEXT_VTT.to_string(),
        APPLICATION_PDF.to_string(),
    ]
}

fn default_progress_tick() -> Duration {
    Duration::from_millis(500)
}

fn default_progress_step() -> u8 {
    10
}

fn default_progress_ceiling() -> u8 {
    90
}

fn default_ingest_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_push_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_regenerate_timeout() -> Duration {
    Duration::from_secs(60)
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_artifact_bytes: default_max_artifact_bytes(),
            allowed_content_types: default_allowed_content_types(),
            progress_tick: default_progress_tick(),
            progress_step: default_progress_step(),
            progress_ceiling: default_progress_ceiling(),
            ingest_timeout: default_ingest_timeout(),
            push_timeout: default_push_timeout(),
            regenerate_timeout: default_regenerate_timeout(),
        }
    }
}

impl WorkflowConfig {
    /// Create configuration from environment variables
    ///
    /// Unset variables keep their defaults; unparsable ones are logged and ignored.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup (extracted for testing)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(bytes) = parse_var::<u64, _>(&lookup, "DEALFLOW_MAX_ARTIFACT_BYTES") {
            config.max_artifact_bytes = bytes;
        }
        if let Some(types) = lookup("DEALFLOW_ALLOWED_CONTENT_TYPES") {
            let types: Vec<String> = types
                .split(',')
                .map(|t| t.trim().to_ascii_lowercase())
                .filter(|t| !t.is_empty())
                .collect();
            if !types.is_empty() {
                config.allowed_content_types = types;
            }
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "DEALFLOW_PROGRESS_TICK_MS") {
            config.progress_tick = Duration::from_millis(ms);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DEALFLOW_INGEST_TIMEOUT_SECS") {
            config.ingest_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DEALFLOW_PUSH_TIMEOUT_SECS") {
            config.push_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "DEALFLOW_REGENERATE_TIMEOUT_SECS") {
            config.regenerate_timeout = Duration::from_secs(secs);
        }

        config
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Ignoring unparsable configuration value");
            None
        }
    }
}

/// Builder for WorkflowConfig with fluent API
pub struct WorkflowConfigBuilder {
    config: WorkflowConfig,
}

impl WorkflowConfigBuilder {
    /// Start building from defaults
    pub fn new() -> Self {
        Self {
            config: WorkflowConfig::default(),
        }
    }

    /// Set the upload size limit
    pub fn max_artifact_bytes(mut self, bytes: u64) -> Self {
        self.config.max_artifact_bytes = bytes;
        self
    }

    /// Replace the allowed MIME types
    pub fn allowed_content_types(mut self, types: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.config.allowed_content_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Set the simulated progress tick interval and increment
    pub fn progress(mut self, tick: Duration, step: u8) -> Self {
        self.config.progress_tick = tick;
        self.config.progress_step = step;
        self
    }

    /// Set the simulated progress ceiling
    pub fn progress_ceiling(mut self, ceiling: u8) -> Self {
        self.config.progress_ceiling = ceiling.min(100);
        self
    }

    /// Set the ingest timeout
    pub fn ingest_timeout(mut self, timeout: Duration) -> Self {
        self.config.ingest_timeout = timeout;
        self
    }

    /// Set the push timeout
    pub fn push_timeout(mut self, timeout: Duration) -> Self {
        self.config.push_timeout = timeout;
        self
    }

    /// Set the regeneration timeout
    pub fn regenerate_timeout(mut self, timeout: Duration) -> Self {
        self.config.regenerate_timeout = timeout;
        self
    }

    /// Build the configuration
    pub fn build(self) -> WorkflowConfig {
        self.config
    }
}

impl Default for WorkflowConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = WorkflowConfig::default();
        assert_eq!(config.max_artifact_bytes, 10 * 1024 * 1024);
        assert_eq!(config.allowed_content_types, vec!["text/plain", "text/vtt", "application/pdf"]);
        assert_eq!(config.progress_ceiling, 90);
    }

    #[test]
    fn test_from_lookup_overrides_and_ignores_garbage() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("DEALFLOW_MAX_ARTIFACT_BYTES", "2048"),
            ("DEALFLOW_PUSH_TIMEOUT_SECS", "not-a-number"),
            ("DEALFLOW_ALLOWED_CONTENT_TYPES", "text/plain, TEXT/VTT"),
        ]);
        let config = WorkflowConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()));

        assert_eq!(config.max_artifact_bytes, 2048);
        assert_eq!(config.push_timeout, Duration::from_secs(30));
        assert_eq!(config.allowed_content_types, vec!["text/plain", "text/vtt"]);
    }

    #[test]
    fn test_builder() {
        let config = WorkflowConfigBuilder::new()
            .max_artifact_bytes(1)
            .progress(Duration::from_millis(10), 25)
            .progress_ceiling(150)
            .build();

        assert_eq!(config.max_artifact_bytes, 1);
        assert_eq!(config.progress_step, 25);
        assert_eq!(config.progress_ceiling, 100);
    }

    #[test]
    fn test_serde_round_trip_uses_millis() {
        let json = serde_json::to_value(WorkflowConfig::default()).unwrap();
        assert_eq!(json["push_timeout"], 30_000);

        let parsed: WorkflowConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(parsed.ingest_timeout, Duration::from_secs(120));
    }
}
