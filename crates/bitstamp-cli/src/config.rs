/*
[INPUT]:  YAML configuration file and BITSTAMP_API_SECRET environment variable
[OUTPUT]: Validated credentials, REST and stream settings
[POS]:    Configuration layer - CLI setup
[UPDATE]: When adding new configuration options
*/

use std::time::Duration;

use anyhow::{Context, bail};
use bitstamp_adapter::{Credentials, StreamConfig, http::API_BASE_URL, ws::STREAM_URL};
use serde::{Deserialize, Serialize};

/// Environment variable that overrides the configured API secret
pub const SECRET_ENV_VAR: &str = "BITSTAMP_API_SECRET";

/// Top-level configuration for the CLI
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CliConfig {
    /// Account credentials used to sign requests
    pub credentials: CredentialsConfig,
    /// REST API root
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Streaming client settings
    #[serde(default)]
    pub stream: StreamSettings,
}

/// Account credentials configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CredentialsConfig {
    pub client_id: String,
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

/// Streaming client configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StreamSettings {
    #[serde(default = "default_stream_url")]
    pub url: String,
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            url: default_stream_url(),
            idle_timeout_secs: default_idle_timeout_secs(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

fn default_api_url() -> String {
    API_BASE_URL.to_string()
}

fn default_stream_url() -> String {
    STREAM_URL.to_string()
}

fn default_idle_timeout_secs() -> u64 {
    60
}

fn default_channel_capacity() -> usize {
    100
}

impl CliConfig {
    /// Load configuration from YAML file, applying the secret override
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path).with_context(|| format!("read {path}"))?;
        let secret = std::env::var(SECRET_ENV_VAR).ok();
        Self::from_yaml(&content, secret)
    }

    pub fn from_yaml(content: &str, secret_override: Option<String>) -> anyhow::Result<Self> {
        let mut config: Self = serde_yaml::from_str(content).context("parse yaml")?;
        if let Some(secret) = secret_override.filter(|secret| !secret.is_empty()) {
            config.credentials.api_secret = secret;
        }
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> anyhow::Result<()> {
        let credentials = &self.credentials;
        if credentials.client_id.trim().is_empty() {
            bail!("credentials.client_id must not be empty");
        }
        if credentials.api_key.trim().is_empty() {
            bail!("credentials.api_key must not be empty");
        }
        if credentials.api_secret.trim().is_empty() {
            bail!("credentials.api_secret must be set in the file or via {SECRET_ENV_VAR}");
        }
        if self.stream.idle_timeout_secs == 0 {
            bail!("stream.idle_timeout_secs must be positive");
        }
        Ok(())
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(
            &self.credentials.client_id,
            &self.credentials.api_key,
            &self.credentials.api_secret,
        )
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            url: self.stream.url.clone(),
            idle_timeout: Duration::from_secs(self.stream.idle_timeout_secs),
            channel_capacity: self.stream.channel_capacity,
        }
    }
}
