//! Looker connection configuration.
//!
//! Explicitly supplied values take precedence over the `LOOKER_*` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required value was neither configured nor present in the environment.
    #[error("Missing required configuration value: {0} (or set {1})")]
    MissingValue(&'static str, &'static str),

    /// Invalid configuration value.
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue {
        /// Configuration key.
        key: String,
        /// Error message.
        message: String,
    },
}

/// Connection settings for a Looker instance.
#[derive(Clone, Serialize, Deserialize)]
pub struct LookerConfig {
    /// Looker host base URL without `/api/*`, e.g.
    /// `https://myinstance.looker.com:19999`.
    pub base_url: String,

    /// API3 client ID.
    pub client_id: Option<String>,

    /// API3 client secret.
    pub client_secret: Option<String>,

    /// Request timeout in seconds.
    pub timeout_secs: u64,

    /// Whether to verify TLS certificates (disable only for testing).
    pub verify_tls: bool,
}

impl Default for LookerConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            client_id: None,
            client_secret: None,
            timeout_secs: 30,
            verify_tls: true,
        }
    }
}

impl fmt::Debug for LookerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LookerConfig")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id.as_ref().map(|_| "<redacted>"))
            .field("client_secret", &self.client_secret.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .field("verify_tls", &self.verify_tls)
            .finish()
    }
}

impl LookerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LOOKER_BASE_URL`: Looker host base URL
    /// - `LOOKER_CLIENT_ID`: API3 client ID
    /// - `LOOKER_CLIENT_SECRET`: API3 client secret
    /// - `LOOKER_TIMEOUT_SECS`: Request timeout in seconds (default: 30)
    /// - `LOOKER_VERIFY_TLS`: Whether to verify TLS (default: true)
    pub fn from_env() -> Self {
        let default = Self::default();

        Self {
            base_url: std::env::var("LOOKER_BASE_URL").unwrap_or(default.base_url),
            client_id: std::env::var("LOOKER_CLIENT_ID").ok(),
            client_secret: std::env::var("LOOKER_CLIENT_SECRET").ok(),
            timeout_secs: std::env::var("LOOKER_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(default.timeout_secs),
            verify_tls: std::env::var("LOOKER_VERIFY_TLS")
                .map(|s| s != "false" && s != "0")
                .unwrap_or(default.verify_tls),
        }
    }

    /// Fill unset values from the environment. Values already set win.
    pub fn merge_env(self) -> Self {
        let env = Self::from_env();

        Self {
            base_url: if self.base_url.is_empty() {
                env.base_url
            } else {
                self.base_url
            },
            client_id: self.client_id.or(env.client_id),
            client_secret: self.client_secret.or(env.client_secret),
            ..self
        }
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Set the API3 credentials.
    pub fn with_credentials(
        mut self,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self.client_secret = Some(client_secret.into());
        self
    }

    /// Set the request timeout.
    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Get the request timeout as a Duration.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Check that everything needed to log in is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.is_empty() {
            return Err(ConfigError::MissingValue("base_url", "LOOKER_BASE_URL"));
        }
        if self.client_id.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingValue("client_id", "LOOKER_CLIENT_ID"));
        }
        if self.client_secret.as_deref().map_or(true, str::is_empty) {
            return Err(ConfigError::MissingValue(
                "client_secret",
                "LOOKER_CLIENT_SECRET",
            ));
        }
        if self.base_url.len() < 8 {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                message: "must be at least 8 characters".to_string(),
            });
        }
        if self.base_url.contains("/api/") {
            return Err(ConfigError::InvalidValue {
                key: "base_url".to_string(),
                message: "must be the host URL without /api/*".to_string(),
            });
        }
        Ok(())
    }

    /// Build a full API 4.0 URL for `path`.
    pub fn api_url(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{}/api/4.0/{}", base, path)
    }
}
