//! Model and transport configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const CHAT_COMPLETIONS_PATH: &str = "/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, Default)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }

    /// True when the secret is empty or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    /// Read a secret from an environment variable.
    ///
    /// Returns `None` when the variable is unset or blank.
    pub fn from_env(var: &str) -> Option<Self> {
        std::env::var(var)
            .ok()
            .map(Self::new)
            .filter(|s| !s.is_empty())
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Sampling parameters sent with every request.
///
/// # Example
/// ```rust
/// use chatstream::options::ModelOptions;
///
/// let options = ModelOptions::default()
///     .with_model("gpt-4o".to_string())
///     .with_temperature(0.2);
/// assert_eq!(options.model, "gpt-4o");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelOptions {
    /// Model identifier (e.g., "gpt-4o")
    pub model: String,

    /// Temperature for sampling (0.0 - 1.0). Passed through unchanged.
    pub temperature: f32,
}

impl Default for ModelOptions {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl ModelOptions {
    pub fn new(model: impl Into<String>, temperature: f32) -> Self {
        Self {
            model: model.into(),
            temperature,
        }
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: String) -> Self {
        self.model = model;
        self
    }

    /// Set the temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

/// HTTP transport configuration.
///
/// # Example
/// ```rust
/// use chatstream::options::TransportOptions;
/// use std::time::Duration;
///
/// let options = TransportOptions::default()
///     .with_base_url("http://localhost:8080".to_string())
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(options.endpoint(), "http://localhost:8080/v1/chat/completions");
/// ```
#[derive(Debug, Clone, Default)]
pub struct TransportOptions {
    /// Base URL for the API; defaults to [`DEFAULT_BASE_URL`]
    pub base_url: Option<String>,

    /// Request timeout, covering connect and the whole body read
    pub timeout: Option<Duration>,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl TransportOptions {
    /// Full URL of the chat-completion endpoint.
    pub fn endpoint(&self) -> String {
        let base = self.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        format!("{}{}", base.trim_end_matches('/'), CHAT_COMPLETIONS_PATH)
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_debug_is_redacted() {
        let secret = SecretString::from("sk-very-secret");
        assert_eq!(format!("{:?}", secret), "SecretString([REDACTED])");
        assert_eq!(secret.expose_secret(), "sk-very-secret");
    }

    #[test]
    fn test_secret_is_empty() {
        assert!(SecretString::from("").is_empty());
        assert!(SecretString::from("  ").is_empty());
        assert!(!SecretString::from("k").is_empty());
    }

    #[test]
    fn test_secret_from_missing_env() {
        assert!(SecretString::from_env("CHATSTREAM_TEST_SURELY_UNSET_VAR").is_none());
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            TransportOptions::default().endpoint(),
            "https://api.openai.com/v1/chat/completions"
        );
        let options = TransportOptions::default().with_base_url("http://127.0.0.1:1234/".into());
        assert_eq!(
            options.endpoint(),
            "http://127.0.0.1:1234/v1/chat/completions"
        );
    }

    #[test]
    fn test_with_header_accumulates() {
        let options = TransportOptions::default()
            .with_header("X-A".into(), "1".into())
            .with_header("X-B".into(), "2".into());
        assert_eq!(options.extra_headers.unwrap().len(), 2);
    }
}
