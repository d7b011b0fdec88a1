//! Platform configuration
//!
//! A [`PlatformConfig`] is built once at start-up and shared (by reference or
//! `Arc`) with every component. Nothing in this crate reads process-wide
//! state after that point.

use std::fmt;
use std::time::Duration;

/// Data center used when `WORKATO_DC` is not set
pub const DEFAULT_DATA_CENTER: &str = "preview";

/// Per-request timeout used when none is configured
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 30;

/// Credential scope on the platform.
///
/// Project identifiers are local to one of these, so a handle obtained with
/// one set of credentials must be polled with the same set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Environment {
    /// Origin environment: builds are created and deployed from here
    Dev,
    /// Target environment: test cases run here
    Test,
}

impl Environment {
    pub fn name(&self) -> &'static str {
        match self {
            Environment::Dev => "dev",
            Environment::Test => "test",
        }
    }

    /// Environment variable holding the bearer token for this environment
    pub fn token_var(&self) -> &'static str {
        match self {
            Environment::Dev => "WORKATO_DEV_ENV_AUTH_TOKEN",
            Environment::Test => "WORKATO_TEST_ENV_AUTH_TOKEN",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Immutable connection settings for the platform API
#[derive(Clone)]
pub struct PlatformConfig {
    /// Base URL, e.g. `https://preview.workato.com`
    pub host: String,
    /// Bearer token for [`Environment::Dev`]
    pub dev_token: Option<String>,
    /// Bearer token for [`Environment::Test`]
    pub test_token: Option<String>,
    /// Timeout applied to every single HTTP call
    pub http_timeout: Duration,
}

impl PlatformConfig {
    /// Create a config for an explicit host, without credentials
    pub fn new(host: &str) -> Self {
        PlatformConfig {
            host: host.trim_end_matches('/').to_string(),
            dev_token: None,
            test_token: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    /// Create a config for a data center (`preview`, `www`, ...)
    pub fn for_data_center(dc: &str) -> Self {
        Self::new(&format!("https://{}.workato.com", dc))
    }

    /// Set the bearer token for an environment
    pub fn with_token(mut self, env: Environment, token: &str) -> Self {
        let token = Some(token.to_string());
        match env {
            Environment::Dev => self.dev_token = token,
            Environment::Test => self.test_token = token,
        }
        self
    }

    /// Set the per-request timeout
    pub fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Bearer token for an environment, if configured
    pub fn token(&self, env: Environment) -> Option<&str> {
        match env {
            Environment::Dev => self.dev_token.as_deref(),
            Environment::Test => self.test_token.as_deref(),
        }
    }

    /// Host without scheme, as shown in failure messages
    pub fn host_name(&self) -> &str {
        self.host
            .split_once("://")
            .map(|(_, rest)| rest)
            .unwrap_or(&self.host)
    }

    /// Absolute URL for an API path (`/api/...`)
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.host, path)
    }
}

impl fmt::Debug for PlatformConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |t: &Option<String>| t.as_ref().map(|_| "<redacted>");
        f.debug_struct("PlatformConfig")
            .field("host", &self.host)
            .field("dev_token", &redact(&self.dev_token))
            .field("test_token", &redact(&self.test_token))
            .field("http_timeout", &self.http_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_data_center_builds_host() {
        let config = PlatformConfig::for_data_center("preview");
        assert_eq!(config.host, "https://preview.workato.com");
        assert_eq!(config.host_name(), "preview.workato.com");
        assert_eq!(
            config.http_timeout,
            Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS)
        );
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = PlatformConfig::new("http://127.0.0.1:8080/");
        assert_eq!(config.url("/api/projects"), "http://127.0.0.1:8080/api/projects");
        assert_eq!(config.host_name(), "127.0.0.1:8080");
    }

    #[test]
    fn test_with_token_is_scoped_per_environment() {
        let config = PlatformConfig::new("https://example.test").with_token(Environment::Dev, "d");
        assert_eq!(config.token(Environment::Dev), Some("d"));
        assert_eq!(config.token(Environment::Test), None);
    }

    #[test]
    fn test_tokens_come_only_from_the_builder() {
        std::env::set_var(Environment::Dev.token_var(), "from-process-env");
        let config = PlatformConfig::for_data_center("www");
        assert_eq!(config.token(Environment::Dev), None);
        assert_eq!(config.token(Environment::Test), None);
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = PlatformConfig::new("https://example.test")
            .with_token(Environment::Test, "super-secret");
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
