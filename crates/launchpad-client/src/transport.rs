//! HTTP transport seam
//!
//! [`Transport`] executes one request and hands back the raw status and body.
//! Status-code policy lives in [`crate::client::PlatformClient`], so fakes only
//! need to script responses.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use crate::error::ClientError;
use crate::Result;

/// HTTP verbs used against the platform and the webhook
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A fully-formed outbound request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// JSON body, already serialized
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        HttpRequest {
            method,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: None,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn with_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first header with this name (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw response: status code and body text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        HttpResponse {
            status,
            body: body.into(),
        }
    }
}

/// Executes HTTP requests
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform the call. Only network-level failures are errors here;
    /// any HTTP status is a successful transport round trip.
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Production transport backed by `reqwest`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport with a finite per-request timeout
    pub fn new(timeout: Duration) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(concat!("launchpad/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(ReqwestTransport { http_client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&request.url),
            Method::Post => self.http_client.post(&request.url),
        };

        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        } else if request.method == Method::Post {
            builder = builder.body(String::new());
        }

        let response = builder.send().await.map_err(ClientError::from)?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        debug!(method = request.method.as_str(), url = %request.url, status, "HTTP round trip");

        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults_to_json_content_type() {
        let request = HttpRequest::new(Method::Get, "https://example.test/api/projects");
        assert_eq!(request.header("content-type"), Some("application/json"));
        assert!(request.body.is_none());
    }

    #[test]
    fn test_request_header_lookup_is_case_insensitive() {
        let request = HttpRequest::new(Method::Post, "https://example.test")
            .with_header("Authorization", "Bearer abc");
        assert_eq!(request.header("authorization"), Some("Bearer abc"));
        assert_eq!(request.header("x-missing"), None);
    }

    #[test]
    fn test_reqwest_transport_builds() {
        assert!(ReqwestTransport::new(Duration::from_secs(5)).is_ok());
    }
}
