//! Authenticated platform client
//!
//! Every platform call goes through [`PlatformClient`], which attaches the
//! bearer token of the requested [`Environment`], accepts exactly one status
//! code and decodes the JSON body. There is no retry at this layer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::{Environment, PlatformConfig};
use crate::error::ClientError;
use crate::transport::{HttpRequest, Method, Transport};
use crate::Result;

/// The only status code the platform API treats as success
pub const SUCCESS_STATUS: u16 = 200;

/// Side channel invoked when a platform call returns a non-success status.
///
/// The hook runs before the error is handed back to the caller. It must not
/// fail; whatever it does on error is its own business.
#[async_trait]
pub trait FailureHook: Send + Sync {
    async fn on_remote_failure(&self, error: &ClientError);
}

/// Client for the platform REST API
#[derive(Clone)]
pub struct PlatformClient {
    config: Arc<PlatformConfig>,
    transport: Arc<dyn Transport>,
    failure_hook: Option<Arc<dyn FailureHook>>,
}

impl PlatformClient {
    /// Create a client without a failure hook
    pub fn new(config: Arc<PlatformConfig>, transport: Arc<dyn Transport>) -> Self {
        PlatformClient {
            config,
            transport,
            failure_hook: None,
        }
    }

    /// Attach a hook fired on every [`ClientError::RemoteCallFailed`]
    pub fn with_failure_hook(mut self, hook: Arc<dyn FailureHook>) -> Self {
        self.failure_hook = Some(hook);
        self
    }

    /// Same connection, no hook. Used by the notifier so a failing lookup
    /// cannot re-enter the failure notification path.
    pub fn without_failure_hook(&self) -> Self {
        PlatformClient {
            config: Arc::clone(&self.config),
            transport: Arc::clone(&self.transport),
            failure_hook: None,
        }
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    /// `GET {host}{path}` with the credentials of `env`
    pub async fn get_json<T: DeserializeOwned>(&self, env: Environment, path: &str) -> Result<T> {
        let request = self.authorize(env, HttpRequest::new(Method::Get, self.config.url(path)))?;
        self.call(request).await
    }

    /// `POST {host}{path}` with an optional JSON body and the credentials of `env`
    pub async fn post_json<B, T>(&self, env: Environment, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let mut request = HttpRequest::new(Method::Post, self.config.url(path));
        if let Some(body) = body {
            let encoded = serde_json::to_string(body)
                .map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
            request = request.with_body(encoded);
        }
        let request = self.authorize(env, request)?;
        self.call(request).await
    }

    fn authorize(&self, env: Environment, request: HttpRequest) -> Result<HttpRequest> {
        let token = self.config.token(env).ok_or_else(|| {
            ClientError::InvalidRequest(format!(
                "no credentials for the {} environment ({} is not set)",
                env,
                env.token_var()
            ))
        })?;
        Ok(request.with_header("Authorization", &format!("Bearer {}", token)))
    }

    async fn call<T: DeserializeOwned>(&self, request: HttpRequest) -> Result<T> {
        let url = request.url.clone();
        debug!(method = request.method.as_str(), url = %url, "Calling platform API");

        let response = self.transport.execute(request).await?;
        if response.status != SUCCESS_STATUS {
            let error = ClientError::RemoteCallFailed {
                status: response.status,
                host: self.config.host_name().to_string(),
                body: response.body,
            };
            warn!(url = %url, status = response.status, "Platform call failed");
            if let Some(hook) = &self.failure_hook {
                hook.on_remote_failure(&error).await;
            }
            return Err(error);
        }

        serde_json::from_str(&response.body).map_err(|source| ClientError::Decode { url, source })
    }
}

/// Posts JSON payloads to an unauthenticated webhook endpoint
#[derive(Clone)]
pub struct WebhookClient {
    url: String,
    transport: Arc<dyn Transport>,
}

impl WebhookClient {
    pub fn new(url: &str, transport: Arc<dyn Transport>) -> Self {
        WebhookClient {
            url: url.to_string(),
            transport,
        }
    }

    /// Deliver one payload. Any 2xx status counts as delivered.
    pub async fn post<P: Serialize + ?Sized>(&self, payload: &P) -> Result<()> {
        let body =
            serde_json::to_string(payload).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let request = HttpRequest::new(Method::Post, self.url.as_str()).with_body(body);

        let response = self.transport.execute(request).await?;
        if !(200..300).contains(&response.status) {
            return Err(ClientError::RemoteCallFailed {
                status: response.status,
                host: host_of(&self.url).to_string(),
                body: response.body,
            });
        }
        Ok(())
    }
}

fn host_of(url: &str) -> &str {
    let rest = url.split_once("://").map(|(_, r)| r).unwrap_or(url);
    rest.split('/').next().unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeTransport;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn client(transport: Arc<FakeTransport>) -> PlatformClient {
        let config = PlatformConfig::new("https://preview.workato.com")
            .with_token(Environment::Dev, "dev-token")
            .with_token(Environment::Test, "test-token");
        PlatformClient::new(Arc::new(config), transport)
    }

    #[derive(Default)]
    struct CountingHook {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl FailureHook for CountingHook {
        async fn on_remote_failure(&self, _error: &ClientError) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_get_json_attaches_bearer_for_environment() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond(Method::Get, "/api/projects", 200, json!([]));

        let _: Value = client(transport.clone())
            .get_json(Environment::Test, "/api/projects")
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, "https://preview.workato.com/api/projects");
        assert_eq!(requests[0].header("Authorization"), Some("Bearer test-token"));
    }

    #[tokio::test]
    async fn test_non_200_is_remote_call_failed_with_body() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_raw(Method::Get, "/api/projects", 201, "created?");

        let err = client(transport)
            .get_json::<Value>(Environment::Dev, "/api/projects")
            .await
            .unwrap_err();

        match err {
            ClientError::RemoteCallFailed { status, host, body } => {
                assert_eq!(status, 201);
                assert_eq!(host, "preview.workato.com");
                assert_eq!(body, "created?");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_failure_hook_fires_once_per_failed_call() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_raw(Method::Post, "/api/test_cases/run_requests", 500, "boom");
        let hook = Arc::new(CountingHook::default());

        let client = client(transport).with_failure_hook(hook.clone());
        let result: Result<Value> = client
            .post_json(Environment::Test, "/api/test_cases/run_requests", Some(&json!({})))
            .await;

        assert!(result.is_err());
        assert_eq!(hook.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_without_failure_hook_skips_hook() {
        let transport = Arc::new(FakeTransport::new());
        let hook = Arc::new(CountingHook::default());
        let client = client(transport).with_failure_hook(hook.clone());
        let plain = client.without_failure_hook();

        let _ = plain.get_json::<Value>(Environment::Dev, "/api/projects").await;
        assert_eq!(hook.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_token_fails_before_any_request() {
        let transport = Arc::new(FakeTransport::new());
        let config = PlatformConfig::new("https://preview.workato.com");
        let client = PlatformClient::new(Arc::new(config), transport.clone());

        let err = client
            .get_json::<Value>(Environment::Dev, "/api/projects")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("WORKATO_DEV_ENV_AUTH_TOKEN"));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_undecodable_body_is_decode_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_raw(Method::Get, "/api/projects", 200, "<html>");

        let err = client(transport)
            .get_json::<Value>(Environment::Dev, "/api/projects")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_webhook_post_has_no_authorization() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_raw(Method::Post, "/hooks/pr-bot", 204, "");
        let webhook =
            WebhookClient::new("https://bot.example.test/hooks/pr-bot", transport.clone());

        webhook.post(&json!({"event": "pr_approved"})).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].header("Authorization"), None);
        assert_eq!(requests[0].header("Content-Type"), Some("application/json"));
    }

    #[tokio::test]
    async fn test_webhook_non_2xx_is_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.respond_raw(Method::Post, "/hooks/pr-bot", 502, "bad gateway");
        let webhook = WebhookClient::new("https://bot.example.test/hooks/pr-bot", transport);

        let err = webhook.post(&json!({})).await.unwrap_err();
        assert_eq!(err.to_string(), "Response to bot.example.test failed: bad gateway");
    }
}
