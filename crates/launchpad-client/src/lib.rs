//! Launchpad-Client: platform REST access for Launchpad
//!
//! This crate owns every byte that crosses the network. It turns typed
//! operations (launch a deployment, fetch a run request, list projects) into
//! authenticated HTTP calls and turns responses back into typed values.
//!
//! ## Layer 0 - Remote I/O
//!
//! Focus: one success status, typed failures, no retries.
//!
//! ## Key Components
//!
//! - `PlatformConfig`: immutable host, credentials and timeout
//! - `Transport`: seam over the HTTP stack (`ReqwestTransport`, `fakes::FakeTransport`)
//! - `PlatformClient`: bearer auth, status check, failure hook
//! - `PlatformApi`: the consumed endpoints
//! - `WebhookClient`: unauthenticated JSON delivery

pub mod api;
pub mod client;
mod config;
mod error;
pub mod fakes;
pub mod transport;

pub use api::{
    Deployment, EnvironmentType, PlatformApi, Project, ProjectBuild, RemoteId, RequestHandle,
    RunRequest, TestResult, DEPLOYMENT_SUCCESS, RUN_COMPLETED, TEST_SUCCEEDED,
};
pub use client::{FailureHook, PlatformClient, WebhookClient, SUCCESS_STATUS};
pub use config::{Environment, PlatformConfig, DEFAULT_DATA_CENTER, DEFAULT_HTTP_TIMEOUT_SECS};
pub use error::ClientError;
pub use transport::{HttpRequest, HttpResponse, Method, ReqwestTransport, Transport};

/// Result type for launchpad-client operations
pub type Result<T> = std::result::Result<T, ClientError>;
