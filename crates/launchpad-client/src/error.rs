//! Error types for launchpad-client

use thiserror::Error;

/// Errors that can occur while talking to the platform API or a webhook
#[derive(Error, Debug)]
pub enum ClientError {
    /// The remote answered with anything other than the accepted status code
    #[error("Response to {host} failed: {body}")]
    RemoteCallFailed {
        /// HTTP status code returned by the remote
        status: u16,
        /// Host the request was sent to (scheme stripped)
        host: String,
        /// Raw response body
        body: String,
    },

    /// Network-level failure (connect error, per-request timeout, ...)
    #[error("Transport error: {0}")]
    Transport(String),

    /// Response body was not the JSON shape we consume
    #[error("Unexpected response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// Request could not be built
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ClientError {
    /// Whether this is a non-success HTTP status (as opposed to a network failure)
    pub fn is_remote_failure(&self) -> bool {
        matches!(self, ClientError::RemoteCallFailed { .. })
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            ClientError::InvalidRequest(err.to_string())
        } else {
            ClientError::Transport(err.to_string())
        }
    }
}
