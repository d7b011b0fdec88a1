//! Launch error taxonomy.
//!
//! Business outcomes (failed tests, failed deployment) are not errors; they
//! come back as values from the orchestrators.

use launchpad_client::ClientError;

/// Errors that abort a launcher command.
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("Incorrect input: {0}")]
    Validation(String),

    #[error(transparent)]
    Remote(#[from] ClientError),

    #[error("{operation} did not finish after {attempts} polling attempts")]
    Timeout { operation: String, attempts: u32 },

    #[error("project {id} not found in the origin environment")]
    ProjectNotFound { id: String },

    #[error("expected exactly one project named '{name}' in the target environment, found {matches}")]
    AmbiguousOrMissingMatch { name: String, matches: usize },

    #[error("{field} not found in pull request metadata")]
    MissingPattern { field: String },

    #[error("notification failed: {0}")]
    Notification(String),
}

impl LaunchError {
    /// The remote failure behind this error, if any
    pub fn as_remote(&self) -> Option<&ClientError> {
        match self {
            LaunchError::Remote(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type for launch operations.
pub type Result<T> = std::result::Result<T, LaunchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display_matches_cli_wording() {
        let err = LaunchError::Validation("project_build_id is required".to_string());
        assert_eq!(err.to_string(), "Incorrect input: project_build_id is required");
    }

    #[test]
    fn test_remote_is_transparent() {
        let err = LaunchError::from(ClientError::RemoteCallFailed {
            status: 500,
            host: "preview.workato.com".to_string(),
            body: "oops".to_string(),
        });
        assert_eq!(err.to_string(), "Response to preview.workato.com failed: oops");
        assert!(err.as_remote().is_some());
    }

    #[test]
    fn test_timeout_display() {
        let err = LaunchError::Timeout {
            operation: "deployment 7".to_string(),
            attempts: 100,
        };
        assert!(err.to_string().contains("100 polling attempts"));
        assert!(err.as_remote().is_none());
    }

    #[test]
    fn test_ambiguous_match_display() {
        let err = LaunchError::AmbiguousOrMissingMatch {
            name: "Billing".to_string(),
            matches: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("'Billing'"));
        assert!(msg.contains("found 2"));
    }
}
