//! Deployment orchestration.
//!
//! Launches a deploy of a project build into an environment, polls the
//! deployment until it reaches a terminal state and reports the result.

use launchpad_client::{Deployment, EnvironmentType, PlatformApi, RemoteId, RequestHandle};
use std::sync::Arc;
use tracing::info;

use crate::console::{Color, Console};
use crate::error::Result;
use crate::poller::{poll_until, PollPolicy};

/// Printed on every non-terminal observation
pub const DEPLOY_PROGRESS_LINE: &str = "Deployment is in progress...";

/// Final state of a deployment
#[derive(Debug, Clone, PartialEq)]
pub struct DeployOutcome {
    pub handle: RequestHandle,
    pub deployment: Deployment,
}

impl DeployOutcome {
    pub fn succeeded(&self) -> bool {
        self.deployment.succeeded()
    }
}

/// Deploys project builds and waits for them
pub struct Deployer {
    api: PlatformApi,
    console: Arc<Console>,
    policy: PollPolicy,
}

impl Deployer {
    pub fn new(api: PlatformApi, console: Arc<Console>, policy: PollPolicy) -> Self {
        Deployer {
            api,
            console,
            policy,
        }
    }

    /// Deploy `build_id` into `env_type` and wait for a terminal state.
    ///
    /// A failed deployment is a normal outcome; only remote errors and an
    /// exhausted polling budget are errors.
    pub async fn deploy(
        &self,
        build_id: &RemoteId,
        env_type: EnvironmentType,
        description: Option<&str>,
    ) -> Result<DeployOutcome> {
        let handle = self
            .api
            .launch_deployment(build_id, env_type, description)
            .await?;

        let api = &self.api;
        let console = &self.console;
        let handle_ref = &handle;
        let operation = format!("deployment {}", handle.id);
        let deployment = poll_until(&self.policy, &operation, || async move {
            let deployment = api.fetch_deployment(handle_ref).await?;
            if deployment.is_terminal() {
                Ok(Some(deployment))
            } else {
                console.line(DEPLOY_PROGRESS_LINE);
                Ok(None)
            }
        })
        .await?;

        let outcome = DeployOutcome { handle, deployment };
        self.report(&outcome);
        Ok(outcome)
    }

    fn report(&self, outcome: &DeployOutcome) {
        info!(
            deployment_id = %outcome.handle.id,
            state = %outcome.deployment.state,
            success = outcome.succeeded(),
            "Deployment finished"
        );

        if outcome.succeeded() {
            self.console.colored_line(Color::Green, "Deployment succeeded");
        } else {
            self.console.colored_line(Color::Red, "Deployment failed");
            self.console.line("");
            let details = serde_json::to_string_pretty(&outcome.deployment.details)
                .unwrap_or_else(|_| outcome.deployment.details.to_string());
            self.console.line(&details);
        }
    }
}
