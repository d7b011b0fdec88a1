//! Pull-request webhook notifications.
//!
//! Each lifecycle transition is posted once to the PR bot webhook as a flat
//! JSON object: caller-supplied fields first, then the fixed context fields
//! (`event`, `pr_url`, `folder_id`, `build_id`, `project_name`, `pr_title`),
//! which win on key conflicts. Delivery is fire-and-forget: one round trip,
//! no retry, no persistence.
//!
//! [`Notifier`] is also the [`FailureHook`] for platform calls. Its own
//! lookups use a client without that hook, and an in-flight flag drops any
//! failure notification raised while another notification is being sent.

use async_trait::async_trait;
use launchpad_client::{
    ClientError, FailureHook, PlatformApi, PlatformClient, RemoteId, WebhookClient,
};
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::OnceCell;
use tracing::{info, warn};

use crate::error::{LaunchError, Result};
use crate::pr_metadata::PrMetadata;
use crate::projects::resolve_project_name;

/// Lifecycle events understood by the PR bot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationEvent {
    BuildFailed,
    BuildSucceeded,
    PrMerged,
    DeploymentSucceeded,
    DeploymentFailed,
    ReviewRequested,
    PrApproved,
}

impl NotificationEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationEvent::BuildFailed => "pr_build_failed",
            NotificationEvent::BuildSucceeded => "pr_build_succeeded",
            NotificationEvent::PrMerged => "pr_merged",
            NotificationEvent::DeploymentSucceeded => "deployment_succeeded",
            NotificationEvent::DeploymentFailed => "deployment_failed",
            NotificationEvent::ReviewRequested => "review_requested",
            NotificationEvent::PrApproved => "pr_approved",
        }
    }
}

impl std::fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed context attached to every notification
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationContext {
    /// Browser URL of the pull request
    pub pr_url: String,
    pub pr_title: String,
    pub folder_id: Option<RemoteId>,
    pub build_id: Option<RemoteId>,
}

impl NotificationContext {
    /// Context from PR metadata. Missing ids are carried as `null`.
    pub fn from_pr(pr: &PrMetadata) -> Self {
        NotificationContext {
            pr_url: pr.web_url(),
            pr_title: pr.title.clone(),
            folder_id: pr.folder_id().ok(),
            build_id: pr.project_build_id().ok(),
        }
    }
}

/// Merge caller fields with the fixed context. Fixed fields are written last.
pub fn build_payload(
    event: NotificationEvent,
    context: &NotificationContext,
    project_name: Option<&str>,
    extra: Map<String, Value>,
) -> Map<String, Value> {
    // Same JSON shape as the ids sent to the platform.
    let id = |id: &Option<RemoteId>| {
        id.as_ref()
            .and_then(|i| serde_json::to_value(i).ok())
            .unwrap_or(Value::Null)
    };

    let mut payload = extra;
    payload.insert("event".to_string(), Value::String(event.as_str().to_string()));
    payload.insert("pr_url".to_string(), Value::String(context.pr_url.clone()));
    payload.insert("folder_id".to_string(), id(&context.folder_id));
    payload.insert("build_id".to_string(), id(&context.build_id));
    payload.insert(
        "project_name".to_string(),
        project_name.map_or(Value::Null, |n| Value::String(n.to_string())),
    );
    payload.insert("pr_title".to_string(), Value::String(context.pr_title.clone()));
    payload
}

struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Posts notification events to the PR bot webhook
pub struct Notifier {
    webhook: WebhookClient,
    api: PlatformApi,
    context: NotificationContext,
    project_name: OnceCell<Option<String>>,
    notifying: AtomicBool,
}

impl Notifier {
    /// `client` may carry a failure hook; the notifier strips it for its own
    /// lookups.
    pub fn new(
        webhook: WebhookClient,
        client: &PlatformClient,
        context: NotificationContext,
    ) -> Self {
        Notifier {
            webhook,
            api: PlatformApi::new(client.without_failure_hook()),
            context,
            project_name: OnceCell::new(),
            notifying: AtomicBool::new(false),
        }
    }

    /// Origin project name of the PR's build, resolved once per process.
    /// `None` when the PR carries no build id.
    pub async fn project_name(&self) -> Result<Option<String>> {
        let name = self
            .project_name
            .get_or_try_init(|| async {
                match &self.context.build_id {
                    Some(build_id) => resolve_project_name(&self.api, build_id).await.map(Some),
                    None => Ok(None),
                }
            })
            .await?;
        Ok(name.clone())
    }

    /// Send one event. Returns without sending if another notification is
    /// already in flight.
    pub async fn notify(&self, event: NotificationEvent, extra: Map<String, Value>) -> Result<()> {
        if self.notifying.swap(true, Ordering::SeqCst) {
            warn!(event = %event, "Notification already in flight, dropping nested event");
            return Ok(());
        }
        let _in_flight = InFlight(&self.notifying);

        let project_name = self.project_name().await?;
        let payload = build_payload(event, &self.context, project_name.as_deref(), extra);

        self.webhook
            .post(&payload)
            .await
            .map_err(|e| LaunchError::Notification(format!("{} not delivered: {}", event, e)))?;

        info!(event = %event, pr_url = %self.context.pr_url, "Notification sent");
        Ok(())
    }
}

#[async_trait]
impl FailureHook for Notifier {
    async fn on_remote_failure(&self, error: &ClientError) {
        let mut extra = Map::new();
        extra.insert("reason".to_string(), Value::String(error.to_string()));

        if let Err(err) = self.notify(NotificationEvent::BuildFailed, extra).await {
            warn!(error = %err, "Failure notification could not be sent");
        }
    }
}
