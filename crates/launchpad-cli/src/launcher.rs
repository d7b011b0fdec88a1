//! Command dispatch.
//!
//! `test` and `deploy` take their identifiers from stdin. The remaining
//! commands are driven by pull-request metadata and report to the PR bot
//! webhook.

use std::sync::{Arc, OnceLock};

use launchpad_client::{
    Environment, EnvironmentType, PlatformApi, PlatformClient, PlatformConfig, RemoteId, Transport,
    WebhookClient,
};
use launchpad_core::{
    resolve_target_project_id, Console, Deployer, LaunchError, NotificationContext,
    NotificationEvent, Notifier, PollPolicy, PrMetadata, Result, TestRunner,
};
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{info, warn};

/// Launcher commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Test,
    Deploy,
    TestPackage,
    DeployToProduction,
    NotifyReviewRequested,
    NotifyPrApproved,
}

impl Command {
    pub const ALL: [Command; 6] = [
        Command::Test,
        Command::Deploy,
        Command::TestPackage,
        Command::DeployToProduction,
        Command::NotifyReviewRequested,
        Command::NotifyPrApproved,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Command::Test => "test",
            Command::Deploy => "deploy",
            Command::TestPackage => "test_package",
            Command::DeployToProduction => "deploy_to_production",
            Command::NotifyReviewRequested => "notify_review_requested",
            Command::NotifyPrApproved => "notify_pr_approved",
        }
    }

    pub fn from_name(name: &str) -> Option<Command> {
        Self::ALL.into_iter().find(|c| c.name() == name)
    }

    /// Whether identifiers come from standard input
    pub fn reads_stdin(&self) -> bool {
        matches!(self, Command::Test | Command::Deploy)
    }
}

/// Message for a missing or unknown command
pub fn usage() -> String {
    let names: Vec<&str> = Command::ALL.iter().map(Command::name).collect();
    format!("Incorrect command. Use one of: {}", names.join(", "))
}

fn stdin_project_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^project_id: (\d+)").expect("valid regex"))
}

fn stdin_build_id_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^project_build_id: (\d+)").expect("valid regex"))
}

/// Identifiers scraped from `key: value` lines on stdin
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StdinIds {
    pub project_id: Option<RemoteId>,
    pub project_build_id: Option<RemoteId>,
}

impl StdinIds {
    pub fn parse(input: &str) -> Self {
        let capture = |re: &Regex| {
            re.captures(input)
                .and_then(|c| c.get(1))
                .map(|m| RemoteId::new(m.as_str()))
        };
        StdinIds {
            project_id: capture(stdin_project_id_pattern()),
            project_build_id: capture(stdin_build_id_pattern()),
        }
    }
}

fn required(id: Option<RemoteId>, field: &str) -> Result<RemoteId> {
    id.ok_or_else(|| LaunchError::Validation(format!("{} is required", field)))
}

/// Wires configuration, transport and console into the orchestrators
pub struct Launcher {
    config: Arc<PlatformConfig>,
    transport: Arc<dyn Transport>,
    console: Arc<Console>,
    policy: PollPolicy,
    webhook_url: Option<String>,
    pr: PrMetadata,
}

impl Launcher {
    pub fn new(
        config: Arc<PlatformConfig>,
        transport: Arc<dyn Transport>,
        console: Arc<Console>,
    ) -> Self {
        Launcher {
            config,
            transport,
            console,
            policy: PollPolicy::default(),
            webhook_url: None,
            pr: PrMetadata::default(),
        }
    }

    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_pull_request(mut self, webhook_url: Option<String>, pr: PrMetadata) -> Self {
        self.webhook_url = webhook_url.filter(|url| !url.is_empty());
        self.pr = pr;
        self
    }

    /// Run one command.
    ///
    /// `Ok(false)` means the command ran but the outcome was a failure
    /// (failed tests or a failed deployment).
    pub async fn execute(&self, command: Command, stdin: &str) -> Result<bool> {
        match command {
            Command::Test => self.test(StdinIds::parse(stdin)).await,
            Command::Deploy => self.deploy(StdinIds::parse(stdin)).await,
            Command::TestPackage => self.test_package().await,
            Command::DeployToProduction => self.deploy_to_production().await,
            Command::NotifyReviewRequested => {
                self.notify_pr_event(NotificationEvent::ReviewRequested).await
            }
            Command::NotifyPrApproved => self.notify_pr_event(NotificationEvent::PrApproved).await,
        }
    }

    fn require_token(&self, env: Environment) -> Result<()> {
        match self.config.token(env) {
            Some(token) if !token.is_empty() => Ok(()),
            _ => Err(LaunchError::Validation(format!(
                "{} is not set",
                env.token_var()
            ))),
        }
    }

    fn client(&self) -> PlatformClient {
        PlatformClient::new(Arc::clone(&self.config), Arc::clone(&self.transport))
    }

    fn notifier(&self, client: &PlatformClient) -> Result<Arc<Notifier>> {
        let url = self
            .webhook_url
            .as_deref()
            .ok_or_else(|| LaunchError::Validation("PR_BOT_WEBHOOK_URL is not set".to_string()))?;
        let webhook = WebhookClient::new(url, Arc::clone(&self.transport));
        Ok(Arc::new(Notifier::new(
            webhook,
            client,
            NotificationContext::from_pr(&self.pr),
        )))
    }

    fn deployer(&self, api: PlatformApi) -> Deployer {
        Deployer::new(api, Arc::clone(&self.console), self.policy)
    }

    fn test_runner(&self, api: PlatformApi) -> TestRunner {
        TestRunner::new(api, Arc::clone(&self.console), self.policy)
    }

    async fn test(&self, ids: StdinIds) -> Result<bool> {
        let project_id = required(ids.project_id, "project_id")?;
        let build_id = required(ids.project_build_id, "project_build_id")?;
        self.require_token(Environment::Test)?;

        info!(project_id = %project_id, build_id = %build_id, "Running test cases");
        let outcome = self
            .test_runner(PlatformApi::new(self.client()))
            .run_tests(&project_id)
            .await?;
        Ok(outcome.all_passed())
    }

    async fn deploy(&self, ids: StdinIds) -> Result<bool> {
        let build_id = required(ids.project_build_id, "project_build_id")?;
        self.require_token(Environment::Dev)?;

        let outcome = self
            .deployer(PlatformApi::new(self.client()))
            .deploy(&build_id, EnvironmentType::Prod, None)
            .await?;
        Ok(outcome.succeeded())
    }

    async fn test_package(&self) -> Result<bool> {
        let build_id = self.pr.project_build_id()?;
        let folder_id = self.pr.folder_id()?;
        self.require_token(Environment::Dev)?;
        self.require_token(Environment::Test)?;

        let base = self.client();
        let notifier = self.notifier(&base)?;
        let api = PlatformApi::new(base.with_failure_hook(notifier.clone()));

        info!(build_id = %build_id, folder_id = %folder_id, "Testing package");
        match self.deploy_and_test(&api, &notifier, &build_id).await {
            Err(err) => Err(report_failure(&notifier, err).await),
            ok => ok,
        }
    }

    async fn deploy_and_test(
        &self,
        api: &PlatformApi,
        notifier: &Arc<Notifier>,
        build_id: &RemoteId,
    ) -> Result<bool> {
        let deployment = self
            .deployer(api.clone())
            .deploy(build_id, EnvironmentType::Test, None)
            .await?;
        if !deployment.succeeded() {
            let mut extra = Map::new();
            extra.insert("reason".to_string(), Value::String("Deployment failed".to_string()));
            extra.insert(
                "state".to_string(),
                Value::String(deployment.deployment.state.clone()),
            );
            notifier.notify(NotificationEvent::BuildFailed, extra).await?;
            return Ok(false);
        }

        let project_id = resolve_target_project_id(api, build_id).await?;
        let outcome = self
            .test_runner(api.clone())
            .with_notifier(Arc::clone(notifier))
            .run_tests(&project_id)
            .await?;
        Ok(outcome.all_passed())
    }

    async fn deploy_to_production(&self) -> Result<bool> {
        let build_id = self.pr.project_build_id()?;
        self.require_token(Environment::Dev)?;

        let base = self.client();
        let notifier = self.notifier(&base)?;
        let api = PlatformApi::new(base.with_failure_hook(notifier.clone()));

        match self.release(api, &notifier, &build_id).await {
            Err(err) => Err(report_failure(&notifier, err).await),
            ok => ok,
        }
    }

    async fn release(
        &self,
        api: PlatformApi,
        notifier: &Notifier,
        build_id: &RemoteId,
    ) -> Result<bool> {
        notifier.notify(NotificationEvent::PrMerged, Map::new()).await?;

        let description = self.pr.release_description();
        let outcome = self
            .deployer(api)
            .deploy(build_id, EnvironmentType::Prod, description.as_deref())
            .await?;

        let event = if outcome.succeeded() {
            NotificationEvent::DeploymentSucceeded
        } else {
            NotificationEvent::DeploymentFailed
        };
        let mut extra = Map::new();
        extra.insert(
            "state".to_string(),
            Value::String(outcome.deployment.state.clone()),
        );
        notifier.notify(event, extra).await?;
        Ok(outcome.succeeded())
    }

    async fn notify_pr_event(&self, event: NotificationEvent) -> Result<bool> {
        // The project name lookup only happens when the PR names a build.
        if self.pr.project_build_id().is_ok() {
            self.require_token(Environment::Dev)?;
        }
        let notifier = self.notifier(&self.client())?;

        let mut extra = Map::new();
        extra.insert("author".to_string(), Value::String(self.pr.author.clone()));
        extra.insert("reviewer".to_string(), Value::String(self.pr.reviewer.clone()));
        notifier.notify(event, extra).await?;
        Ok(true)
    }
}

/// Leave exactly one `pr_build_failed` behind a failed webhook command.
///
/// Non-success HTTP statuses were already reported by the client's failure
/// hook, and a failed webhook delivery cannot be reported through itself.
async fn report_failure(notifier: &Notifier, err: LaunchError) -> LaunchError {
    let hook_fired = err.as_remote().is_some_and(|e| e.is_remote_failure());
    if hook_fired || matches!(err, LaunchError::Notification(_)) {
        return err;
    }

    let mut extra = Map::new();
    extra.insert("reason".to_string(), Value::String(err.to_string()));
    if let Err(notify_err) = notifier.notify(NotificationEvent::BuildFailed, extra).await {
        warn!(error = %notify_err, "Failure notification could not be sent");
    }
    err
}
