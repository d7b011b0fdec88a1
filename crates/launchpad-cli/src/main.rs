//! Launchpad - deployment and test-run launcher
//!
//! The `launchpad` command drives the platform REST API from CI.
//!
//! ## Commands
//!
//! - `test`: run the test cases of a project (ids on stdin)
//! - `deploy`: deploy a project build to production (id on stdin)
//! - `test_package`: deploy a PR's build to the test environment and run its tests
//! - `deploy_to_production`: deploy a merged PR's build to production
//! - `notify_review_requested` / `notify_pr_approved`: relay PR events to the bot

mod launcher;

use anyhow::{Context, Result};
use clap::{Args, Parser};
use launchpad_client::{
    Environment, PlatformConfig, ReqwestTransport, DEFAULT_DATA_CENTER, DEFAULT_HTTP_TIMEOUT_SECS,
};
use launchpad_core::{
    emit_command_error, emit_command_finished, emit_command_started, Color, Console,
    InvocationSpan, PollPolicy, PrMetadata, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL,
};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::Level;

use crate::launcher::{usage, Command, Launcher};

#[derive(Parser)]
#[command(name = "launchpad")]
#[command(author = "Stevedores Org")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Deploy project builds and run their test cases", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Disable ANSI colors in the report
    #[arg(long, global = true)]
    no_color: bool,

    #[command(flatten)]
    platform: PlatformArgs,

    #[command(flatten)]
    pr: PrArgs,

    /// test, deploy, test_package, deploy_to_production,
    /// notify_review_requested or notify_pr_approved
    command: Option<String>,
}

#[derive(Args)]
struct PlatformArgs {
    /// Data center of the platform (`preview`, `www`, ...)
    #[arg(long, env = "WORKATO_DC", default_value = DEFAULT_DATA_CENTER)]
    dc: String,

    /// Full base URL; overrides --dc
    #[arg(long)]
    host: Option<String>,

    /// Token for the origin (dev) environment
    #[arg(long, env = "WORKATO_DEV_ENV_AUTH_TOKEN", hide_env_values = true)]
    dev_token: Option<String>,

    /// Token for the target (test) environment
    #[arg(long, env = "WORKATO_TEST_ENV_AUTH_TOKEN", hide_env_values = true)]
    test_token: Option<String>,

    /// Timeout of a single HTTP call, in seconds
    #[arg(long, default_value_t = DEFAULT_HTTP_TIMEOUT_SECS)]
    http_timeout_secs: u64,

    /// Polls before a deployment or test run is declared timed out
    #[arg(long, default_value_t = DEFAULT_MAX_ATTEMPTS)]
    poll_attempts: u32,

    /// Seconds between polls
    #[arg(long, default_value_t = DEFAULT_POLL_INTERVAL.as_secs())]
    poll_interval_secs: u64,
}

impl PlatformArgs {
    fn config(&self) -> PlatformConfig {
        let mut config = match &self.host {
            Some(host) => PlatformConfig::new(host),
            None => PlatformConfig::for_data_center(&self.dc),
        };
        if let Some(token) = &self.dev_token {
            config = config.with_token(Environment::Dev, token);
        }
        if let Some(token) = &self.test_token {
            config = config.with_token(Environment::Test, token);
        }
        config.with_http_timeout(Duration::from_secs(self.http_timeout_secs))
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(self.poll_attempts, Duration::from_secs(self.poll_interval_secs))
    }
}

#[derive(Args)]
struct PrArgs {
    /// PR bot webhook receiving lifecycle events
    #[arg(long, env = "PR_BOT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    #[arg(long, env = "PR_TITLE", default_value = "")]
    pr_title: String,

    /// Carries `project_build_id=N` and `fid=N`
    #[arg(long, env = "PR_BODY", default_value = "")]
    pr_body: String,

    /// API URL of the pull request
    #[arg(long, env = "PR_URL", default_value = "")]
    pr_url: String,

    #[arg(long, env = "PR_AUTHOR", default_value = "")]
    pr_author: String,

    #[arg(long, env = "PR_REVIEWER", default_value = "")]
    pr_reviewer: String,
}

impl PrArgs {
    fn metadata(&self) -> PrMetadata {
        PrMetadata {
            title: self.pr_title.clone(),
            body: self.pr_body.clone(),
            url: self.pr_url.clone(),
            author: self.pr_author.clone(),
            reviewer: self.pr_reviewer.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    launchpad_core::init_tracing(cli.json, level);

    let console = Arc::new(Console::stdout(!cli.no_color));
    let Some(command) = cli.command.as_deref().and_then(Command::from_name) else {
        console.colored_line(Color::Red, &usage());
        return ExitCode::FAILURE;
    };

    let _span = InvocationSpan::enter(command.name());
    emit_command_started(command.name());
    let started = Instant::now();

    match run(&cli, command, Arc::clone(&console)).await {
        Ok(success) => {
            emit_command_finished(command.name(), started.elapsed().as_millis() as u64, success);
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            emit_command_error(command.name(), &format!("{:#}", err));
            console.colored_line(Color::Red, &format!("{:#}", err));
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, command: Command, console: Arc<Console>) -> Result<bool> {
    let config = Arc::new(cli.platform.config());
    let transport =
        ReqwestTransport::new(config.http_timeout).context("Failed to build HTTP client")?;

    let stdin = read_input(command, tokio::io::stdin()).await?;

    let launcher = Launcher::new(config, Arc::new(transport), console)
        .with_poll_policy(cli.platform.poll_policy())
        .with_pull_request(cli.pr.webhook_url.clone(), cli.pr.metadata());

    let success = launcher.execute(command, &stdin).await?;
    Ok(success)
}

/// Everything on `input` for commands that take ids from stdin, nothing otherwise
async fn read_input<R: AsyncRead + Unpin>(command: Command, mut input: R) -> Result<String> {
    let mut text = String::new();
    if command.reads_stdin() {
        input
            .read_to_string(&mut text)
            .await
            .context("Failed to read standard input")?;
    }
    Ok(text)
}
