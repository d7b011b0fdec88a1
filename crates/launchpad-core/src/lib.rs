//! Launchpad Core Library
//!
//! Orchestration on top of `launchpad-client`: deploy a project build, run its
//! test cases, resolve the matching project across environments, and report
//! every step to the console and the PR bot webhook.
//!
//! ## Key Components
//!
//! - `poller`: bounded fixed-interval polling shared by deploys and test runs
//! - `Deployer` / `TestRunner`: the two long-running remote operations
//! - `projects`: cross-environment join by project name
//! - `PrMetadata`: ids and release notes scraped from the pull request
//! - `Notifier`: webhook events, also the failure hook for platform calls

pub mod console;
pub mod deploy;
pub mod error;
pub mod notifier;
pub mod poller;
pub mod pr_metadata;
pub mod projects;
pub mod telemetry;
pub mod test_run;

pub use console::{CaptureBuffer, Color, Console};
pub use deploy::{DeployOutcome, Deployer, DEPLOY_PROGRESS_LINE};
pub use error::{LaunchError, Result};
pub use notifier::{build_payload, NotificationContext, NotificationEvent, Notifier};
pub use poller::{poll_until, PollPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL};
pub use pr_metadata::{normalize_pr_url, PrMetadata};
pub use projects::{
    find_project_name, match_project_by_name, resolve_project_name, resolve_target_project_id,
};
pub use telemetry::{
    emit_command_error, emit_command_finished, emit_command_started, init_tracing, InvocationSpan,
};
pub use test_run::{TestRunOutcome, TestRunner, TEST_PROGRESS_LINE};
