//! Test-case run orchestration and pass/fail reporting.

use launchpad_client::{PlatformApi, RemoteId, RequestHandle, RunRequest, TestResult};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::info;

use crate::console::{Color, Console};
use crate::error::Result;
use crate::notifier::{NotificationEvent, Notifier};
use crate::poller::{poll_until, PollPolicy};

/// Printed on every poll that finds the run still executing
pub const TEST_PROGRESS_LINE: &str = "Test cases are being executed...";

/// Shown when the run payload carries no coverage
const COVERAGE_UNAVAILABLE: &str = "n/a";

/// Split results into (succeeded, failed). A result is failed exactly when
/// its status is not the success literal.
pub fn partition_results(results: &[TestResult]) -> (Vec<&TestResult>, Vec<&TestResult>) {
    results.iter().partition(|r| r.succeeded())
}

/// Group results by recipe name, keeping first-seen order of recipes
pub fn group_by_recipe<'a>(results: &[&'a TestResult]) -> Vec<(&'a str, Vec<&'a TestResult>)> {
    let mut groups: Vec<(&'a str, Vec<&'a TestResult>)> = Vec::new();
    for &result in results {
        let name = result.recipe_name();
        match groups.iter_mut().find(|(n, _)| *n == name) {
            Some((_, members)) => members.push(result),
            None => groups.push((name, vec![result])),
        }
    }
    groups
}

/// Deep link to the job that executed a test case
pub fn job_link(host: &str, result: &TestResult) -> String {
    let recipe_id = result.recipe.id.as_ref().map(|i| i.as_str()).unwrap_or("");
    let job_id = result.job.id.as_ref().map(|i| i.as_str()).unwrap_or("");
    format!("{}/recipes/{}/job/{}", host, recipe_id, job_id)
}

/// Completed run with its results
#[derive(Debug, Clone, PartialEq)]
pub struct TestRunOutcome {
    pub handle: RequestHandle,
    pub run: RunRequest,
}

impl TestRunOutcome {
    pub fn passed(&self) -> Vec<&TestResult> {
        partition_results(&self.run.results).0
    }

    pub fn failed(&self) -> Vec<&TestResult> {
        partition_results(&self.run.results).1
    }

    pub fn all_passed(&self) -> bool {
        self.run.results.iter().all(TestResult::succeeded)
    }

    /// Coverage exactly as the platform reported it
    pub fn coverage_display(&self) -> String {
        match &self.run.coverage {
            None | Some(Value::Null) => COVERAGE_UNAVAILABLE.to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Summary line for a fully passing run
    pub fn success_summary(&self) -> String {
        match &self.run.coverage {
            None | Some(Value::Null) => format!(
                "All tests passed successfully. Coverage: {}",
                COVERAGE_UNAVAILABLE
            ),
            Some(_) => format!(
                "All tests passed successfully. Coverage: {}%",
                self.coverage_display()
            ),
        }
    }
}

/// Launches test runs, waits for them and reports the results
pub struct TestRunner {
    api: PlatformApi,
    console: Arc<Console>,
    policy: PollPolicy,
    notifier: Option<Arc<Notifier>>,
}

impl TestRunner {
    pub fn new(api: PlatformApi, console: Arc<Console>, policy: PollPolicy) -> Self {
        TestRunner {
            api,
            console,
            policy,
            notifier: None,
        }
    }

    /// Send `pr_build_succeeded` / `pr_build_failed` after reporting
    pub fn with_notifier(mut self, notifier: Arc<Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Run the test cases of `project_id` and report them.
    ///
    /// Failed test cases are a normal outcome; check
    /// [`TestRunOutcome::all_passed`].
    pub async fn run_tests(&self, project_id: &RemoteId) -> Result<TestRunOutcome> {
        let handle = self.api.launch_run_request(project_id).await?;

        let api = &self.api;
        let console = &self.console;
        let handle_ref = &handle;
        let operation = format!("test run {}", handle.id);
        let run = poll_until(&self.policy, &operation, || async move {
            let run = api.fetch_run_request(handle_ref).await?;
            if run.is_completed() {
                Ok(Some(run))
            } else {
                console.line(TEST_PROGRESS_LINE);
                Ok(None)
            }
        })
        .await?;

        let outcome = TestRunOutcome { handle, run };
        self.report(&outcome);
        self.notify(&outcome).await?;
        Ok(outcome)
    }

    fn report(&self, outcome: &TestRunOutcome) {
        let failed = outcome.failed();
        info!(
            run_request_id = %outcome.handle.id,
            total = outcome.run.results.len(),
            failed = failed.len(),
            "Test run completed"
        );

        self.console.line("Executed test cases:");
        let all: Vec<&TestResult> = outcome.run.results.iter().collect();
        self.report_results(&all);

        if failed.is_empty() {
            self.console
                .colored_line(Color::Green, &outcome.success_summary());
        } else {
            self.console.line("\n\n==================");
            self.console.colored_line(Color::Red, "Failed test cases:");
            self.report_results(&failed);
        }
    }

    fn report_results(&self, results: &[&TestResult]) {
        let host = &self.api.client().config().host;
        for (recipe_name, members) in group_by_recipe(results) {
            self.console
                .colored_line(Color::Blue, &format!("  {}", recipe_name));
            for result in members {
                let status = if result.succeeded() {
                    self.console.paint(Color::Green, "PASS")
                } else {
                    self.console.paint(Color::Red, "FAIL")
                };
                self.console.line(&format!(
                    "    {}: {}. Link: {}",
                    result.test_case_name(),
                    status,
                    job_link(host, result)
                ));
            }
        }
    }

    async fn notify(&self, outcome: &TestRunOutcome) -> Result<()> {
        let Some(notifier) = &self.notifier else {
            return Ok(());
        };

        let mut extra = Map::new();
        let event = if outcome.all_passed() {
            extra.insert("coverage".to_string(), Value::String(outcome.coverage_display()));
            NotificationEvent::BuildSucceeded
        } else {
            let names = outcome
                .failed()
                .iter()
                .map(|r| Value::String(r.test_case_name().to_string()))
                .collect();
            extra.insert("failed_tests".to_string(), Value::Array(names));
            NotificationEvent::BuildFailed
        };

        notifier.notify(event, extra).await
    }
}
