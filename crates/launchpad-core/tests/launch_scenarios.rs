//! End-to-end orchestration scenarios against a scripted transport.
//!
//! Time is paused, so the 5 s poll interval costs nothing and elapsed time
//! can be asserted exactly.

use std::sync::Arc;
use std::time::Duration;

use launchpad_client::fakes::FakeTransport;
use launchpad_client::{
    Environment, EnvironmentType, Method, PlatformApi, PlatformClient, PlatformConfig, RemoteId,
    WebhookClient,
};
use launchpad_core::{
    CaptureBuffer, Console, Deployer, LaunchError, NotificationContext, Notifier, PollPolicy,
    TestRunner, DEPLOY_PROGRESS_LINE, TEST_PROGRESS_LINE,
};
use serde_json::json;

const HOST: &str = "https://preview.workato.com";
const HOOK: &str = "https://bot.example.test/hooks/launch";
const HOOK_PATH: &str = "/hooks/launch";

fn client(transport: &Arc<FakeTransport>) -> PlatformClient {
    let config = PlatformConfig::new(HOST)
        .with_token(Environment::Dev, "dev-token")
        .with_token(Environment::Test, "test-token");
    PlatformClient::new(Arc::new(config), transport.clone())
}

fn notifier(transport: &Arc<FakeTransport>, client: &PlatformClient) -> Arc<Notifier> {
    let context = NotificationContext {
        pr_url: "https://github.com/acme/recipes/pull/42".to_string(),
        pr_title: "Invoice sync".to_string(),
        folder_id: Some(RemoteId::new("77")),
        build_id: Some(RemoteId::new("12")),
    };
    Arc::new(Notifier::new(
        WebhookClient::new(HOOK, transport.clone()),
        client,
        context,
    ))
}

fn console() -> (Arc<Console>, CaptureBuffer) {
    let (console, buffer) = Console::capture(false);
    (Arc::new(console), buffer)
}

fn script_project_lookup(transport: &FakeTransport) {
    transport.respond(
        Method::Get,
        "/api/project_builds/12",
        200,
        json!({"id": 12, "project_id": 3}),
    );
    transport.respond(
        Method::Get,
        "/api/projects",
        200,
        json!([{"id": 3, "name": "Billing"}]),
    );
    transport.respond(Method::Post, HOOK_PATH, 200, json!({"ok": true}));
}

fn script_test_run(
    transport: &FakeTransport,
    results: serde_json::Value,
    coverage: serde_json::Value,
) {
    transport.respond(
        Method::Post,
        "/api/test_cases/run_requests",
        200,
        json!({"data": {"id": 7}}),
    );
    transport.respond(
        Method::Get,
        "/api/test_cases/run_requests/7",
        200,
        json!({"data": {"id": 7, "status": "running", "results": []}}),
    );
    transport.respond(
        Method::Get,
        "/api/test_cases/run_requests/7",
        200,
        json!({"data": {"id": 7, "status": "completed", "coverage": coverage, "results": results}}),
    );
}

fn case(status: &str, name: &str) -> serde_json::Value {
    json!({
        "status": status,
        "recipe": {"id": 501, "name": "Invoice sync"},
        "job": {"id": 9001},
        "test_case": {"name": name},
    })
}

#[tokio::test(start_paused = true)]
async fn mixed_results_report_pass_and_fail_and_notify_failure() {
    let transport = Arc::new(FakeTransport::new());
    script_project_lookup(&transport);
    script_test_run(
        &transport,
        json!([case("succeeded", "creates invoice"), case("failed", "retries on 429")]),
        json!(50),
    );
    let client = client(&transport);
    let notifier = notifier(&transport, &client);
    let (console, buffer) = console();
    let runner = TestRunner::new(PlatformApi::new(client), console, PollPolicy::default())
        .with_notifier(notifier);

    let outcome = runner.run_tests(&RemoteId::new("300")).await.unwrap();

    assert!(!outcome.all_passed());
    assert_eq!(outcome.passed().len(), 1);
    assert_eq!(outcome.failed().len(), 1);

    let lines = buffer.lines();
    let executed: Vec<&String> = lines
        .iter()
        .take_while(|l| !l.contains("=================="))
        .collect();
    assert_eq!(executed.iter().filter(|l| l.contains(": PASS.")).count(), 1);
    assert_eq!(executed.iter().filter(|l| l.contains(": FAIL.")).count(), 1);
    assert_eq!(lines.iter().filter(|l| *l == TEST_PROGRESS_LINE).count(), 1);
    assert!(lines.iter().any(|l| l == "Failed test cases:"));
    assert!(lines
        .iter()
        .any(|l| l.contains("Link: https://preview.workato.com/recipes/501/job/9001")));

    let sent = transport.bodies_sent_to(HOOK_PATH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["event"], json!("pr_build_failed"));
    assert_eq!(sent[0]["failed_tests"], json!(["retries on 429"]));
    assert_eq!(sent[0]["project_name"], json!("Billing"));
}

#[tokio::test(start_paused = true)]
async fn all_passing_run_prints_coverage_and_notifies_success() {
    let transport = Arc::new(FakeTransport::new());
    script_project_lookup(&transport);
    script_test_run(
        &transport,
        json!([case("succeeded", "creates invoice"), case("succeeded", "retries on 429")]),
        json!(92),
    );
    let client = client(&transport);
    let notifier = notifier(&transport, &client);
    let (console, buffer) = console();
    let runner = TestRunner::new(PlatformApi::new(client), console, PollPolicy::default())
        .with_notifier(notifier);

    let outcome = runner.run_tests(&RemoteId::new("300")).await.unwrap();

    assert!(outcome.all_passed());
    assert!(buffer
        .lines()
        .iter()
        .any(|l| l == "All tests passed successfully. Coverage: 92%"));

    let sent = transport.bodies_sent_to(HOOK_PATH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["event"], json!("pr_build_succeeded"));
    assert_eq!(sent[0]["coverage"], json!("92"));

    let launch = transport.requests_to("/api/test_cases/run_requests");
    assert_eq!(launch[0].header("Authorization"), Some("Bearer test-token"));
}

#[tokio::test(start_paused = true)]
async fn deploy_succeeding_on_third_poll_prints_two_progress_lines() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(
        Method::Post,
        "/api/project_builds/12/deploy?environment_type=prod",
        200,
        json!({"id": 55}),
    );
    for state in ["pending", "in_progress", "success"] {
        transport.respond(
            Method::Get,
            "/api/deployments/55",
            200,
            json!({"id": 55, "state": state}),
        );
    }
    let (console, buffer) = console();
    let api = PlatformApi::new(client(&transport));
    let deployer = Deployer::new(api, console, PollPolicy::default());

    let started = tokio::time::Instant::now();
    let outcome = deployer
        .deploy(&RemoteId::new("12"), EnvironmentType::Prod, Some("Invoice sync"))
        .await
        .unwrap();

    assert!(outcome.succeeded());
    assert_eq!(started.elapsed(), Duration::from_secs(10));
    assert_eq!(
        buffer.lines(),
        vec![
            DEPLOY_PROGRESS_LINE.to_string(),
            DEPLOY_PROGRESS_LINE.to_string(),
            "Deployment succeeded".to_string(),
        ]
    );
    assert_eq!(transport.requests_to("/api/deployments/55").len(), 3);
    assert_eq!(
        transport.bodies_sent_to("/deploy?environment_type=prod"),
        vec![json!({"description": "Invoice sync"})]
    );
}

#[tokio::test(start_paused = true)]
async fn remote_failure_on_hooked_client_sends_one_failure_notification() {
    let transport = Arc::new(FakeTransport::new());
    script_project_lookup(&transport);
    transport.respond_raw(
        Method::Post,
        "/api/project_builds/12/deploy?environment_type=test",
        500,
        "internal error",
    );
    let base = client(&transport);
    let notifier = notifier(&transport, &base);
    let hooked = base.with_failure_hook(notifier);
    let (console, _) = console();
    let deployer = Deployer::new(PlatformApi::new(hooked), console, PollPolicy::default());

    let err = deployer
        .deploy(&RemoteId::new("12"), EnvironmentType::Test, None)
        .await
        .unwrap_err();

    assert!(matches!(err, LaunchError::Remote(_)));
    let sent = transport.bodies_sent_to(HOOK_PATH);
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["event"], json!("pr_build_failed"));
    assert_eq!(
        sent[0]["reason"],
        json!("Response to preview.workato.com failed: internal error")
    );
}

#[tokio::test(start_paused = true)]
async fn test_environment_project_is_found_by_name() {
    let transport = Arc::new(FakeTransport::new());
    transport.respond(
        Method::Get,
        "/api/project_builds/12",
        200,
        json!({"id": 12, "project_id": 3}),
    );
    transport.respond(
        Method::Get,
        "/api/projects",
        200,
        json!({"data": [{"id": 3, "name": "Billing"}, {"id": 4, "name": "HR"}]}),
    );
    transport.respond(
        Method::Get,
        "/api/projects",
        200,
        json!([{"id": "t-9", "name": "Billing", "folder_id": 77}]),
    );
    let api = PlatformApi::new(client(&transport));

    let id = launchpad_core::resolve_target_project_id(&api, &RemoteId::new("12"))
        .await
        .unwrap();

    assert_eq!(id, RemoteId::new("t-9"));
}
