//! End-to-end properties of the pipeline runner with real steps and test
//! doubles for everything that would touch the host.
//! Testing library/framework: Rust built-in test framework with Tokio async
//! runtime (#[tokio::test]), wiremock for the health endpoint.

mod fixtures;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fixtures::{RecordingProvider, ScriptedExecutor};
use kindling::pipeline::steps::{
    ClusterCreateStep, ClusterDeleteStep, ReadinessStep, ServiceStartStep, ServiceStopStep,
    TestSuiteStep, WorkspaceStep,
};
use kindling::pipeline::{PipelineRunner, RunContext, RunVerdict, StepStatus};
use kindling::readiness::ReadinessProbe;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn workspace_step(dir: &tempfile::TempDir) -> WorkspaceStep {
    WorkspaceStep {
        root: dir.path().to_path_buf(),
        test_dir: PathBuf::from("."),
    }
}

fn runner() -> PipelineRunner {
    PipelineRunner::new(Duration::from_secs(30), Duration::from_secs(10))
}

fn ctx() -> RunContext {
    RunContext::new("run-it", "kindling-it")
}

#[tokio::test]
async fn cluster_is_deleted_even_when_tests_fail() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::new());
    let executor = Arc::new(ScriptedExecutor::new().on("pytest tests", 1, ""));

    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.verdict, RunVerdict::Failed);
    assert_eq!(provider.delete_count(), 1);
}

#[tokio::test]
async fn cluster_is_deleted_even_when_provisioning_later_steps_never_ran() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::new());
    // No scripted response: the suite command "fails to exist"
    let executor = Arc::new(ScriptedExecutor::new());

    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.verdict, RunVerdict::Failed);
    assert_eq!(provider.delete_count(), 1);
}

#[tokio::test]
async fn exit_code_equals_test_runner_exit_code() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::new());
    let executor = Arc::new(ScriptedExecutor::new().on("pytest tests", 4, ""));

    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ClusterDeleteStep { provider }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.exit_code(), 4);
}

#[tokio::test]
async fn readiness_timeout_fails_the_run_and_still_tears_down() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let provider = Arc::new(RecordingProvider::new());
    let probe = ReadinessProbe::new(
        format!("{}/health", server.uri()),
        Duration::from_millis(50),
        Duration::from_secs(2),
    )
    .unwrap();

    let report = runner()
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(ReadinessStep {
            probe,
            budget: Duration::from_millis(250),
        }))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.verdict, RunVerdict::Failed);
    assert_eq!(report.steps[1].status, StepStatus::Failed);
    assert!(report.steps[1]
        .detail
        .as_deref()
        .unwrap()
        .contains("not ready within"));
    assert_eq!(provider.delete_count(), 1);
}

#[tokio::test]
async fn green_path_passes_and_captures_the_server_log() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let log_path = dir.path().join("server.log");
    let provider = Arc::new(RecordingProvider::new());
    let executor = Arc::new(ScriptedExecutor::new().on("pytest tests", 0, ""));

    let probe = ReadinessProbe::new(
        format!("{}/health", server.uri()),
        Duration::from_millis(50),
        Duration::from_secs(2),
    )
    .unwrap();

    let mut run_ctx = ctx();
    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(ServiceStartStep {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "echo serving; sleep 30".to_string()],
            env: Vec::new(),
            log_path: log_path.clone(),
        }))
        .step(Box::new(ReadinessStep {
            probe,
            budget: Duration::from_secs(5),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ServiceStopStep))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut run_ctx)
        .await;

    assert_eq!(report.verdict, RunVerdict::Passed);
    assert_eq!(report.exit_code(), 0);
    assert_eq!(provider.delete_count(), 1);
    assert_eq!(report.server_log.as_deref(), Some(log_path.to_str().unwrap()));
    assert!(log_path.exists());
}

#[tokio::test]
async fn dead_server_fails_readiness_before_the_budget_elapses() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::new());
    let probe = ReadinessProbe::new(
        format!("{}/health", server.uri()),
        Duration::from_millis(100),
        Duration::from_secs(2),
    )
    .unwrap();

    let started = std::time::Instant::now();
    let report = runner()
        .step(Box::new(ServiceStartStep {
            command: "sh".to_string(),
            args: vec!["-c".to_string(), "exit 7".to_string()],
            env: Vec::new(),
            log_path: dir.path().join("server.log"),
        }))
        .step(Box::new(ReadinessStep {
            probe,
            budget: Duration::from_secs(20),
        }))
        .teardown_step(Box::new(ServiceStopStep))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.verdict, RunVerdict::Failed);
    // Failed well before the 20s readiness budget
    assert!(started.elapsed() < Duration::from_secs(10));
    let detail = report.steps[1].detail.as_deref().unwrap();
    assert!(detail.contains("exited with code 7"), "detail: {detail}");
    assert_eq!(provider.delete_count(), 1);
}

#[tokio::test]
async fn teardown_failure_does_not_mask_a_passing_run() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::failing_delete());
    let executor = Arc::new(ScriptedExecutor::new().on("pytest tests", 0, ""));

    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ClusterDeleteStep {
            provider: provider.clone(),
        }))
        .run(&mut ctx())
        .await;

    assert_eq!(report.verdict, RunVerdict::Passed);
    assert_eq!(report.exit_code(), 0);
    let teardown = report.steps.iter().find(|s| s.teardown).unwrap();
    assert_eq!(teardown.status, StepStatus::Failed);
}

#[tokio::test]
async fn run_report_round_trips_to_json() {
    let dir = tempfile::tempdir().unwrap();
    let provider = Arc::new(RecordingProvider::new());
    let executor = Arc::new(ScriptedExecutor::new().on("pytest tests", 0, ""));

    let report = runner()
        .step(Box::new(workspace_step(&dir)))
        .step(Box::new(ClusterCreateStep {
            provider: provider.clone(),
        }))
        .step(Box::new(TestSuiteStep {
            executor,
            command: "pytest".to_string(),
            args: vec!["tests".to_string()],
            env: Vec::new(),
        }))
        .teardown_step(Box::new(ClusterDeleteStep { provider }))
        .run(&mut ctx())
        .await;

    let report_path = dir.path().join("reports/run.json");
    report.write_json(&report_path).unwrap();

    let raw = std::fs::read_to_string(&report_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(parsed["verdict"], "passed");
    assert_eq!(parsed["cluster_name"], "kindling-it");
    assert_eq!(parsed["steps"].as_array().unwrap().len(), 4);
}
