mod common;

use common::*;
use std::process::Command;

fn cli_command() -> Command {
    Command::new(env!("CARGO_BIN_EXE_triggerflow"))
}

fn stdout_json(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is a JSON response")
}

#[test]
fn test_cli_help() {
    let output = cli_command().arg("--help").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Run trigger-driven workflows"));
    assert!(stdout.contains("run"));
    assert!(stdout.contains("validate"));
    assert!(stdout.contains("list"));
    assert!(stdout.contains("slack-test"));
}

#[test]
fn test_cli_version() {
    let output = cli_command().arg("--version").output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("triggerflow"));
}

#[test]
fn test_cli_run_help() {
    let output = cli_command().args(["run", "--help"]).output().unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--input"));
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--queued"));
}

#[test]
fn test_cli_run_single_workflow() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "greet.yaml", &simple_workflow("greet"));

    let output = cli_command()
        .args(["run", dir.path().join("greet.yaml").to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let response = stdout_json(&output);
    assert_eq!(response["status"], "success");
    assert_eq!(response["ctxFinal"]["greeting"], "hello");
    assert_eq!(response["ctxFinal"]["workflow_id"], "greet");
}

#[test]
fn test_cli_run_with_input_skipped() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "orders.yaml", &filtered_workflow("orders"));

    let output = cli_command()
        .args([
            "run",
            dir.path().join("orders.yaml").to_str().unwrap(),
            "--input",
            r#"{"amount": 3}"#,
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["status"], "skipped");
}

#[test]
fn test_cli_run_queued() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "count.yaml", &counting_workflow("count", 4));
    write_runner_config(dir.path(), "worker:\n  poll_wait_secs: 1\n");

    let output = cli_command()
        .args([
            "run",
            dir.path().join("count.yaml").to_str().unwrap(),
            "--queued",
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    let response = stdout_json(&output);
    assert_eq!(response["status"], "success");
    assert_eq!(response["ctxFinal"]["counter"], 4);
    // default + 5 while.start + 4 create_or_update + 4 while.end
    assert_eq!(
        response["workflowExecutionSteps"].as_array().unwrap().len(),
        14
    );
}

#[test]
fn test_cli_run_counter_from_input() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "count.yaml", &counting_workflow("count", 4));

    let output = cli_command()
        .args([
            "run",
            dir.path().join("count.yaml").to_str().unwrap(),
            "--input",
            r#"{"counter": 2}"#,
        ])
        .output()
        .unwrap();

    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["ctxFinal"]["counter"], 4);
}

#[test]
fn test_cli_slack_test_rejects_non_slack_url() {
    let output = cli_command()
        .args(["slack-test", "hello", "--url", "https://example.com/hook"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_slack_test_missing_env_url() {
    let output = cli_command()
        .args(["slack-test", "hello", "--url", "env:TRIGGERFLOW_UNSET_HOOK"])
        .env_remove("TRIGGERFLOW_UNSET_HOOK")
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("TRIGGERFLOW_UNSET_HOOK"));
}

#[test]
fn test_cli_run_failed_workflow_exit_code() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "open.yaml", &unbalanced_workflow("open"));

    let output = cli_command()
        .args(["run", dir.path().join("open.yaml").to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let response = stdout_json(&output);
    assert_eq!(response["status"], "failed");
    assert_eq!(
        response["error"]["message"],
        "Invalid workflow: if.start must have a later matching if.end"
    );
}

#[test]
fn test_cli_run_nonexistent_file() {
    let output = cli_command()
        .args(["run", "/nonexistent/workflow.yaml"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_run_invalid_input_json() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "greet.yaml", &simple_workflow("greet"));

    let output = cli_command()
        .args([
            "run",
            dir.path().join("greet.yaml").to_str().unwrap(),
            "--input",
            "{broken",
        ])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_run_with_invalid_config() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "greet.yaml", &simple_workflow("greet"));
    write_runner_config(dir.path(), "trigger:\n  sync_timeout_ms: 5\n");

    let output = cli_command()
        .args(["run", dir.path().join("greet.yaml").to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_list_workflows() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "a.yaml", &simple_workflow("alpha"));
    write_workflow(dir.path(), "b.yaml", &filtered_workflow("beta"));

    let output = cli_command()
        .args(["list", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("alpha - alpha workflow (/t/alpha)"));
    assert!(stdout.contains("beta - beta workflow (/t/beta)"));
}

#[test]
fn test_cli_list_empty_directory() {
    let dir = create_test_dir();

    let output = cli_command()
        .args(["list", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("No workflows found"));
}

#[test]
fn test_cli_validate_directory() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "a.yaml", &simple_workflow("alpha"));
    write_workflow(dir.path(), "b.yaml", &counting_workflow("beta", 3));

    let output = cli_command()
        .args(["validate", dir.path().to_str().unwrap()])
        .output()
        .unwrap();

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✓ alpha (1 operations)"));
    assert!(stdout.contains("✓ beta (4 operations)"));
}

#[test]
fn test_cli_validate_unbalanced_blocks() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "open.yaml", &unbalanced_workflow("open"));

    let output = cli_command()
        .args(["validate", dir.path().join("open.yaml").to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("✗ open"));
}

#[test]
fn test_cli_validate_invalid_yaml() {
    let dir = create_test_dir();
    write_workflow(dir.path(), "bad.yaml", "id: [unclosed");

    let output = cli_command()
        .args(["validate", dir.path().join("bad.yaml").to_str().unwrap()])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_cli_unknown_command() {
    let output = cli_command().arg("explode").output().unwrap();
    assert!(!output.status.success());
}
