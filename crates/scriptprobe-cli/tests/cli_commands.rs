use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

#[test]
fn verify_command_passes_for_well_formed_result() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("merge.json");
    let report_path = temp.path().join("reports/verify.json");
    write_config(&config_path);
    write_file(
        &temp.path().join("data/full_users.csv"),
        "login,name,email\nalice,Alice Smith,alice@example.com\nbob,Bob Stone,bob@example.com\n",
    );

    let output = run_cli(&[
        "verify",
        "--config",
        path_arg(&config_path),
        "--rows",
        "2",
        "--report",
        path_arg(&report_path),
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "verify should pass, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Verification status: PASS"), "stdout: {stdout}");
    assert!(stdout.contains("Checks: 6 total (6 passed, 0 failed)"), "stdout: {stdout}");

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report should be readable"))
            .expect("report JSON should parse");
    assert_eq!(parsed["passed"], Value::Bool(true));
    assert_eq!(parsed["check_count"], Value::from(6));
}

#[test]
fn verify_command_exits_one_and_names_first_failure() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("merge.json");
    write_config(&config_path);
    write_file(
        &temp.path().join("data/full_users.csv"),
        "login,name,email\nalice,Alice Smith,alice@example.com\nalice,Alice Smith,alice@example.com\n",
    );

    let output = run_cli(&["verify", "--config", path_arg(&config_path)]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Verification status: FAIL"), "stdout: {stdout}");
    assert!(
        stdout.contains("first failure: no_duplicate_keys"),
        "stdout: {stdout}"
    );
}

#[test]
fn verify_command_fails_when_result_file_is_missing() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("merge.json");
    write_config(&config_path);

    let output = run_cli(&["verify", "--config", path_arg(&config_path)]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("first failure: file_exists"), "stdout: {stdout}");
    assert!(stdout.contains("Checks: 1 total (0 passed, 1 failed)"), "stdout: {stdout}");
}

#[test]
fn verify_command_rejects_malformed_config() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("broken.json");
    write_file(&config_path, "{ \"scriptPath\": ");

    let output = run_cli(&["verify", "--config", path_arg(&config_path)]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: [INPUT.CONFIG]"), "stderr: {stderr}");
}

#[test]
fn verify_command_reports_unreadable_config_as_io_error() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("absent.json");

    let output = run_cli(&["verify", "--config", path_arg(&config_path)]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: [IO.CONFIG_READ]"), "stderr: {stderr}");
    assert!(stderr.contains("absent.json"), "stderr: {stderr}");
}

#[test]
fn unknown_subcommand_is_a_usage_error() {
    let output = run_cli(&["explode"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.starts_with("ERROR: [INPUT.CLI_USAGE]"), "stderr: {stderr}");
}

#[test]
fn help_exits_zero() {
    let output = run_cli(&["--help"]);

    assert_eq!(output.status.code(), Some(0));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("exec"));
    assert!(stdout.contains("verify"));
}

#[cfg(unix)]
#[test]
fn exec_command_runs_script_and_writes_outcome_report() {
    let temp = TempDir::new().expect("tempdir should be created");
    let script = temp.path().join("greet.sh");
    let report_path = temp.path().join("reports/exec.json");
    write_file(&script, "echo \"hello $1\"\necho 'warning: none' >&2\n");

    let output = run_cli(&[
        "exec",
        "--interpreter",
        "sh",
        "--cwd",
        path_arg(temp.path()),
        "--report",
        path_arg(&report_path),
        path_arg(&script),
        "world",
    ]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "exec should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("exit code 0"), "stdout: {stdout}");
    assert!(stdout.contains("  | hello world"), "stdout: {stdout}");
    assert!(stdout.contains("  | warning: none"), "stdout: {stdout}");

    let parsed: Value =
        serde_json::from_str(&fs::read_to_string(&report_path).expect("report should be readable"))
            .expect("report JSON should parse");
    assert_eq!(parsed["status"]["kind"], Value::from("exited"));
    assert_eq!(parsed["status"]["code"], Value::from(0));
    assert_eq!(parsed["stdout"], Value::from("hello world\n"));
}

#[cfg(unix)]
#[test]
fn exec_command_exits_one_when_child_fails() {
    let temp = TempDir::new().expect("tempdir should be created");

    let output = run_cli(&[
        "exec",
        "--cwd",
        path_arg(temp.path()),
        "--",
        "sh",
        "-c",
        "echo boom >&2; exit 4",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("exit code 4"), "stdout: {stdout}");
    assert!(stdout.contains("  | boom"), "stdout: {stdout}");
}

#[cfg(unix)]
#[test]
fn exec_command_reports_timeout() {
    let temp = TempDir::new().expect("tempdir should be created");

    let output = run_cli(&[
        "exec",
        "--cwd",
        path_arg(temp.path()),
        "--timeout-ms",
        "300",
        "--",
        "sh",
        "-c",
        "exec sleep 10",
    ]);

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("timed out"), "stdout: {stdout}");
}

#[test]
fn exec_command_rejects_missing_working_directory() {
    let temp = TempDir::new().expect("tempdir should be created");
    let missing = temp.path().join("nowhere");

    let output = run_cli(&["exec", "--cwd", path_arg(&missing), "true"]);

    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.starts_with("ERROR: [IO.HARNESS_WORKING_DIR]"),
        "stderr: {stderr}"
    );
}

#[test]
fn exec_command_rejects_zero_timeout() {
    let output = run_cli(&["exec", "--timeout-ms", "0", "true"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--timeout-ms must be greater than zero"), "stderr: {stderr}");
}

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_scriptprobe"))
        .args(args)
        .output()
        .expect("scriptprobe should run")
}

fn write_config(path: &Path) {
    write_file(
        path,
        r#"
        {
          "scriptPath": "merge_users.sh",
          "dataDir": "data",
          "resultFile": "full_users.csv",
          "schema": {
            "columns": ["login", "name", "email"],
            "keyColumn": "login"
          }
        }
        "#,
    );
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("temp paths should be UTF-8")
}

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent dir should be created");
    }
    fs::write(path, content).expect("file should be written");
}
