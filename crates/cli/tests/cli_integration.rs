use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("cmdtree-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn cmdtree() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cmdtree"));
    cmd.env_remove("CMDTREE_SCHEMA");
    cmd
}

fn assert_success(out: &Output, what: &str) {
    assert!(
        out.status.success(),
        "{what} failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

fn init_in(dir: &Path) {
    let out = cmdtree()
        .arg("init")
        .arg(dir)
        .output()
        .expect("failed to run cmdtree init");
    assert_success(&out, "cmdtree init");
}

#[test]
fn help_works() {
    let out = cmdtree()
        .arg("--help")
        .output()
        .expect("failed to run cmdtree --help");
    assert_success(&out, "cmdtree --help");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("cmdtree") && stdout.contains("init") && stdout.contains("parse"),
        "unexpected help output:\n{stdout}"
    );
}

#[test]
fn init_writes_schema_and_refuses_to_overwrite() {
    let dir = make_temp_dir("init");
    init_in(&dir);
    assert!(dir.join("cmdtree.json").is_file(), "cmdtree.json not created");

    let out = cmdtree().arg("init").arg(&dir).output().unwrap();
    assert!(!out.status.success(), "second init should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("--force"), "unexpected stderr:\n{stderr}");

    let out = cmdtree().arg("init").arg(&dir).arg("--force").output().unwrap();
    assert_success(&out, "cmdtree init --force");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_lists_commands_as_json() {
    let dir = make_temp_dir("check");
    init_in(&dir);

    let out = cmdtree()
        .current_dir(&dir)
        .args(["check", "--json"])
        .output()
        .unwrap();
    assert_success(&out, "cmdtree check --json");
    let json = stdout_json(&out);
    let paths: Vec<String> = json["commands"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| {
            c["path"]
                .as_array()
                .unwrap()
                .iter()
                .map(|s| s.as_str().unwrap())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect();
    assert_eq!(
        paths,
        ["foo", "foo build", "foo package", "foo package clean", "foo package config"]
    );
    assert_eq!(json["commands"][1]["args"][0]["help"], "File to build");

    let out = cmdtree().current_dir(&dir).arg("check").output().unwrap();
    assert_success(&out, "cmdtree check");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("File to build"), "unexpected stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parse_prints_selected_command() {
    let dir = make_temp_dir("parse-ok");
    init_in(&dir);

    let out = cmdtree()
        .current_dir(&dir)
        .args(["parse", "--", "-f", "package", "clean"])
        .output()
        .unwrap();
    assert_success(&out, "cmdtree parse");
    let json = stdout_json(&out);
    assert_eq!(json["ok"], true);
    assert_eq!(json["command"], serde_json::json!(["foo", "package", "clean"]));
    assert_eq!(json["values"]["package"]["force"], true);
    assert_eq!(json["values"]["foo"]["verbose"], false);

    let out = cmdtree()
        .current_dir(&dir)
        .args(["parse", "--", "--version"])
        .output()
        .unwrap();
    assert_success(&out, "cmdtree parse -- --version");
    let json = stdout_json(&out);
    assert_eq!(json["outcome"], "version");
    assert_eq!(json["version"], "0.1.0");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn parse_failure_exits_with_status_two() {
    let dir = make_temp_dir("parse-err");
    init_in(&dir);

    let out = cmdtree()
        .current_dir(&dir)
        .args(["parse", "--", "package"])
        .output()
        .unwrap();
    assert_eq!(
        out.status.code(),
        Some(2),
        "stderr:\n{}",
        String::from_utf8_lossy(&out.stderr)
    );
    let json = stdout_json(&out);
    assert_eq!(json["ok"], false);
    assert_eq!(json["kind"], "missing-subcommand");
    assert_eq!(json["command"], serde_json::json!(["foo", "package"]));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn schema_path_comes_from_environment() {
    let dir = make_temp_dir("parse-env");
    init_in(&dir);

    let out = cmdtree()
        .env("CMDTREE_SCHEMA", dir.join("cmdtree.json"))
        .args(["parse", "--", "build", "main.rs"])
        .output()
        .unwrap();
    assert_success(&out, "cmdtree parse with CMDTREE_SCHEMA");
    let json = stdout_json(&out);
    assert_eq!(json["values"]["input"], "main.rs");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn check_rejects_invalid_schema() {
    let dir = make_temp_dir("check-bad");
    let schema = dir.join("cmdtree.json");
    fs::write(
        &schema,
        r#"{
            "format-version": 1,
            "command": {
                "name": "tool",
                "args": [
                    { "name": "verbose", "short": "v" },
                    { "name": "version", "short": "v" }
                ]
            }
        }"#,
    )
    .unwrap();

    let out = cmdtree().arg("check").arg("--schema").arg(&schema).output().unwrap();
    assert!(!out.status.success(), "check should reject duplicate names");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid schema"), "unexpected stderr:\n{stderr}");

    let out = cmdtree()
        .current_dir(&dir)
        .arg("check")
        .arg("--schema")
        .arg("missing.json")
        .output()
        .unwrap();
    assert!(!out.status.success(), "check should fail without a schema");

    let _ = fs::remove_dir_all(&dir);
}
