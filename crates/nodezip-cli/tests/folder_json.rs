//! Integration tests for `nodezip folder --json`.

use std::fs;
use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "nodezip-cli", "--bin", "nodezip", "--"]);
    cmd
}

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn listed_paths(json: &serde_json::Value) -> Vec<String> {
    json["entries"]
        .as_array()
        .expect("entries should be an array")
        .iter()
        .map(|e| e["path"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_folder_json_lists_entries() {
    let dir = tempdir().unwrap();
    write(dir.path(), "index.js", "");
    write(dir.path(), "lib/util.js", "");
    write(dir.path(), "lib/util.js.map", "");
    write(dir.path(), "test/util.test.js", "");

    let output = cargo_bin()
        .args(["--json", "folder"])
        .arg(dir.path())
        .args(["--prefix", "/app/", "--ignore", "*.map", "--ignore", "test/"])
        .output()
        .expect("Failed to run folder command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "folder failed: {stdout}");

    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], true);
    assert_eq!(json["count"], 2);
    assert_eq!(listed_paths(&json), vec!["app/index.js", "app/lib/util.js"]);

    let source = json["entries"][0]["source"].as_str().unwrap();
    assert!(source.ends_with("index.js"), "unexpected source: {source}");
}

#[test]
fn test_folder_uses_project_config() {
    let project = tempdir().unwrap();
    fs::write(
        project.path().join("nodezip.json"),
        r#"{"ignore": ["*.md"], "prefix": "site"}"#,
    )
    .unwrap();
    write(project.path(), "public/index.html", "");
    write(project.path(), "public/README.md", "");
    write(project.path(), "public/CHANGELOG.md", "");

    // Command-line patterns come after the file's, so they win.
    let output = cargo_bin()
        .arg("--cwd")
        .arg(project.path())
        .args(["--json", "folder", "public", "--ignore", "!README.md"])
        .output()
        .expect("Failed to run folder command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(
        listed_paths(&json),
        vec!["site/README.md", "site/index.html"]
    );
}

#[test]
fn test_folder_missing_source_fails() {
    let dir = tempdir().unwrap();

    let output = cargo_bin()
        .args(["--json", "folder"])
        .arg(dir.path().join("missing"))
        .output()
        .expect("Failed to run folder command");

    assert_eq!(output.status.code(), Some(1));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let json: serde_json::Value =
        serde_json::from_str(&stdout).expect("stdout should be valid JSON");
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "WALK_ROOT_INVALID");
}

#[test]
fn test_folder_text_output() {
    let dir = tempdir().unwrap();
    write(dir.path(), "a.txt", "a");

    let output = cargo_bin()
        .arg("folder")
        .arg(dir.path())
        .output()
        .expect("Failed to run folder command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.lines().any(|l| l == "a.txt"), "stdout: {stdout}");
    assert!(stdout.contains("1 entries"), "stdout: {stdout}");
}
