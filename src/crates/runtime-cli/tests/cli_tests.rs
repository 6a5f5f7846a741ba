//! Integration tests for the `runtime` binary.
//!
//! Drives the compiled binary directly via `CARGO_BIN_EXE_runtime` rather
//! than re-implementing its subcommands inline, so a regression in
//! argument parsing or output formatting is caught the same way a user
//! would hit it.

use std::path::PathBuf;
use std::process::Command;

use tempfile::TempDir;

fn create_test_dir() -> TempDir {
    TempDir::new().expect("failed to create temp directory")
}

fn write_graph_yaml(path: &PathBuf) {
    let yaml = r#"
id: greeter
entryNode: greet
terminalNodes: [greet]
entryPoints:
  - id: manual
    entryNode: greet
    triggerType: manual
    maxConcurrent: 1
nodes:
  - id: greet
    description: says hello
    system_prompt: "reply with a short greeting"
    success_criteria: always
edges: []
"#;
    std::fs::write(path, yaml).unwrap();
}

fn runtime_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_runtime"))
}

#[test]
fn validate_accepts_a_well_formed_graph() {
    let dir = create_test_dir();
    let file = dir.path().join("graph.yaml");
    write_graph_yaml(&file);

    let output = runtime_bin().arg("validate").arg(&file).output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("graph is valid"));
    assert!(stdout.contains("id: greeter"));
    assert!(stdout.contains("nodes: 1"));
}

#[test]
fn validate_rejects_a_dangling_edge_target() {
    let dir = create_test_dir();
    let file = dir.path().join("broken.yaml");
    std::fs::write(
        &file,
        r#"
id: broken
entryNode: a
terminalNodes: [a]
nodes:
  - id: a
    description: ""
    system_prompt: x
    success_criteria: always
edges:
  - id: e1
    source: a
    target: does-not-exist
    condition: ON_SUCCESS
"#,
    )
    .unwrap();

    let output = runtime_bin().arg("validate").arg(&file).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn validate_rejects_missing_file() {
    let output = runtime_bin().arg("validate").arg("/nonexistent/graph.yaml").output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn run_with_no_llm_backend_falls_back_to_the_mock_and_completes() {
    let dir = create_test_dir();
    let file = dir.path().join("graph.yaml");
    write_graph_yaml(&file);
    let storage_root = dir.path().join("data");

    let output = runtime_bin()
        .arg("run")
        .arg(&file)
        .arg("--entry-point")
        .arg("manual")
        .arg("--storage-root")
        .arg(&storage_root)
        .env_remove("RUNTIME_LLM_BASE_URL")
        .output()
        .unwrap();

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("started"));
    assert!(stdout.contains("ExecutionCompleted") || stdout.contains("ExecutionFailed"));
}
