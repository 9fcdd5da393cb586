use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;
use tempfile::tempdir;

fn run_flowctl(repo_root: &Path, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("flowctl");
    let mut cmd = Command::new(binary);
    cmd.current_dir(repo_root)
        .env("FLOW_ACTOR", "agent-a")
        .args(args);
    cmd.output().expect("flowctl command executes")
}

fn run_flowctl_ok(repo_root: &Path, args: &[&str]) -> Output {
    let output = run_flowctl(repo_root, args);
    assert!(
        output.status.success(),
        "flowctl {:?} failed:\nstdout:\n{}\nstderr:\n{}",
        args,
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    output
}

fn run_flowctl_json(repo_root: &Path, args: &[&str]) -> Value {
    let output = run_flowctl_ok(repo_root, args);
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

#[test]
fn init_create_start_done_round_trip() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();

    run_flowctl_ok(repo_root, &["init"]);
    assert!(repo_root.join(".flow").join("meta.json").exists());

    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "Ship the thing"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();

    let task = run_flowctl_json(
        repo_root,
        &["task", "create", "--epic", &epic_id, "--title", "Write the code"],
    );
    let task_id = task["id"].as_str().unwrap().to_string();
    assert_eq!(task["epic"].as_str().unwrap(), epic_id);

    let started = run_flowctl_json(repo_root, &["start", &task_id]);
    assert_eq!(started["status"].as_str().unwrap(), "in_progress");
    assert_eq!(started["assignee"].as_str().unwrap(), "agent-a");

    let done = run_flowctl_json(
        repo_root,
        &["done", &task_id, "--summary", "implemented and tested"],
    );
    assert_eq!(done["status"].as_str().unwrap(), "done");

    let shown = run_flowctl_json(repo_root, &["show", &task_id]);
    assert_eq!(shown["status"].as_str().unwrap(), "done");
}

fn run_flowctl_as(repo_root: &Path, actor: &str, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("flowctl");
    let mut cmd = Command::new(binary);
    cmd.current_dir(repo_root).env("FLOW_ACTOR", actor).args(args);
    cmd.output().expect("flowctl command executes")
}

#[test]
fn start_rejects_second_actor_without_force_but_allows_takeover() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap();
    let task = run_flowctl_json(repo_root, &["task", "create", "--epic", epic_id, "--title", "T"]);
    let task_id = task["id"].as_str().unwrap();

    run_flowctl_as(repo_root, "agent-a", &["start", task_id]);

    let contended = run_flowctl_as(repo_root, "agent-b", &["start", task_id]);
    assert!(!contended.status.success());
    let body: Value = serde_json::from_slice(&contended.stdout).unwrap();
    assert_eq!(body["success"].as_bool(), Some(false));

    let forced = run_flowctl_as(repo_root, "agent-b", &["start", task_id, "--force"]);
    assert!(forced.status.success());
    let forced: Value = serde_json::from_slice(&forced.stdout).unwrap();
    assert_eq!(forced["assignee"].as_str().unwrap(), "agent-b");
}

#[test]
fn dependency_gating_blocks_ready_set() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();

    let a = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "A"]);
    let a_id = a["id"].as_str().unwrap().to_string();
    let b = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "B"]);
    let b_id = b["id"].as_str().unwrap().to_string();

    run_flowctl_ok(repo_root, &["task", "set-deps", &b_id, "--deps", &a_id]);

    let ready = run_flowctl_json(repo_root, &["ready", "--epic", &epic_id]);
    let ready_ids: Vec<&str> = ready["ready"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ready_ids.contains(&a_id.as_str()));
    assert!(!ready_ids.contains(&b_id.as_str()));

    run_flowctl_ok(repo_root, &["start", &a_id]);
    run_flowctl_ok(repo_root, &["done", &a_id, "--summary", "done"]);

    let ready = run_flowctl_json(repo_root, &["ready", "--epic", &epic_id]);
    let ready_ids: Vec<&str> = ready["ready"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["id"].as_str().unwrap())
        .collect();
    assert!(ready_ids.contains(&b_id.as_str()));
}

#[test]
fn reset_cascade_reopens_dependents() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();

    let a = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "A"]);
    let a_id = a["id"].as_str().unwrap().to_string();
    let b = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "B"]);
    let b_id = b["id"].as_str().unwrap().to_string();
    run_flowctl_ok(repo_root, &["task", "set-deps", &b_id, "--deps", &a_id]);

    run_flowctl_ok(repo_root, &["start", &a_id]);
    run_flowctl_ok(repo_root, &["done", &a_id, "--summary", "done"]);
    run_flowctl_ok(repo_root, &["start", &b_id]);
    run_flowctl_ok(repo_root, &["done", &b_id, "--summary", "done"]);

    let reset = run_flowctl_json(repo_root, &["task", "reset", &a_id, "--cascade"]);
    let reset_ids: Vec<&str> = reset["reset"].as_array().unwrap().iter().map(|v| v.as_str().unwrap()).collect();
    assert!(reset_ids.contains(&a_id.as_str()));
    assert!(reset_ids.contains(&b_id.as_str()));

    let a_show = run_flowctl_json(repo_root, &["show", &a_id]);
    assert_eq!(a_show["status"].as_str().unwrap(), "todo");
    let b_show = run_flowctl_json(repo_root, &["show", &b_id]);
    assert_eq!(b_show["status"].as_str().unwrap(), "todo");
}

#[test]
fn set_deps_rejects_cycle_closing_edge() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();

    let a = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "A"]);
    let a_id = a["id"].as_str().unwrap().to_string();
    let b = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "B"]);
    let b_id = b["id"].as_str().unwrap().to_string();

    run_flowctl_ok(repo_root, &["task", "set-deps", &b_id, "--deps", &a_id]);

    // a -> b would close a cycle since b already depends on a.
    let output = run_flowctl(repo_root, &["--format", "json", "task", "set-deps", &a_id, "--deps", &b_id]);
    assert!(!output.status.success());

    // a -> a is rejected as a self-dependency.
    let output = run_flowctl(repo_root, &["--format", "json", "task", "set-deps", &a_id, "--deps", &a_id]);
    assert!(!output.status.success());
}

#[test]
fn validate_all_passes_on_a_clean_epic() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();
    run_flowctl_ok(repo_root, &["task", "create", "--epic", &epic_id, "--title", "A"]);

    let report = run_flowctl_json(repo_root, &["validate", "--all"]);
    assert!(report["errors"].as_array().unwrap().is_empty());
}

#[test]
fn checkpoint_save_restore_round_trip() {
    let dir = tempdir().unwrap();
    let repo_root = dir.path();
    run_flowctl_ok(repo_root, &["init"]);
    let epic = run_flowctl_json(repo_root, &["epic", "create", "--title", "E"]);
    let epic_id = epic["id"].as_str().unwrap().to_string();
    let task = run_flowctl_json(repo_root, &["task", "create", "--epic", &epic_id, "--title", "A"]);
    let task_id = task["id"].as_str().unwrap().to_string();

    run_flowctl_ok(repo_root, &["checkpoint", "save", "--epic", &epic_id]);
    run_flowctl_ok(repo_root, &["start", &task_id]);
    run_flowctl_ok(repo_root, &["done", &task_id, "--summary", "done"]);

    run_flowctl_ok(repo_root, &["checkpoint", "restore", "--epic", &epic_id]);
    let restored = run_flowctl_json(repo_root, &["show", &task_id]);
    assert_eq!(restored["status"].as_str().unwrap(), "todo");
}

#[test]
fn detect_reports_uninitialized_directory() {
    let dir = tempdir().unwrap();
    let out = run_flowctl_json(dir.path(), &["detect"]);
    assert_eq!(out["initialized"].as_bool(), Some(false));
}
