//! `taskforge task add|list|cancel` against an isolated store snapshot.

use crate::prelude::Store;

#[test]
fn add_then_list_round_trips_through_the_store_file() {
    let store = Store::new();

    let add_output = store
        .cli()
        .args(["--format", "json", "task", "add", "fix the flaky build", "--description", "investigate CI"])
        .output()
        .expect("run task add");
    assert!(add_output.status.success(), "{}", String::from_utf8_lossy(&add_output.stderr));
    let added: serde_json::Value = serde_json::from_slice(&add_output.stdout).expect("json task");
    assert_eq!(added["title"], "fix the flaky build");
    assert_eq!(added["status"], "pending");

    let list_output = store.cli().args(["--format", "json", "task", "list"]).output().expect("run task list");
    assert!(list_output.status.success());
    let listed: Vec<serde_json::Value> = serde_json::from_slice(&list_output.stdout).expect("json task list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["title"], "fix the flaky build");
}

#[test]
fn list_on_an_empty_store_prints_the_empty_message() {
    let store = Store::new();
    let output = store.cli().args(["task", "list"]).output().expect("run task list");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No tasks queued"));
}

#[test]
fn cancel_transitions_a_pending_task_to_cancelled() {
    let store = Store::new();
    let add_output = store
        .cli()
        .args(["--format", "json", "task", "add", "one-off task"])
        .output()
        .expect("run task add");
    let added: serde_json::Value = serde_json::from_slice(&add_output.stdout).expect("json task");
    let id = added["id"].as_str().expect("task id").to_string();

    let cancel_output =
        store.cli().args(["--format", "json", "task", "cancel", &id]).output().expect("run task cancel");
    assert!(cancel_output.status.success(), "{}", String::from_utf8_lossy(&cancel_output.stderr));
    let cancelled: serde_json::Value = serde_json::from_slice(&cancel_output.stdout).expect("json task");
    assert_eq!(cancelled["status"], "cancelled");
}

#[test]
fn cancel_on_unknown_id_fails_with_a_nonzero_exit_code() {
    let store = Store::new();
    let output = store.cli().args(["task", "cancel", "tsk-doesnotexist"]).output().expect("run task cancel");
    assert!(!output.status.success());
}
