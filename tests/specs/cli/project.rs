//! `taskforge project add|list` against an isolated store snapshot.

use crate::prelude::Store;

#[test]
fn add_then_list_round_trips_through_the_store_file() {
    let store = Store::new();

    let add_output = store
        .cli()
        .args(["--format", "json", "project", "add", "acme-web", "/tmp/acme-web", "--remote", "acme/web"])
        .output()
        .expect("run project add");
    assert!(add_output.status.success(), "{}", String::from_utf8_lossy(&add_output.stderr));
    let added: serde_json::Value = serde_json::from_slice(&add_output.stdout).expect("json project");
    assert_eq!(added["name"], "acme-web");
    assert_eq!(added["remote_repo"], "acme/web");
    assert_eq!(added["default_branch"], "main");

    let list_output = store.cli().args(["--format", "json", "project", "list"]).output().expect("run project list");
    assert!(list_output.status.success());
    let listed: Vec<serde_json::Value> = serde_json::from_slice(&list_output.stdout).expect("json project list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["name"], "acme-web");
}

#[test]
fn list_on_an_empty_store_prints_the_empty_message() {
    let store = Store::new();
    let output = store.cli().args(["project", "list"]).output().expect("run project list");
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No projects registered"));
}
