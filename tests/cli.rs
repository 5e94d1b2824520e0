//! Integration tests for the fireline binary

use std::process::Command;

/// Run the built binary and return (stdout, stderr, success)
fn run(args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_fireline"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to spawn fireline");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_route_json_on_demo() {
    let (stdout, stderr, ok) = run(&["route", "--from", "A", "--to", "F", "--json"]);
    assert!(ok, "{}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["dijkstra"]["cost"], 460.0);
    assert_eq!(json["ch"]["cost"], 460.0);
    assert_eq!(json["ch"]["path"].as_array().unwrap().len(), 6);
}

#[test]
fn test_route_with_closure_from_exported_graph() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lahaina.json");
    let path = path.to_str().unwrap();

    let (_, stderr, ok) = run(&["export-demo", path]);
    assert!(ok, "{}", stderr);

    let (stdout, stderr, ok) = run(&[
        "route", "--graph", path, "--from", "A", "--to", "F", "--close", "C:D", "--json",
    ]);
    assert!(ok, "{}", stderr);
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(json["ch"]["cost"].is_null());
    assert!(json["dijkstra"]["cost"].is_null());
    assert_eq!(json["ch"]["valid"], true);
}

#[test]
fn test_unknown_node_fails() {
    let (_, _, ok) = run(&["route", "--from", "A", "--to", "Q"]);
    assert!(!ok);
}

#[test]
fn test_validate_passes_on_demo() {
    let (stdout, stderr, ok) = run(&["validate", "--seed", "3"]);
    assert!(ok, "{}", stderr);
    assert!(stdout.contains("all checks passed"));
}

#[test]
fn test_fire_is_reproducible() {
    let args = ["fire", "--from", "A", "--to", "F", "--seed", "17", "--json"];
    let (first, _, ok) = run(&args);
    assert!(ok);
    let (second, _, _) = run(&args);
    let a: serde_json::Value = serde_json::from_str(&first).unwrap();
    let b: serde_json::Value = serde_json::from_str(&second).unwrap();
    assert_eq!(a["fire"]["closed"], b["fire"]["closed"]);
    assert_eq!(a["fire"]["closed"].as_array().unwrap().len(), 3);
}
