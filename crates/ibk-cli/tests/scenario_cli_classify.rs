use assert_cmd::prelude::*;
use predicates::prelude::*;
use serde_json::Value;
use std::process::Command;

fn classify(id: &str, code: &str, message: &str) -> Value {
    let out = Command::cargo_bin("ibk")
        .unwrap()
        .args(["classify", "--id", id, "--code", code, "--message", message])
        .env_remove("RUST_LOG")
        .output()
        .unwrap();
    assert!(out.status.success(), "stderr: {}", String::from_utf8_lossy(&out.stderr));
    serde_json::from_slice(&out.stdout).unwrap()
}

#[test]
fn historical_permissions_fail_the_request() {
    let v = classify(
        "7",
        "162",
        "Historical Market Data Service error message:No market data permissions for NYSE STK",
    );
    assert_eq!(v["category"], "debug");
    assert_eq!(v["historical"], "no_permissions");
    assert_eq!(v["action"]["action"], "fail_request");
    assert_eq!(v["action"]["should_exist"], true);
    assert_eq!(v["action"]["failure"]["kind"], "no_permissions");
    assert_eq!(v["action"]["failure"]["id"], 7);
}

#[test]
fn session_level_message_uses_negative_id() {
    let v = classify("-1", "1100", "Connectivity between IB and TWS has been lost.");
    assert_eq!(v["record"]["id"], -1);
    assert_eq!(v["record"]["severity"], "error");
    assert_eq!(v["action"]["action"], "session_error");
    assert!(v["historical"].is_null());
}

#[test]
fn critical_code_is_fatal() {
    let v = classify("-1", "503", "The TWS is out of date and must be upgraded.");
    assert_eq!(v["category"], "critical");
    assert_eq!(v["action"]["action"], "fatal");
}

#[test]
fn missing_code_is_a_usage_error() {
    Command::cargo_bin("ibk")
        .unwrap()
        .args(["classify", "--id", "1", "--message", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--code"));
}
