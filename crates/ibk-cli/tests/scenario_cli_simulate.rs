use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn simulate_walks_the_full_lifecycle() {
    Command::cargo_bin("ibk")
        .unwrap()
        .arg("simulate")
        .env("RUST_LOG", "warn")
        .assert()
        .success()
        .stdout(predicate::str::contains("status=CONNECTED"))
        .stdout(predicate::str::contains("next_valid_id=1000"))
        .stdout(predicate::str::contains("current_time=2023-11-14T22:13:20+00:00"))
        .stdout(predicate::str::contains(
            r#"event={"event":"connection_changed","data":true}"#,
        ))
        .stdout(predicate::str::contains(
            r#"event={"event":"connection_changed","data":false}"#,
        ))
        .stdout(predicate::str::ends_with("sent_requests=2\n"));
}

#[test]
fn simulate_reads_session_section_from_config() {
    let path = std::env::temp_dir().join(format!("ibk_cli_simulate_{}.yaml", std::process::id()));
    std::fs::write(
        &path,
        "session:\n  port: 7497\n  client_id: 9\n  connection_delay_ms: 20\n  poll_interval_ms: 2\n  reader_idle_ms: 2\n",
    )
    .unwrap();

    Command::cargo_bin("ibk")
        .unwrap()
        .arg("simulate")
        .arg("--config")
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("config_hash="))
        .stdout(predicate::str::contains("endpoint=127.0.0.1:7497 client_id=9"))
        .stdout(predicate::str::contains("connection_delay_ms=20"));

    let _ = std::fs::remove_file(path);
}

#[test]
fn simulate_rejects_unknown_session_keys() {
    let path = std::env::temp_dir().join(format!("ibk_cli_simulate_bad_{}.yaml", std::process::id()));
    std::fs::write(&path, "session:\n  prot: 7497\n").unwrap();

    Command::cargo_bin("ibk")
        .unwrap()
        .arg("simulate")
        .arg("--config")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("CONFIG_INVALID"));

    let _ = std::fs::remove_file(path);
}
