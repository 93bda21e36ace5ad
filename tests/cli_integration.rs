//! CLI integration tests using assert_cmd to exercise the actual binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Binary with its state directory pointed at `home`.
fn shield(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("intake-shield").unwrap();
    cmd.env("INTAKE_SHIELD_HOME", home.path());
    cmd
}

// ---------------------------------------------------------------------------
// Scan subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_scan_clean_file_succeeds() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let file = work.path().join("notes.txt");
    std::fs::write(&file, "shopping list: eggs, milk").unwrap();

    shield(&home)
        .arg("scan")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("notes.txt: clean"))
        .stderr(predicate::str::contains("1 file(s) clean"));
}

#[test]
fn cli_scan_executable_fails_and_records_event() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("invoice.pdf"), b"MZ\x90\x00\x03\x00\x00\x00").unwrap();

    shield(&home)
        .args(["scan", "--client-ip", "198.51.100.7"])
        .arg(work.path())
        .assert()
        .failure()
        .code(1)
        .stdout(predicate::str::contains("QUARANTINE"))
        .stdout(predicate::str::contains("executable_signature"));

    shield(&home)
        .arg("events")
        .assert()
        .success()
        .stdout(predicate::str::contains("file_upload/malicious_file_detected"))
        .stdout(predicate::str::contains("ip=198.51.100.7"));
}

#[test]
fn cli_scan_json_output() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::write(work.path().join("empty.png"), b"").unwrap();

    let output = shield(&home)
        .args(["scan", "--json"])
        .arg(work.path())
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));

    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed[0]["result"]["safe"], false);
    assert_eq!(parsed[0]["result"]["threats"][0], "empty_file");
    assert_eq!(parsed[0]["quarantine"], false);
}

#[test]
fn cli_scan_respects_exclude_and_hidden() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    std::fs::create_dir_all(work.path().join("vendor")).unwrap();
    std::fs::write(work.path().join("vendor/tool.bin"), b"\x7fELF\x02\x01").unwrap();
    std::fs::write(work.path().join(".env.sh"), b"#!/bin/sh\n").unwrap();
    std::fs::write(work.path().join("readme.txt"), b"plain words").unwrap();

    shield(&home)
        .args(["scan", "--exclude", "vendor/**"])
        .arg(work.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("readme.txt: clean"))
        .stdout(predicate::str::contains("tool.bin").not());
}

#[test]
fn cli_scan_missing_path_fails() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["scan", "/definitely/not/a/real/path"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("path not found"));
}

// ---------------------------------------------------------------------------
// Sanitize subcommand
// ---------------------------------------------------------------------------

#[test]
fn cli_sanitize_text_strips_script() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["sanitize", "text"])
        .write_stdin("Hello <script>alert(1)</script><b>there</b>\n")
        .assert()
        .success()
        .stdout("Hello <b>there</b>\n");
}

#[test]
fn cli_sanitize_email_rejects() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["sanitize", "email"])
        .write_stdin("bad<script>@x.com\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("email rejected"));
}

#[test]
fn cli_sanitize_filename() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["sanitize", "filename"])
        .write_stdin("../../etc/passwd")
        .assert()
        .success()
        .stdout("passwd\n");
}

#[test]
fn cli_sanitize_accepts_invalid_utf8() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["sanitize", "text"])
        .write_stdin(b"hello \xff\xfe world\n".to_vec())
        .assert()
        .success()
        .stdout("hello \u{fffd}\u{fffd} world\n");
}

#[test]
fn cli_sanitize_respects_max_length() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .args(["sanitize", "text", "--max-length", "6"])
        .write_stdin("abcdefghijkl")
        .assert()
        .success()
        .stdout("abcde…\n");
}

// ---------------------------------------------------------------------------
// Events subcommand and config
// ---------------------------------------------------------------------------

#[test]
fn cli_events_empty() {
    let home = TempDir::new().unwrap();
    shield(&home)
        .arg("events")
        .assert()
        .success()
        .stdout(predicate::str::contains("No security events recorded."));
}

#[test]
fn cli_events_stats_is_json() {
    let home = TempDir::new().unwrap();
    let output = shield(&home).args(["events", "--stats"]).output().unwrap();
    assert!(output.status.success());
    let stats: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(stats["total_events"], 0);
}

#[test]
fn cli_malformed_config_fails() {
    let home = TempDir::new().unwrap();
    let config = home.path().join("bad.yml");
    std::fs::write(&config, "text: [unclosed").unwrap();

    shield(&home)
        .args(["--config"])
        .arg(&config)
        .arg("events")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn cli_config_from_state_dir_is_used() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("config.yml"), "text:\n  max_length: 4\n").unwrap();

    shield(&home)
        .args(["sanitize", "text"])
        .write_stdin("abcdefgh")
        .assert()
        .success()
        .stdout("abc…\n");
}
