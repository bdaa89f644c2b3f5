//! Integration tests for `cerberus expiring`
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn setup() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("Histograms.json"),
        r#"{
            "CYCLE_COLLECTOR": {"expires_in_version": "40", "alert_emails": ["cc@example.com"]},
            "GC_MS": {"expires_in_version": "40.0", "alert_emails": ["gc@example.com", "cc@example.com"]},
            "NETWORK_MS": {"expires_in_version": "41"},
            "STARTUP_MS": {"expires_in_version": "never", "alert_emails": ["perf@example.com"]}
        }"#,
    )
    .unwrap();
    fs::write(
        dir.path().join("calendar.json"),
        r#"{"39.0a1": "2015-06-30", "40.0a1": "2015-08-11", "41.0a1": "2015-09-22"}"#,
    )
    .unwrap();
    dir
}

fn expiring_cmd(dir: &TempDir, today: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cerberus");
    cmd.arg("expiring")
        .arg("--probes")
        .arg(dir.path().join("Histograms.json"))
        .arg("--calendar")
        .arg(dir.path().join("calendar.json"))
        .arg("--today")
        .arg(today);
    cmd
}

#[test]
fn test_expiring_lists_probes_a_week_out() {
    let dir = setup();

    expiring_cmd(&dir, "2015-08-04")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "CYCLE_COLLECTOR expires in version 40 (watched by cc@example.com)",
        ))
        .stdout(predicate::str::contains(
            "GC_MS expires in version 40.0 (watched by gc@example.com, cc@example.com)",
        ))
        .stdout(predicate::str::contains("NETWORK_MS").not())
        .stdout(predicate::str::contains("STARTUP_MS").not());
}

#[test]
fn test_expiring_nothing_on_other_days() {
    let dir = setup();

    expiring_cmd(&dir, "2015-08-05")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_expiring_lead_from_config() {
    let dir = setup();
    let config = dir.path().join("cerberus.toml");
    fs::write(&config, "[alert]\nexpiry_lead_days = 14\n").unwrap();

    expiring_cmd(&dir, "2015-09-08")
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("NETWORK_MS expires in version 41"));
}

#[test]
fn test_expiring_notify_writes_one_digest_per_subscriber() {
    let dir = setup();
    let outbox = dir.path().join("outbox");
    let notified = dir.path().join("notified.json");

    expiring_cmd(&dir, "2015-08-04")
        .arg("--notify")
        .arg("--outbox")
        .arg(&outbox)
        .arg("--notified")
        .arg(&notified)
        .assert()
        .success()
        .stderr(predicate::str::contains("Sent 2 expiry digest(s)"));

    let digests: Vec<String> = fs::read_dir(&outbox)
        .unwrap()
        .map(|e| fs::read_to_string(e.unwrap().path()).unwrap())
        .collect();
    assert_eq!(digests.len(), 2);

    let cc = digests
        .iter()
        .find(|d| d.contains("To: cc@example.com"))
        .unwrap();
    assert!(cc.contains("Subject: Telemetry Histogram Expiry"));
    assert!(cc.contains("* CYCLE_COLLECTOR expires in version 40 [SUBSCRIBED]"));
    assert!(cc.contains("* GC_MS expires in version 40.0 [SUBSCRIBED]"));

    let names: Vec<String> =
        serde_json::from_str(&fs::read_to_string(&notified).unwrap()).unwrap();
    assert_eq!(names, vec!["CYCLE_COLLECTOR", "GC_MS"]);
}

#[test]
fn test_expiring_notify_does_not_repeat() {
    let dir = setup();
    let notified = dir.path().join("notified.json");

    for expected in ["Sent 2 expiry digest(s)", "Sent 0 expiry digest(s)"] {
        expiring_cmd(&dir, "2015-08-04")
            .arg("--notify")
            .arg("--notified")
            .arg(&notified)
            .assert()
            .success()
            .stderr(predicate::str::contains(expected));
    }
}

#[test]
fn test_expiring_missing_calendar_fails() {
    let dir = setup();
    fs::remove_file(dir.path().join("calendar.json")).unwrap();

    expiring_cmd(&dir, "2015-08-04")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read release calendar"));
}
