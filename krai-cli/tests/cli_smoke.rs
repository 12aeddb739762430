use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

fn write_config(dir: &std::path::Path) -> std::path::PathBuf {
    let config_path = dir.join("krai.toml");
    let contents = format!(
        "[database]\nurl = \"file:{db}\"\nauth_token = \"\"\nblob_path = \"{blob}\"\n\n[patterns]\nfile_path = \"{patterns}\"\n\n[cli]\ndefault_format = \"json\"\n",
        db = dir.join("krai.db").display(),
        blob = dir.join("blobs.redb").display(),
        patterns = dir.join("patterns.toml").display(),
    );
    std::fs::write(&config_path, contents).unwrap();
    config_path
}

#[test]
fn ingest_then_status_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let manual_path = dir.path().join("manual.pdf");
    std::fs::File::create(&manual_path)
        .unwrap()
        .write_all(b"%PDF-1.4 fake manual")
        .unwrap();

    let mut ingest = Command::cargo_bin("krai").unwrap();
    let output = ingest
        .arg("--config")
        .arg(&config_path)
        .arg("ingest")
        .arg(&manual_path)
        .arg("--document-type")
        .arg("service_manual")
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let document_id = parsed["document_id"].as_str().unwrap().to_string();
    assert_eq!(parsed["status"], "new");

    let mut status = Command::cargo_bin("krai").unwrap();
    status
        .arg("--config")
        .arg(&config_path)
        .arg("status")
        .arg(&document_id)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"document_id\""));
}

#[test]
fn list_patterns_on_empty_registry_prints_nothing_registered() {
    let dir = tempfile::tempdir().unwrap();
    let config_path = write_config(dir.path());

    let mut cmd = Command::cargo_bin("krai").unwrap();
    cmd.arg("--config")
        .arg(&config_path)
        .arg("list-patterns")
        .assert()
        .success()
        .stdout(predicate::str::contains("no manufacturers registered"));
}
