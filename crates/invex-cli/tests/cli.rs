//! Command-line tests that run without network access.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn invex(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("invex").unwrap();
    cmd.current_dir(home.path())
        .env("XDG_CONFIG_HOME", home.path())
        .env_remove("GOOGLE_API_KEY");
    cmd
}

#[test]
fn schema_json_uses_model_types() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .arg("schema")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"OBJECT\""))
        .stdout(predicate::str::contains("\"invoice_number\""))
        .stdout(predicate::str::contains("\"propertyOrdering\""));
}

#[test]
fn schema_text_marks_optional_fields() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["schema", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("ship_to?: string"))
        .stdout(predicate::str::contains("invoice_number: string"))
        .stdout(predicate::str::contains("quantity: integer"));
}

#[test]
fn config_init_get_set() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("conf").join("invex.json");
    let path = path.to_str().unwrap();

    invex(&home)
        .args(["--config", path, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created configuration file"));

    invex(&home)
        .args(["--config", path, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    invex(&home)
        .args(["--config", path, "config", "get", "extraction.model"])
        .assert()
        .success()
        .stdout("\"gemini-2.0-flash\"\n");

    invex(&home)
        .args(["--config", path, "config", "set", "server.port", "9000"])
        .assert()
        .success();

    invex(&home)
        .args(["--config", path, "config", "get", "server.port"])
        .assert()
        .success()
        .stdout("9000\n");

    invex(&home)
        .args(["--config", path, "config", "set", "server.nope", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration key not found"));
}

#[test]
fn config_path_reports_missing_file() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("invex"))
        .stdout(predicate::str::contains("not created"));
}

#[test]
fn parse_without_matches_fails() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["parse", "missing-*.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No matching files found"));
}

#[test]
fn parse_csv_needs_single_table() {
    let home = TempDir::new().unwrap();
    invex(&home)
        .args(["parse", "--format", "csv", "scan.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("CSV output needs a single table"));
}

#[test]
fn parse_without_api_key_fails() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("scan.png"), b"\x89PNG\r\n\x1a\n").unwrap();

    invex(&home)
        .args(["parse", "scan.png"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("GOOGLE_API_KEY"));
}

#[test]
fn parse_reports_every_failed_file() {
    let home = TempDir::new().unwrap();
    std::fs::write(home.path().join("ok.png"), b"\x89PNG\r\n\x1a\n").unwrap();

    // Nothing listens on this port once the listener is dropped
    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let api_base = format!("http://{}/v1beta", closed.local_addr().unwrap());
    drop(closed);

    let config = home.path().join("config.json");
    std::fs::write(
        &config,
        format!(r#"{{"extraction": {{"api_base": "{api_base}", "timeout_secs": 5}}}}"#),
    )
    .unwrap();

    invex(&home)
        .env("GOOGLE_API_KEY", "test-key")
        .args(["--config", config.to_str().unwrap(), "parse", "missing.png", "ok.png"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Found 2 files to process"))
        .stderr(predicate::str::contains("Error processing missing.png: could not read file"))
        .stderr(predicate::str::contains("Error processing ok.png: "))
        .stderr(predicate::str::contains("0 successful, 2 failed"))
        .stderr(predicate::str::contains("No invoices were parsed."));
}
