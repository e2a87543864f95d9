//! Binary-level smoke tests.

use assert_cmd::Command;
use predicates::prelude::*;

#[test]
fn missing_input_fails_with_a_diagnostic() {
    let dir = tempfile::tempdir().unwrap();
    Command::cargo_bin("aab-repack")
        .unwrap()
        .current_dir(dir.path())
        .args([
            "-i",
            "missing.apk",
            "-o",
            "out.aab",
            "--keystore",
            "missing.jks",
            "--store-password",
            "secret",
            "--key-alias",
            "release",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn help_lists_the_signing_flags() {
    Command::cargo_bin("aab-repack")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--keystore"));
}
