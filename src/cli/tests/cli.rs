//! Command-line behavior that does not need a registry.

use std::process::Command;

fn regferry() -> Command {
    Command::new(env!("CARGO_BIN_EXE_regferry"))
}

#[test]
fn test_version() {
    let output = regferry().arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).starts_with("regferry "));
}

#[test]
fn test_export_digest_only_reference_fails() {
    let tmp = tempfile::TempDir::new().unwrap();
    let path = tmp.path().join("out.tar");
    let output = regferry()
        .args([
            "export",
            "registry.invalid/app@sha256:0000000000000000000000000000000000000000000000000000000000000000",
            "-o",
        ])
        .arg(&path)
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error: "));
    assert!(!path.exists());
    assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
}

#[test]
fn test_layer_pull_rejects_bad_digest() {
    let output = regferry()
        .args(["layer", "pull", "registry.invalid/app:v1", "sha256:xyz"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Error: "));
}

#[test]
fn test_invalid_integrity_flag() {
    let output = regferry()
        .args(["--integrity", "sometimes", "inspect", "alpine"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
