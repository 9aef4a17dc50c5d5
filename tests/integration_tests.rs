//! Integration tests for the fitsweep CLI

mod common;

use assert_cmd::Command;
use common::write_frames;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn fitsweep() -> Command {
    let mut cmd = Command::cargo_bin("fitsweep").unwrap();
    // keep the environment from leaking config into the runs
    cmd.env_remove("RUST_LOG");
    cmd
}

/// Test CLI binary exists and responds to --help
#[test]
fn test_cli_help() {
    fitsweep()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--input_dir"))
        .stdout(predicate::str::contains("--output_dir"));
}

/// Test CLI responds to --version
#[test]
fn test_cli_version() {
    fitsweep()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("fitsweep"));
}

#[test]
fn test_missing_required_flags() {
    fitsweep()
        .arg("--input_dir")
        .arg("frames")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--output_dir"));
}

#[test]
fn test_run_writes_catalog_and_spectra() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("frames");
    let output = temp.path().join("spectra");
    fs::create_dir(&input).unwrap();
    write_frames(&input, &["A_cor1.fits", "B_cor1.fits"]);

    fitsweep()
        .arg("--input_dir")
        .arg(&input)
        .arg("--output_dir")
        .arg(&output)
        .arg("--workers")
        .arg("2")
        .assert()
        .success()
        .stdout(predicate::str::contains("Processed 2 frames"));

    let catalog = fs::read_to_string(temp.path().join("objects.csv")).unwrap();
    assert_eq!(catalog.lines().count(), 5);
    assert!(catalog.starts_with("Object_ID,X,Y,origin"));
    assert_eq!(fs::read_dir(output.join("A")).unwrap().count(), 2);
    assert_eq!(fs::read_dir(output.join("B")).unwrap().count(), 2);
}

#[test]
fn test_ranks_backend_json_summary() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("frames");
    let output = temp.path().join("spectra");
    fs::create_dir(&input).unwrap();
    write_frames(&input, &["A_cor1.fits", "B_cor1.fits", "C_cor1.fits"]);
    fs::write(input.join("D_cor1.fits"), b"garbage").unwrap();

    let assert = fitsweep()
        .arg("--input_dir")
        .arg(&input)
        .arg("--output_dir")
        .arg(&output)
        .args(["--backend", "ranks", "--ranks", "2", "--format", "json"])
        .assert()
        .success()
        .stderr(predicate::str::contains("D_cor1.fits"));

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let summary: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(summary["backend"], "ranks");
    assert_eq!(summary["files"], 4);
    assert_eq!(summary["failed"], 1);
    assert_eq!(summary["objects"], 6);

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert_eq!(error_lines(&stderr), vec!["D_cor1.fits"]);
}

#[test]
fn test_pool_backend_logs_failing_frame_once() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("frames");
    let output = temp.path().join("spectra");
    fs::create_dir(&input).unwrap();
    write_frames(&input, &["A_cor1.fits", "C_cor1.fits"]);
    fs::write(input.join("B_cor1.fits"), b"garbage").unwrap();

    let assert = fitsweep()
        .arg("--input_dir")
        .arg(&input)
        .arg("--output_dir")
        .arg(&output)
        .args(["--backend", "pool", "--workers", "2"])
        .assert()
        .success();

    let stderr = String::from_utf8(assert.get_output().stderr.clone()).unwrap();
    assert_eq!(error_lines(&stderr), vec!["B_cor1.fits"]);
    assert!(!output.join("B").exists());
    assert!(output.join("A").is_dir());
}

/// File names named by the per-frame error log lines
fn error_lines(stderr: &str) -> Vec<&str> {
    const MARKER: &str = "Error processing file ";
    stderr
        .lines()
        .filter_map(|line| line.split_once(MARKER))
        .filter_map(|(_, rest)| rest.split(':').next())
        .collect()
}

#[test]
fn test_config_file_and_env_override() {
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("frames");
    fs::create_dir(&input).unwrap();
    write_frames(&input, &["A_cor1.fits"]);

    let config = temp.path().join("fitsweep.toml");
    fs::write(&config, "[output]\ncatalog_name = \"from_file.csv\"\n").unwrap();

    fitsweep()
        .env("FITSWEEP_OUTPUT__SPECTRUM_EXTENSION", "txt")
        .arg("--input_dir")
        .arg(&input)
        .arg("--output_dir")
        .arg(temp.path().join("spectra"))
        .arg("--config")
        .arg(&config)
        .arg("--quiet")
        .assert()
        .success();

    assert!(temp.path().join("from_file.csv").is_file());
    assert!(temp.path().join("spectra/A/1.txt").is_file());
}

#[test]
fn test_missing_input_dir_fails() {
    let temp = TempDir::new().unwrap();

    fitsweep()
        .arg("--input_dir")
        .arg(temp.path().join("nope"))
        .arg("--output_dir")
        .arg(temp.path().join("spectra"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input directory does not exist"));
}
