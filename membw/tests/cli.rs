use std::fs;
use std::process::{Command, Output};

/// Run the membw binary with `args`, return its output. No case here opens a
/// device, so they pass on machines without an accelerator.
fn run_membw(args: &[&str]) -> Output {
    let binary = env!("CARGO_BIN_EXE_membw");
    let tmpdir = tempfile::tempdir().expect("Failed to create temp dir");

    Command::new(binary)
        .args(args)
        .current_dir(tmpdir.path())
        .env("RUST_LOG", "off")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run {}: {}", binary, e))
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_unknown_kernel_name() {
    let output = run_membw(&["0", "--kernel", "bogus"]);
    assert!(!output.status.success());
    assert!(
        stderr_of(&output).contains("Unknown kernel name: bogus"),
        "stderr: {}",
        stderr_of(&output)
    );
}

#[test]
fn test_unsupported_pattern_name() {
    let output = run_membw(&["0", "--kernel", "global_write_linear"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("global_write_linear"));
}

#[test]
fn test_single_iteration_rejected() {
    let output = run_membw(&["0", "1"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("iteration"));
}

#[test]
fn test_missing_device_argument() {
    let output = run_membw(&[]);
    assert!(!output.status.success());
    // clap reports usage before the run banner is printed
    assert!(!String::from_utf8_lossy(&output.stdout).contains("BEGIN membw"));
}

#[test]
fn test_indivisible_global_size() {
    let output = run_membw(&["0", "--global-size", "1000", "--local-size", "256"]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Invalid configuration"));
}

#[test]
fn test_malformed_config_file() {
    let tmpdir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = tmpdir.path().join("membw.json");
    fs::write(&path, "{ \"global_size\": ").unwrap();

    let output = run_membw(&["0", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Invalid configuration"));
}

#[test]
fn test_config_kernel_list_checked_before_devices() {
    let tmpdir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = tmpdir.path().join("membw.json");
    fs::write(&path, r#"{ "kernels": ["global_read_linear", "nope"] }"#).unwrap();

    let output = run_membw(&["0", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("Unknown kernel name: nope"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Devices found"));
}

#[test]
fn test_device_index_out_of_range() {
    let output = run_membw(&["999"]);
    assert!(!output.status.success());
    assert!(
        stderr_of(&output).contains("Invalid device selection: 999"),
        "stderr: {}",
        stderr_of(&output)
    );
}

#[test]
fn test_unknown_backend_bits_rejected() {
    let tmpdir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = tmpdir.path().join("membw.json");
    fs::write(&path, r#"{ "backends_bits": 2147483648 }"#).unwrap();

    let output = run_membw(&["0", "--config", path.to_str().unwrap()]);
    assert!(!output.status.success());
    assert!(stderr_of(&output).contains("backends_bits"));
    assert!(!String::from_utf8_lossy(&output.stdout).contains("Devices found"));
}
