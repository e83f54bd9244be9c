/// Integration tests for the reference sample CLI
/// Tests cover: objects, SED/PDZ writes and reads, validation errors, rotation,
/// missing lists, optimize, persistence and configuration errors
use std::fs;
use std::path::Path;
use tempfile::tempdir;

/// Helper to run CLI commands against the store at `root` and capture output
fn run_cli_with(root: &Path, env: &[(&str, &str)], command: &str) -> (String, String, bool) {
    use std::io::Write;
    use std::process::{Command, Stdio};

    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cli"));
    cmd.env("REFSAMPLE_PATH", root.to_str().unwrap())
        .env_remove("REFSAMPLE_MAX_FILE_KB")
        .env_remove("REFSAMPLE_OVERWRITE")
        .env_remove("REFSAMPLE_SYNC")
        .env_remove("RUST_LOG");
    for (k, v) in env {
        cmd.env(k, v);
    }

    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn CLI");

    {
        let stdin = child.stdin.as_mut().expect("Failed to open stdin");
        // The process may exit before reading stdin (configuration errors)
        let _ = stdin.write_all(command.as_bytes());
        let _ = stdin.write_all(b"EXIT\n");
    }

    let output = child.wait_with_output().expect("Failed to read output");
    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn run_cli_command(root: &Path, command: &str) -> String {
    run_cli_with(root, &[], command).0
}

/// Reply lines only: strips the banner and the prompt prefix.
fn replies(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(3)
        .map(|l| l.trim_start_matches("> ").to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

#[test]
fn test_create_store_on_first_run() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "SIZE\n");

    assert!(output.contains("RefSample ready"));
    assert!(root.join("index.bin").is_file());
    assert!(root.join("sed_data_1.bin").is_file());
    assert!(root.join("pdz_data_1.bin").is_file());
    assert_eq!(replies(&output), vec!["0", "bye"]);
}

#[test]
fn test_basic_sed_roundtrip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "NEW 10\nADDSED 10 100:1 105:2 110:3\nGETSED 10\n");

    assert_eq!(replies(&output), vec!["OK", "OK", "100:1 105:2 110:3", "bye"]);
}

#[test]
fn test_basic_pdz_roundtrip() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let commands = "NEW 10\nNEW 11\nADDPDZ 10 0:0 1:0.5 2:1\nADDPDZ 11 0:0.75 1:0.5 2:0.25\nGETPDZ 10\nGETPDZ 11\n";
    let output = run_cli_command(&root, commands);

    assert_eq!(
        replies(&output),
        vec!["OK", "OK", "OK", "OK", "0:0 1:0.5 2:1", "0:0.75 1:0.5 2:0.25", "bye"]
    );
}

#[test]
fn test_unset_data_is_nil() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "NEW 5\nGETSED 5\nGETPDZ 5\n");

    assert_eq!(replies(&output), vec!["OK", "(nil)", "(nil)", "bye"]);
}

#[test]
fn test_unknown_id_is_error() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "GETSED 5\nADDSED 5 1:1\n");

    let r = replies(&output);
    assert!(r[0].starts_with("ERR"));
    assert!(r[1].starts_with("ERR"));
}

#[test]
fn test_duplicate_object_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "NEW 1\nNEW 1\nSIZE\n");

    let r = replies(&output);
    assert_eq!(r[0], "OK");
    assert!(r[1].starts_with("ERR"));
    assert_eq!(r[2], "1");
}

#[test]
fn test_second_write_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let commands = "NEW 1\nADDSED 1 1:1 2:2\nADDSED 1 3:3\nGETSED 1\n";
    let output = run_cli_command(&root, commands);

    let r = replies(&output);
    assert!(r[2].starts_with("ERR"));
    assert!(r[2].contains("already set"));
    assert_eq!(r[3], "1:1 2:2");
}

#[test]
fn test_unsorted_sed_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "NEW 1\nADDSED 1 10:0 9:1 7:2\nGETSED 1\nMISSING SED\n");

    let r = replies(&output);
    assert!(r[1].starts_with("ERR"));
    assert_eq!(r[2], "(nil)");
    assert_eq!(r[3], "1");
    assert_eq!(fs::metadata(root.join("sed_data_1.bin")).unwrap().len(), 0);
}

#[test]
fn test_pdz_axis_mismatch_rejected() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let commands = "NEW 1\nNEW 2\nADDPDZ 1 0:1 1:1 2:1\nADDPDZ 2 0:1 1:1\nADDPDZ 2 0:1 1.5:1 2:1\n";
    let output = run_cli_command(&root, commands);

    let r = replies(&output);
    assert_eq!(r[2], "OK");
    assert!(r[3].starts_with("ERR"));
    assert!(r[4].starts_with("ERR"));
}

#[test]
fn test_missing_lists() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let commands = "NEW 1\nNEW 2\nNEW 3\nADDSED 2 1:1\nADDPDZ 3 0:1\nMISSING SED\nMISSING PDZ\nIDS\n";
    let output = run_cli_command(&root, commands);

    let r = replies(&output);
    assert_eq!(r[5], "1 3");
    assert_eq!(r[6], "1 2");
    assert_eq!(r[7], "1 2 3");
}

#[test]
fn test_rotation_with_small_budget() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    // 200 points per SED = 1612 bytes, above the 1 KiB budget
    let points: Vec<String> = (0..200).map(|i| format!("{}:1", i)).collect();
    let mut commands = String::new();
    for id in 0..3 {
        commands.push_str(&format!("NEW {}\nADDSED {} {}\n", id, id, points.join(" ")));
    }
    let (out, _, ok) = run_cli_with(&root, &[("REFSAMPLE_MAX_FILE_KB", "1")], &commands);

    assert!(ok);
    assert!(!out.contains("ERR"));
    assert!(root.join("sed_data_3.bin").is_file());
    assert!(!root.join("sed_data_4.bin").exists());
}

#[test]
fn test_persistence_across_restarts() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    run_cli_command(&root, "NEW 7\nADDSED 7 1:2 3:4\nADDPDZ 7 0:0.5 1:0.5\n");
    let output = run_cli_command(&root, "SIZE\nGETSED 7\nGETPDZ 7\n");

    assert!(output.contains("objects=1"));
    assert_eq!(replies(&output), vec!["1", "1:2 3:4", "0:0.5 1:0.5", "bye"]);
}

#[test]
fn test_overwrite_clears_store() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    run_cli_command(&root, "NEW 7\n");
    let (out, _, ok) = run_cli_with(&root, &[("REFSAMPLE_OVERWRITE", "true")], "SIZE\n");

    assert!(ok);
    assert_eq!(replies(&out), vec!["0", "bye"]);
}

#[test]
fn test_optimize_reorders_ids() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let commands = "NEW 1\nNEW 2\nNEW 3\nADDSED 3 1:1\nADDSED 1 1:1\nOPTIMIZE\nIDS\n";
    let output = run_cli_command(&root, commands);

    let r = replies(&output);
    assert_eq!(r[5], "OK");
    assert_eq!(r[6], "3 1 2");

    let output = run_cli_command(&root, "IDS\n");
    assert_eq!(replies(&output)[0], "3 1 2");
}

#[test]
fn test_sync_mode() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let (out, _, ok) = run_cli_with(
        &root,
        &[("REFSAMPLE_SYNC", "true")],
        "NEW 1\nADDSED 1 1:1\nGETSED 1\n",
    );

    assert!(ok);
    assert!(out.contains("sync=true"));
    assert_eq!(replies(&out), vec!["OK", "OK", "1:1", "bye"]);
}

#[test]
fn test_invalid_config_fails() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let (_, err, ok) = run_cli_with(&root, &[("REFSAMPLE_MAX_FILE_KB", "huge")], "");

    assert!(!ok);
    assert!(err.contains("REFSAMPLE_MAX_FILE_KB"));
    assert!(!root.exists());
}

#[test]
fn test_usage_errors() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "NEW\nADDSED x 1:1\nMISSING\nFROB\n");

    let r = replies(&output);
    assert!(r[..4].iter().all(|l| l.starts_with("ERR")));
    assert!(r[3].contains("unknown command"));
}

#[test]
fn test_stats_output() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "STATS\n");

    assert!(output.contains("ReferenceSample"));
    assert!(output.contains("sed_files"));
}

#[test]
fn test_quit_command() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let output = run_cli_command(&root, "QUIT\nNEW 1\n");

    assert!(output.contains("bye"));
    assert!(!output.contains("OK"));
}

#[test]
fn test_logs_go_to_stderr() {
    let dir = tempdir().unwrap();
    let root = dir.path().join("rs");

    let (out, err, _) = run_cli_with(&root, &[("RUST_LOG", "info")], "SIZE\n");

    assert!(err.contains("created reference sample"));
    assert!(!out.contains("created reference sample"));
}
