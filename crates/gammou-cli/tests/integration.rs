//! Integration tests for gammou-cli.
//!
//! Tests invoke the `gammou` binary and check rendered WAV files and
//! configuration handling end to end.

use std::process::Command;

/// Helper to get the path to the `gammou` binary built by cargo.
fn gammou_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_gammou"))
}

// ---------------------------------------------------------------------------
// `gammou nodes`
// ---------------------------------------------------------------------------

#[test]
fn cli_nodes_lists_builtins() {
    let output = gammou_bin().arg("nodes").output().expect("failed to run gammou nodes");
    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Available Nodes"));
    for id in ["sine", "envelope", "gain", "sum", "multiply", "constant", "identity"] {
        assert!(stdout.contains(id), "node listing should contain '{id}'");
    }
}

#[test]
fn cli_nodes_detail_and_unknown() {
    let output = gammou_bin().args(["nodes", "sine"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Inputs:    2"));
    assert!(stdout.contains("State:     1 cells"));

    let output = gammou_bin().args(["nodes", "nope"]).output().unwrap();
    assert!(!output.status.success());
}

// ---------------------------------------------------------------------------
// `gammou config`
// ---------------------------------------------------------------------------

#[test]
fn cli_config_show_defaults() {
    let output = gammou_bin().args(["config", "show"]).output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("voice_count = 16"));
    assert!(stdout.contains("overflow_policy = \"drop\""));
}

#[test]
fn cli_config_init_then_check() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("gammou.toml");

    let output = gammou_bin()
        .args(["config", "init"])
        .arg(&path)
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(path.exists());

    // refuses to overwrite without --force
    let output = gammou_bin().args(["config", "init"]).arg(&path).output().unwrap();
    assert!(!output.status.success());

    let output = gammou_bin().args(["config", "check"]).arg(&path).output().unwrap();
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("OK"));
}

#[test]
fn cli_config_check_rejects_invalid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "voice_count = 0\n").unwrap();

    let output = gammou_bin().args(["config", "check"]).arg(&path).output().unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("voice_count"), "stderr: {stderr}");
}

// ---------------------------------------------------------------------------
// `gammou render`
// ---------------------------------------------------------------------------

#[test]
fn cli_render_writes_float_wav() {
    let dir = tempfile::tempdir().unwrap();
    let wav = dir.path().join("chord.wav");

    let output = gammou_bin()
        .arg("render")
        .arg(&wav)
        .args(["--notes", "57,60,64", "--note-length", "0.25", "--tail", "0.25"])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "render failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let reader = hound::WavReader::open(&wav).unwrap();
    let spec = reader.spec();
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, 48000);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);

    let samples: Vec<f32> = reader.into_samples::<f32>().map(Result::unwrap).collect();
    assert_eq!(samples.len(), 24000 * 2);
    let peak = samples.iter().fold(0.0f32, |m, &x| m.max(x.abs()));
    assert!(peak > 0.05, "render is silent (peak {peak})");
    assert!(samples.iter().all(|x| x.is_finite()));
}

#[test]
fn cli_render_uses_config_channels() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("mono.toml");
    std::fs::write(&cfg, "output_count = 1\nsample_rate = 22050\nvoice_count = 2\n").unwrap();
    let wav = dir.path().join("mono.wav");

    let output = gammou_bin()
        .arg("render")
        .arg(&wav)
        .arg("--config")
        .arg(&cfg)
        .args(["--notes", "60", "--note-length", "0.1", "--tail", "0"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let reader = hound::WavReader::open(&wav).unwrap();
    assert_eq!(reader.spec().channels, 1);
    assert_eq!(reader.spec().sample_rate, 22050);
    assert_eq!(reader.len(), 2205);
}

#[test]
fn cli_render_rejects_negative_durations() {
    let dir = tempfile::tempdir().unwrap();
    let output = gammou_bin()
        .arg("render")
        .arg(dir.path().join("x.wav"))
        .args(["--tail=-1"])
        .output()
        .unwrap();
    assert!(!output.status.success());
}
