use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Small, fast control loop for the simulated backend
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[geometry]
ppr = 960
wheel_diameter_cm = 5.0

[control]
tick_ms = 10
command_timeout_ms = 500
sample_window_ms = 100

[sim]
deadzone_duty = 55.0
cm_s_per_duty = 0.35
time_constant_ms = 80
"#;
    let path = dir.path().join("rover.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn rover() -> Command {
    Command::cargo_bin("rover").unwrap()
}

#[rstest]
#[case(&["--help"], 0, "Usage:", "stdout")]
#[case(&["self-check"], 0, "ok (sim backend", "stdout")]
#[case(&["tuning"], 0, "feedforward_gain", "stdout")]
#[case(&["drive"], 2, "required", "stderr")]
#[case(&["calibrate", "--step", "0"], 3, "positive --step", "stderr")]
#[case(&["calibrate", "--poly-degree", "9"], 2, "9", "stderr")]
fn cli_table_cases(
    #[case] args: &[&str],
    #[case] exit_code: i32,
    #[case] needle: &str,
    #[case] stream: &str,
) {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = rover();
    cmd.arg("--config").arg(&cfg);
    for a in args {
        cmd.arg(a);
    }

    let assert = cmd.assert().code(exit_code);
    match stream {
        "stdout" => {
            assert.stdout(predicate::str::contains(needle));
        }
        "stderr" => {
            assert.stderr(predicate::str::contains(needle));
        }
        other => panic!("unknown stream: {other}"),
    }
}

#[rstest]
fn defaults_are_used_without_config() {
    rover()
        .arg("self-check")
        .assert()
        .success()
        .stdout(predicate::str::contains("ok"));
}

#[rstest]
#[case("[geometry]\nppr = 0\n", "geometry.ppr must be > 0")]
#[case("[control]\ntick_ms = 10\ncommand_timeout_ms = 5\n", "command_timeout_ms")]
#[case("[pins]\nleft_pwm = 12\n", "assigned more than once")]
#[case("[geometry]\nppr = \"many\"\n", "Configuration is invalid")]
fn invalid_config_is_reported(#[case] body: &str, #[case] needle: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    fs::write(&path, body).unwrap();

    rover()
        .arg("--config")
        .arg(&path)
        .arg("self-check")
        .assert()
        .code(1)
        .stderr(predicate::str::contains(needle));
}

#[rstest]
fn tuning_file_overrides_config() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let tuning = dir.path().join("tuning.toml");
    fs::write(&tuning, "feedforwardGain = 4.5\ndeadzonePWM = 42.0\n").unwrap();

    rover()
        .arg("--config")
        .arg(&cfg)
        .arg("--tuning")
        .arg(&tuning)
        .arg("tuning")
        .assert()
        .success()
        .stdout(predicate::str::contains("feedforward_gain = 4.5"))
        .stdout(predicate::str::contains("deadzone_pwm = 42.0"));
}

#[rstest]
fn drive_reports_a_summary() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    rover()
        .arg("--config")
        .arg(&cfg)
        .args(["drive", "--velocity", "-15", "--duration-ms", "400"])
        .assert()
        .success()
        .stdout(predicate::str::contains("mode IDLE -> VELOCITY"))
        .stdout(predicate::str::contains("drive finished after"));
}

#[rstest]
fn calibration_writes_csv_and_tuning() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let csv = dir.path().join("sweep.csv");
    let tuning = dir.path().join("fitted.toml");

    rover()
        .arg("--config")
        .arg(&cfg)
        .args([
            "calibrate", "--motor", "left", "--start", "40", "--end", "240", "--step", "40",
            "--hold-ms", "300",
        ])
        .arg("--csv")
        .arg(&csv)
        .arg("--save-tuning")
        .arg(&tuning)
        .assert()
        .success()
        .stdout(predicate::str::contains("calibration recorded 6 points"));

    let rows = rover_config::load_calibration_csv(&csv).unwrap();
    assert_eq!(
        rows.iter().map(|r| r.duty).collect::<Vec<_>>(),
        vec![40, 80, 120, 160, 200, 240]
    );
    assert!(rows[0].left_velocity.abs() < 0.5, "below the dead-zone: {rows:?}");
    assert!(rows.iter().all(|r| r.right_velocity.abs() < 0.5), "right wheel idle: {rows:?}");
    assert!(rows[5].left_velocity > rows[1].left_velocity);

    let fitted = rover_config::TuningRecord::load_file(&tuning).unwrap();
    assert!((fitted.deadzone_pwm - 80.0).abs() < f32::EPSILON);
    assert!(
        (2.0..4.0).contains(&fitted.feedforward_gain),
        "gain {}",
        fitted.feedforward_gain
    );
}

#[rstest]
fn bad_tuning_path_fails() {
    let dir = tempdir().unwrap();
    rover()
        .arg("--tuning")
        .arg(dir.path().join("missing.toml"))
        .arg("tuning")
        .assert()
        .code(1);
}
