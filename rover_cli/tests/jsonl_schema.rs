use assert_cmd::prelude::*;
use rstest::rstest;
use serde_json::Value;
use std::process::Command;

fn json_lines(args: &[&str]) -> Vec<Value> {
    let out = Command::cargo_bin("rover")
        .unwrap()
        .args(["--json", "--log-level", "error"])
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&out);
    stdout
        .lines()
        .map(|l| serde_json::from_str::<Value>(l).unwrap_or_else(|e| panic!("{e}: {l}")))
        .collect()
}

fn summary(lines: &[Value]) -> &Value {
    lines
        .iter()
        .find(|v| v["event"] == "summary")
        .expect("no summary line")
}

#[rstest]
fn every_event_line_is_tagged() {
    let lines = json_lines(&["joystick", "--y", "0.6", "--duration-ms", "300"]);
    assert!(lines.len() > 2);
    for v in &lines {
        assert!(v["event"].is_string(), "untagged line {v}");
    }
    for v in lines.iter().filter(|v| v["event"] != "summary") {
        assert!(v["t_ms"].is_u64(), "missing t_ms in {v}");
    }
    assert_eq!(lines.last().unwrap()["event"], "summary");
}

#[rstest]
fn control_is_granted_before_motion() {
    let lines = json_lines(&["motors", "--left", "0.4", "--right", "-0.4", "--duration-ms", "200"]);
    let first = &lines[0];
    assert_eq!(first["event"], "control_changed");
    assert_eq!(first["owner"], 1);
    assert!(first["previous"].is_null());

    let s = summary(&lines);
    assert_eq!(s["command"], "motors");
    assert_eq!(s["telemetry"]["mode"], "DIRECT_MOTOR");
    assert_eq!(s["telemetry"]["duty"]["left"], 102);
    assert_eq!(s["telemetry"]["duty"]["right"], -102);
}

#[rstest]
fn drive_summary_carries_encoders() {
    let lines = json_lines(&["drive", "--velocity", "20", "--duration-ms", "600"]);
    let s = summary(&lines);
    assert_eq!(s["telemetry"]["mode"], "VELOCITY");
    assert_eq!(s["timed_out"], false);
    let left = &s["telemetry"]["encoders"]["left"];
    assert!(left["count"].as_i64().unwrap() > 0, "{s}");
    assert!(left["velocity"].as_f64().unwrap() > 5.0, "{s}");
    assert!(lines.iter().any(|v| v["event"] == "encoders"));
}

#[rstest]
fn pattern_stopped_at_limit_reports_failure() {
    let lines = json_lines(&["pattern", "--shape", "square", "--side-cm", "20", "--max-ms", "400"]);
    let done: Vec<&Value> = lines
        .iter()
        .filter(|v| v["event"] == "sequence_complete")
        .collect();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0]["success"], false);

    let s = summary(&lines);
    assert_eq!(s["success"], false);
    assert_eq!(s["total"], 17);
}

#[rstest]
fn json_errors_are_structured() {
    let out = Command::cargo_bin("rover")
        .unwrap()
        .args(["--json", "calibrate", "--step", "-5"])
        .assert()
        .code(3)
        .get_output()
        .stderr
        .clone();
    let stderr = String::from_utf8_lossy(&out);
    let line = stderr
        .lines()
        .find(|l| l.contains("\"reason\""))
        .unwrap_or_else(|| panic!("no error JSON in {stderr}"));
    let v: Value = serde_json::from_str(line).unwrap();
    assert_eq!(v["event"], "error");
    assert_eq!(v["reason"], "Rejected");
    assert_eq!(v["exit_code"], 3);
}
