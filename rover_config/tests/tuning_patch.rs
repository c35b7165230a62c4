use rover_config::{TuningPatch, TuningRecord};
use rstest::rstest;
use tempfile::tempdir;

#[rstest]
fn record_survives_save_and_load() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tuning.toml");
    let rec = TuningRecord {
        feedforward_gain: 2.25,
        pid_enabled: true,
        pid_kp: 1.5,
        vel2pwm: vec![48.0, 2.5, -0.01],
        ..TuningRecord::default()
    };
    rec.save_file(&path).unwrap();
    let back = TuningRecord::load_file(&path).unwrap();
    assert_eq!(back, rec);
}

#[rstest]
fn camel_case_keys_are_accepted() {
    let rec = TuningRecord::load_toml(
        "feedforwardGain = 4.0\ndeadzonePWM = 55.0\npidEnabled = true\npidKi = 0.3\n",
    )
    .unwrap();
    assert!((rec.feedforward_gain - 4.0).abs() < f32::EPSILON);
    assert!((rec.deadzone_pwm - 55.0).abs() < f32::EPSILON);
    assert!(rec.pid_enabled);
    assert!((rec.pid_ki - 0.3).abs() < f32::EPSILON);
}

#[rstest]
fn patch_touches_only_present_fields() {
    let mut rec = TuningRecord::default();
    let patch = TuningPatch::load_toml("pid_kp = 2.0\npolynomial_enabled = true\n").unwrap();
    assert!(!patch.is_empty());
    patch.apply(&mut rec).unwrap();
    assert!((rec.pid_kp - 2.0).abs() < f32::EPSILON);
    assert!(rec.polynomial_enabled);
    assert!((rec.deadzone_pwm - 60.0).abs() < f32::EPSILON);
}

#[rstest]
fn invalid_patch_leaves_record_untouched() {
    let mut rec = TuningRecord::default();
    let patch = TuningPatch {
        feedforward_gain: Some(-1.0),
        pid_kd: Some(9.0),
        ..TuningPatch::default()
    };
    assert!(patch.apply(&mut rec).is_err());
    assert_eq!(rec, TuningRecord::default());
}

#[rstest]
fn reset_restores_defaults() {
    let mut rec = TuningRecord {
        deadzone_pwm: 12.0,
        pwm2vel: vec![1.0],
        ..TuningRecord::default()
    };
    rec.reset();
    assert_eq!(rec, TuningRecord::default());
    assert!(TuningPatch::default().is_empty());
}
