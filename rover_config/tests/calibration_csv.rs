use std::fs::File;
use std::io::Write;

use rover_config::{
    CalibrationRow, Side, fit_duty_to_velocity, fit_feedforward, fit_polynomial,
    fit_velocity_to_duty, load_calibration_csv, write_calibration_csv,
};
use rstest::rstest;
use tempfile::tempdir;

/// duty = 60 + 3·v above the dead-zone, right wheel twice as fast.
fn sweep() -> Vec<CalibrationRow> {
    (0..=10)
        .map(|i| {
            let duty = i * 20;
            let v = if duty < 60 { 0.0 } else { (duty - 60) as f32 / 3.0 + 2.0 };
            CalibrationRow {
                duty,
                left_velocity: if duty < 60 { 0.0 } else { v },
                right_velocity: -2.0 * v,
            }
        })
        .collect()
}

#[rstest]
fn csv_written_then_read_back() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("sweep.csv");
    let rows = sweep();
    write_calibration_csv(&path, &rows).unwrap();
    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("duty,left_velocity,right_velocity"));
    assert_eq!(load_calibration_csv(&path).unwrap(), rows);
}

#[rstest]
fn csv_with_wrong_headers_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "pwm,left,right").unwrap();
    writeln!(f, "10,0.0,0.0").unwrap();
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("must have headers"));
}

#[rstest]
fn csv_with_bad_row_names_the_line() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_row.csv");
    let mut f = File::create(&path).unwrap();
    writeln!(f, "duty, left_velocity, right_velocity").unwrap();
    writeln!(f, "10, 0.0, 0.0").unwrap();
    writeln!(f, "x, 1.0, 1.0").unwrap();
    let err = load_calibration_csv(&path).unwrap_err();
    assert!(format!("{err}").contains("row 3"), "{err}");
}

#[rstest]
#[case::left(Side::Left, 60.0, 3.0)]
#[case::right(Side::Right, 60.0, 1.5)]
fn feedforward_fit_recovers_model(#[case] side: Side, #[case] deadzone: f32, #[case] gain: f32) {
    let fit = fit_feedforward(&sweep(), side).unwrap();
    assert!((fit.deadzone - deadzone).abs() < 1e-3, "{fit:?}");
    assert!((fit.gain - gain).abs() < 1e-3, "{fit:?}");
}

#[rstest]
fn feedforward_fit_needs_motion() {
    let rows: Vec<_> = (0..5)
        .map(|i| CalibrationRow {
            duty: i * 10,
            left_velocity: 0.2,
            right_velocity: 0.0,
        })
        .collect();
    assert!(fit_feedforward(&rows, Side::Left).is_err());
}

#[rstest]
fn quadratic_is_recovered_exactly() {
    let pts: Vec<(f32, f32)> = (0..8)
        .map(|i| {
            let x = i as f32;
            (x, 1.0 + 2.0 * x - 0.5 * x * x)
        })
        .collect();
    let c = fit_polynomial(&pts, 2).unwrap();
    for (got, want) in c.iter().zip([1.0, 2.0, -0.5]) {
        assert!((got - want).abs() < 1e-3, "{c:?}");
    }
}

#[rstest]
fn polynomial_fit_limits() {
    let pts = [(1.0, 1.0), (2.0, 2.0)];
    assert!(fit_polynomial(&pts, 6).is_err());
    assert!(fit_polynomial(&pts, 2).is_err());
    assert!(fit_polynomial(&[(1.0, 1.0), (1.0, 2.0)], 1).is_err());
}

#[rstest]
fn sweep_models_have_requested_degree() {
    let rows = sweep();
    let v2d = fit_velocity_to_duty(&rows, Side::Left, 1).unwrap();
    assert_eq!(v2d.len(), 2);
    // duty = 54 + 3·v for the moving rows
    assert!((v2d[0] - 54.0).abs() < 1e-2 && (v2d[1] - 3.0).abs() < 1e-3, "{v2d:?}");
    let d2v = fit_duty_to_velocity(&rows, Side::Left, 3).unwrap();
    assert_eq!(d2v.len(), 4);
}
