#![no_main]
use libfuzzer_sys::arbitrary::{self, Arbitrary};
use libfuzzer_sys::fuzz_target;
use rover_config::{CalibrationRow, Side, fit_feedforward, fit_polynomial};

#[derive(Debug, Arbitrary)]
struct Sweep {
    rows: Vec<(i16, f32, f32)>,
    degree: u8,
}

fuzz_target!(|sweep: Sweep| {
    let rows: Vec<CalibrationRow> = sweep
        .rows
        .iter()
        .map(|&(duty, l, r)| CalibrationRow {
            duty: i32::from(duty),
            left_velocity: l,
            right_velocity: r,
        })
        .collect();
    if let Ok(fit) = fit_feedforward(&rows, Side::Left) {
        assert!(fit.gain.is_finite() && fit.deadzone.is_finite(), "{fit:?}");
    }
    let pts: Vec<(f32, f32)> = rows.iter().map(|r| (r.left_velocity, r.duty as f32)).collect();
    if let Ok(coeffs) = fit_polynomial(&pts, usize::from(sweep.degree % 8)) {
        assert!(coeffs.iter().all(|c| c.is_finite()), "{coeffs:?}");
    }
});
