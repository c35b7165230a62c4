//! Calibration sweep data: CSV import/export and model fitting.
//!
//! A sweep produces one row per duty step with the speed each wheel reached.
//! From those rows we derive either a dead-zone + gain feedforward model or a
//! least-squares polynomial.

use serde::{Deserialize, Serialize};
use std::path::Path;

/// Speeds at or below this (cm/s) count as "not moving".
pub const MOTION_THRESHOLD: f32 = 1.0;

/// Calibration CSV schema.
///
/// Expected headers:
/// duty,left_velocity,right_velocity
///
/// Example:
/// duty,left_velocity,right_velocity
/// 60,0.0,0.0
/// 80,6.2,5.9
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationRow {
    pub duty: i32,
    pub left_velocity: f32,
    pub right_velocity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

impl CalibrationRow {
    pub fn velocity(&self, side: Side) -> f32 {
        match side {
            Side::Left => self.left_velocity,
            Side::Right => self.right_velocity,
        }
    }
}

const HEADERS: [&str; 3] = ["duty", "left_velocity", "right_velocity"];

pub fn load_calibration_csv(path: &Path) -> eyre::Result<Vec<CalibrationRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().collect();
    if actual != HEADERS {
        eyre::bail!(
            "calibration CSV must have headers '{}', got: {}",
            HEADERS.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    Ok(rows)
}

pub fn write_calibration_csv(path: &Path, rows: &[CalibrationRow]) -> eyre::Result<()> {
    let mut wtr = csv::Writer::from_path(path)
        .map_err(|e| eyre::eyre!("create calibration CSV {:?}: {}", path, e))?;
    for row in rows {
        wtr.serialize(row)
            .map_err(|e| eyre::eyre!("write calibration CSV {:?}: {}", path, e))?;
    }
    wtr.flush()?;
    Ok(())
}

/// `duty = deadzone + gain × |velocity|`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedforwardFit {
    pub deadzone: f32,
    pub gain: f32,
}

/// Dead-zone is the first duty at which the wheel moved; the gain is the OLS
/// slope of `(duty - deadzone)` against speed over the moving rows.
pub fn fit_feedforward(rows: &[CalibrationRow], side: Side) -> eyre::Result<FeedforwardFit> {
    if rows.len() < 2 {
        eyre::bail!("model fit requires at least two rows, got {}", rows.len());
    }
    let moving = |r: &&CalibrationRow| r.velocity(side).abs() > MOTION_THRESHOLD;
    let Some(first) = rows.iter().find(moving) else {
        eyre::bail!("wheel never moved during the sweep");
    };
    let deadzone = first.duty;
    let pts: Vec<(f64, f64)> = rows
        .iter()
        .filter(moving)
        .filter(|r| r.duty >= deadzone)
        .map(|r| (f64::from(r.velocity(side).abs()), f64::from(r.duty - deadzone)))
        .collect();
    let (gain, _) = ols(&pts)?;
    #[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
    let fit = FeedforwardFit {
        deadzone: deadzone as f32,
        gain: gain as f32,
    };
    Ok(fit)
}

/// Least-squares polynomial of `degree` through `(x, y)` points, returned in
/// ascending powers.
pub fn fit_polynomial(points: &[(f32, f32)], degree: usize) -> eyre::Result<Vec<f32>> {
    if degree + 1 > crate::tuning::MAX_COEFFICIENTS {
        eyre::bail!("polynomial degree {degree} exceeds the supported maximum of 5");
    }
    let n = degree + 1;
    if points.len() < n {
        eyre::bail!(
            "degree {degree} fit needs at least {n} points, got {}",
            points.len()
        );
    }

    // Normal equations (XᵀX) a = Xᵀy, augmented into one matrix.
    let mut m = vec![vec![0.0f64; n + 1]; n];
    for &(x, y) in points {
        let (x, y) = (f64::from(x), f64::from(y));
        let mut powers = vec![1.0f64; 2 * n - 1];
        for k in 1..powers.len() {
            powers[k] = powers[k - 1] * x;
        }
        for (i, row) in m.iter_mut().enumerate() {
            for (j, cell) in row.iter_mut().take(n).enumerate() {
                *cell += powers[i + j];
            }
            row[n] += powers[i] * y;
        }
    }

    // Gauss-Jordan with partial pivoting.
    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&a, &b| m[a][col].abs().total_cmp(&m[b][col].abs()))
            .unwrap_or(col);
        if m[pivot][col].abs() < 1e-12 {
            eyre::bail!("polynomial fit is degenerate (not enough distinct x values)");
        }
        m.swap(col, pivot);
        let p = m[col][col];
        for cell in &mut m[col] {
            *cell /= p;
        }
        let pivot_row = m[col].clone();
        for (r, row) in m.iter_mut().enumerate() {
            let factor = row[col];
            if r == col || factor == 0.0 {
                continue;
            }
            for (cell, pv) in row.iter_mut().zip(&pivot_row).skip(col) {
                *cell -= factor * pv;
            }
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    let coeffs: Vec<f32> = m.iter().map(|row| row[n] as f32).collect();
    if coeffs.iter().any(|c| !c.is_finite()) {
        eyre::bail!("polynomial fit produced non-finite coefficients");
    }
    Ok(coeffs)
}

/// Velocity → duty model from sweep rows (speeds taken as magnitudes).
pub fn fit_velocity_to_duty(
    rows: &[CalibrationRow],
    side: Side,
    degree: usize,
) -> eyre::Result<Vec<f32>> {
    #[allow(clippy::cast_precision_loss)]
    let pts: Vec<(f32, f32)> = rows
        .iter()
        .filter(|r| r.velocity(side).abs() > MOTION_THRESHOLD)
        .map(|r| (r.velocity(side).abs(), r.duty as f32))
        .collect();
    fit_polynomial(&pts, degree)
}

/// Duty → velocity model from sweep rows.
pub fn fit_duty_to_velocity(
    rows: &[CalibrationRow],
    side: Side,
    degree: usize,
) -> eyre::Result<Vec<f32>> {
    #[allow(clippy::cast_precision_loss)]
    let pts: Vec<(f32, f32)> = rows
        .iter()
        .map(|r| (r.duty as f32, r.velocity(side).abs()))
        .collect();
    fit_polynomial(&pts, degree)
}

/// OLS slope and intercept in f64.
fn ols(pts: &[(f64, f64)]) -> eyre::Result<(f64, f64)> {
    if pts.len() < 2 {
        eyre::bail!("model fit requires at least two moving rows, got {}", pts.len());
    }
    #[allow(clippy::cast_precision_loss)]
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let mut sxx = 0.0f64;
    let mut sxy = 0.0f64;
    for (x, y) in pts {
        let dx = x - mean_x;
        sxx += dx * dx;
        sxy += dx * (y - mean_y);
    }
    if !sxx.is_finite() || sxx == 0.0 {
        eyre::bail!("model fit cannot determine slope (degenerate velocity variance)");
    }
    let slope = sxy / sxx;
    if !slope.is_finite() {
        eyre::bail!("model fit produced non-finite slope");
    }
    Ok((slope, mean_y - slope * mean_x))
}
