//! `From` implementations bridging `rover_config` types to `rover_core` types.

use std::time::Duration;

use crate::config::{Geometry, Timing};
use crate::regulator::RegulatorConfig;

// ── Tuning ───────────────────────────────────────────────────────────────────

fn degree_of(coeffs: &[f32]) -> Option<i32> {
    let last = coeffs.len().checked_sub(1)?;
    Some(i32::try_from(last).unwrap_or(i32::MAX))
}

/// Values outside the regulator's accepted ranges are clamped by its setters;
/// an empty coefficient list keeps the identity model.
impl From<&rover_config::TuningRecord> for RegulatorConfig {
    fn from(r: &rover_config::TuningRecord) -> Self {
        let mut c = Self::default();
        c.set_feedforward_gain(r.feedforward_gain);
        c.set_deadzone(r.deadzone_pwm);
        c.set_pid_gains(r.pid_kp, r.pid_ki, r.pid_kd);
        c.set_pid_enabled(r.pid_enabled);
        c.set_polynomial_enabled(r.polynomial_enabled);
        if let Some(d) = degree_of(&r.vel2pwm) {
            c.set_vel_to_duty(d, &r.vel2pwm);
        }
        if let Some(d) = degree_of(&r.pwm2vel) {
            c.set_duty_to_vel(d, &r.pwm2vel);
        }
        c
    }
}

impl From<&RegulatorConfig> for rover_config::TuningRecord {
    fn from(c: &RegulatorConfig) -> Self {
        let gains = c.pid_gains();
        Self {
            feedforward_gain: c.feedforward_gain(),
            deadzone_pwm: c.deadzone(),
            pid_enabled: c.pid_enabled(),
            pid_kp: gains.kp,
            pid_ki: gains.ki,
            pid_kd: gains.kd,
            polynomial_enabled: c.polynomial_enabled(),
            vel2pwm: c.vel_to_duty().coefficients().to_vec(),
            pwm2vel: c.duty_to_vel().coefficients().to_vec(),
        }
    }
}

// ── Geometry ─────────────────────────────────────────────────────────────────

impl From<&rover_config::GeometryCfg> for Geometry {
    fn from(g: &rover_config::GeometryCfg) -> Self {
        Self {
            ppr: g.ppr,
            wheel_diameter_cm: g.wheel_diameter_cm,
            left_reversed: g.left_reversed,
            right_reversed: g.right_reversed,
        }
    }
}

// ── Timing ───────────────────────────────────────────────────────────────────

impl From<&rover_config::ControlCfg> for Timing {
    fn from(c: &rover_config::ControlCfg) -> Self {
        Self {
            command_timeout: Duration::from_millis(c.command_timeout_ms),
            sample_window: Duration::from_millis(c.sample_window_ms),
            telemetry_interval: Duration::from_millis(c.telemetry_interval_ms),
            telemetry_count_threshold: c.telemetry_count_threshold,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuning_record_round_trips_through_regulator_config() {
        let rec = rover_config::TuningRecord {
            feedforward_gain: 2.5,
            deadzone_pwm: 40.0,
            pid_enabled: true,
            pid_kp: 1.0,
            pid_ki: 0.2,
            pid_kd: 0.0,
            polynomial_enabled: true,
            vel2pwm: vec![50.0, 2.0, 0.01],
            pwm2vel: vec![-10.0, 0.5],
        };
        let cfg = RegulatorConfig::from(&rec);
        assert_eq!(cfg.vel_to_duty().degree(), 2);
        assert!((cfg.open_loop_duty(10.0) - 71.0).abs() < 1e-3);
        let back = rover_config::TuningRecord::from(&cfg);
        assert_eq!(back, rec);
    }

    #[test]
    fn out_of_range_tuning_is_clamped() {
        let rec = rover_config::TuningRecord {
            feedforward_gain: 50.0,
            deadzone_pwm: 250.0,
            vel2pwm: Vec::new(),
            ..Default::default()
        };
        let cfg = RegulatorConfig::from(&rec);
        assert!((cfg.feedforward_gain() - 10.0).abs() < f32::EPSILON);
        assert!((cfg.deadzone() - 100.0).abs() < f32::EPSILON);
        assert_eq!(cfg.vel_to_duty().coefficients(), &[0.0, 1.0]);
    }

    #[test]
    fn control_cfg_maps_to_timing() {
        let t = Timing::from(&rover_config::ControlCfg::default());
        assert_eq!(t, Timing::default());
    }
}
