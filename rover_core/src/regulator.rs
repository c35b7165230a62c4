//! Target velocity → duty cycle: feedforward or polynomial model, optionally
//! corrected by one PID loop per wheel.

use crate::actuation::ActuationDriver;
use crate::pid::{Pid, PidGains};
use crate::polynomial::Polynomial;
use crate::types::WheelPair;
use rover_traits::Wheel;
use std::time::Instant;

/// Targets slower than this (cm/s) are commanded as a full stop.
pub const MIN_TARGET: f32 = 0.5;
pub const FEEDFORWARD_GAIN_RANGE: (f32, f32) = (0.1, 10.0);
pub const DEADZONE_RANGE: (f32, f32) = (0.0, 100.0);
const DUTY_LIMIT: f32 = 255.0;

/// Regulator tuning. Every setter clamps or drops invalid input, so a value of
/// this type is always usable as-is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegulatorConfig {
    feedforward_gain: f32,
    deadzone: f32,
    polynomial_enabled: bool,
    vel_to_duty: Polynomial,
    duty_to_vel: Polynomial,
    pid_gains: PidGains,
    pid_enabled: bool,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            feedforward_gain: 3.0,
            deadzone: 60.0,
            polynomial_enabled: false,
            vel_to_duty: Polynomial::identity(),
            duty_to_vel: Polynomial::identity(),
            pid_gains: PidGains::default(),
            pid_enabled: false,
        }
    }
}

impl RegulatorConfig {
    pub fn feedforward_gain(&self) -> f32 {
        self.feedforward_gain
    }

    /// PWM per cm/s, clamped to [0.1, 10]. Non-finite input is dropped.
    pub fn set_feedforward_gain(&mut self, gain: f32) {
        if gain.is_finite() {
            self.feedforward_gain = gain.clamp(FEEDFORWARD_GAIN_RANGE.0, FEEDFORWARD_GAIN_RANGE.1);
        }
    }

    pub fn deadzone(&self) -> f32 {
        self.deadzone
    }

    /// Baseline duty, clamped to [0, 100]. Non-finite input is dropped.
    pub fn set_deadzone(&mut self, deadzone: f32) {
        if deadzone.is_finite() {
            self.deadzone = deadzone.clamp(DEADZONE_RANGE.0, DEADZONE_RANGE.1);
        }
    }

    pub fn polynomial_enabled(&self) -> bool {
        self.polynomial_enabled
    }

    pub fn set_polynomial_enabled(&mut self, on: bool) {
        self.polynomial_enabled = on;
    }

    pub fn vel_to_duty(&self) -> &Polynomial {
        &self.vel_to_duty
    }

    pub fn set_vel_to_duty(&mut self, degree: i32, coeffs: &[f32]) -> bool {
        self.vel_to_duty.set(degree, coeffs)
    }

    pub fn duty_to_vel(&self) -> &Polynomial {
        &self.duty_to_vel
    }

    pub fn set_duty_to_vel(&mut self, degree: i32, coeffs: &[f32]) -> bool {
        self.duty_to_vel.set(degree, coeffs)
    }

    pub fn pid_gains(&self) -> PidGains {
        self.pid_gains
    }

    /// Non-finite gains are dropped individually.
    pub fn set_pid_gains(&mut self, kp: f32, ki: f32, kd: f32) {
        let keep = |new: f32, old: f32| if new.is_finite() { new } else { old };
        self.pid_gains = PidGains {
            kp: keep(kp, self.pid_gains.kp),
            ki: keep(ki, self.pid_gains.ki),
            kd: keep(kd, self.pid_gains.kd),
        };
    }

    pub fn pid_enabled(&self) -> bool {
        self.pid_enabled
    }

    pub fn set_pid_enabled(&mut self, on: bool) {
        self.pid_enabled = on;
    }

    /// Open-loop duty magnitude (0..=255) for a speed in cm/s.
    pub fn open_loop_duty(&self, speed: f32) -> f32 {
        let speed = speed.abs();
        if !speed.is_finite() || speed < MIN_TARGET {
            return 0.0;
        }
        let duty = if self.polynomial_enabled {
            self.vel_to_duty.eval(speed)
        } else {
            self.deadzone + self.feedforward_gain * speed
        };
        if duty.is_finite() {
            duty.clamp(0.0, DUTY_LIMIT)
        } else {
            0.0
        }
    }
}

#[derive(Debug)]
pub struct VelocityRegulator {
    config: RegulatorConfig,
    targets: WheelPair<f32>,
    pid: WheelPair<Pid>,
    duty: WheelPair<f32>,
    velocity_error: WheelPair<f32>,
}

impl Default for VelocityRegulator {
    fn default() -> Self {
        Self::new(RegulatorConfig::default())
    }
}

impl VelocityRegulator {
    pub fn new(config: RegulatorConfig) -> Self {
        Self {
            config,
            targets: WheelPair::default(),
            pid: WheelPair::splat(Pid::new(config.pid_gains)),
            duty: WheelPair::default(),
            velocity_error: WheelPair::default(),
        }
    }

    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    /// Apply a new configuration wholesale. PID state is reset when the loop
    /// goes from disabled to enabled.
    pub fn apply_config(&mut self, config: RegulatorConfig) {
        let was_enabled = self.config.pid_enabled;
        self.config = config;
        self.pid.left.set_gains(config.pid_gains);
        self.pid.right.set_gains(config.pid_gains);
        if config.pid_enabled && !was_enabled {
            self.reset_pid();
        }
    }

    /// Edit the configuration in place with the same transition rules as
    /// [`apply_config`](Self::apply_config).
    pub fn tune(&mut self, f: impl FnOnce(&mut RegulatorConfig)) {
        let mut cfg = self.config;
        f(&mut cfg);
        self.apply_config(cfg);
    }

    pub fn set_targets(&mut self, left: f32, right: f32) {
        self.targets = WheelPair::new(left, right).map(crate::util::finite_or_zero);
    }

    pub fn targets(&self) -> WheelPair<f32> {
        self.targets
    }

    pub fn clear_targets(&mut self) {
        self.targets = WheelPair::default();
    }

    pub fn reset_pid(&mut self) {
        self.pid.left.reset();
        self.pid.right.reset();
    }

    /// Signed duty (-255..=255) computed by the last update.
    pub fn last_duty(&self) -> WheelPair<f32> {
        self.duty
    }

    /// `target - measured` from the last update that had measurements.
    pub fn velocity_error(&self) -> WheelPair<f32> {
        self.velocity_error
    }

    /// One control step. PID correction runs only when enabled and both
    /// wheel velocities are supplied.
    pub fn update(
        &mut self,
        driver: &mut ActuationDriver,
        measured: Option<WheelPair<f32>>,
        now: Instant,
    ) {
        let closed_loop = self.config.pid_enabled && measured.is_some();
        for wheel in Wheel::BOTH {
            let target = self.targets[wheel];
            let mut duty = self.config.open_loop_duty(target).copysign(target);
            if let Some(m) = measured {
                if closed_loop {
                    duty += self.pid[wheel].compute(target, m[wheel], now);
                }
                self.velocity_error[wheel] = target - m[wheel];
            }
            let duty = duty.clamp(-DUTY_LIMIT, DUTY_LIMIT);
            self.duty[wheel] = duty;
            driver.set_power(wheel, duty / DUTY_LIMIT);
        }
        tracing::trace!(
            left = self.duty.left,
            right = self.duty.right,
            closed_loop,
            "regulator step"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingBridge;
    use std::time::Duration;

    #[test]
    fn setters_clamp() {
        let mut c = RegulatorConfig::default();
        c.set_feedforward_gain(50.0);
        c.set_deadzone(-3.0);
        assert_eq!(c.feedforward_gain(), 10.0);
        assert_eq!(c.deadzone(), 0.0);
        c.set_feedforward_gain(f32::NAN);
        assert_eq!(c.feedforward_gain(), 10.0);
    }

    #[test]
    fn slow_targets_are_zero() {
        let c = RegulatorConfig::default();
        assert_eq!(c.open_loop_duty(0.4), 0.0);
        assert_eq!(c.open_loop_duty(-0.49), 0.0);
        assert_eq!(c.open_loop_duty(10.0), 90.0);
    }

    #[test]
    fn polynomial_mode_uses_model() {
        let mut c = RegulatorConfig::default();
        c.set_vel_to_duty(2, &[10.0, 2.0, 0.5]);
        c.set_polynomial_enabled(true);
        // 10 + 2*4 + 0.5*16
        assert!((c.open_loop_duty(-4.0) - 26.0).abs() < 1e-5);
    }

    #[test]
    fn saturates_at_full_duty() {
        let bridge = RecordingBridge::default();
        let mut drv = ActuationDriver::new(Box::new(bridge));
        let mut reg = VelocityRegulator::default();
        reg.set_targets(500.0, -500.0);
        reg.update(&mut drv, None, Instant::now());
        assert_eq!(drv.last_duty(), WheelPair::new(255, -255));
    }

    #[test]
    fn pid_skipped_without_measurements() {
        let mut drv = ActuationDriver::new(Box::new(RecordingBridge::default()));
        let mut reg = VelocityRegulator::default();
        reg.tune(|c| {
            c.set_pid_gains(5.0, 0.0, 0.0);
            c.set_pid_enabled(true);
        });
        reg.set_targets(20.0, 20.0);
        let t0 = Instant::now();
        reg.update(&mut drv, None, t0);
        reg.update(&mut drv, None, t0 + Duration::from_millis(10));
        assert_eq!(reg.last_duty(), WheelPair::splat(120.0));
    }

    #[test]
    fn pid_corrects_with_measurements() {
        let mut drv = ActuationDriver::new(Box::new(RecordingBridge::default()));
        let mut reg = VelocityRegulator::default();
        reg.tune(|c| {
            c.set_pid_gains(2.0, 0.0, 0.0);
            c.set_pid_enabled(true);
        });
        reg.set_targets(20.0, 20.0);
        let t0 = Instant::now();
        let m = Some(WheelPair::new(15.0, 25.0));
        reg.update(&mut drv, m, t0);
        reg.update(&mut drv, m, t0 + Duration::from_millis(10));
        assert_eq!(reg.last_duty(), WheelPair::new(130.0, 110.0));
        assert_eq!(reg.velocity_error(), WheelPair::new(5.0, -5.0));
    }
}
