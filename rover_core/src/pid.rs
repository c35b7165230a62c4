//! Per-wheel PID with clamped integral and output.

use std::time::{Duration, Instant};

pub const INTEGRAL_LIMIT: f32 = 100.0;
pub const OUTPUT_LIMIT: f32 = 100.0;
/// Steps longer than this are treated as a stall and skipped.
pub const MAX_STEP: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PidGains {
    pub kp: f32,
    pub ki: f32,
    pub kd: f32,
}

#[derive(Debug, Clone, Default)]
pub struct Pid {
    gains: PidGains,
    integral: f32,
    prev_error: f32,
    last_update: Option<Instant>,
}

impl Pid {
    pub fn new(gains: PidGains) -> Self {
        Self {
            gains,
            ..Self::default()
        }
    }

    pub fn set_gains(&mut self, gains: PidGains) {
        self.gains = gains;
    }

    pub fn gains(&self) -> PidGains {
        self.gains
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    pub fn reset(&mut self) {
        self.integral = 0.0;
        self.prev_error = 0.0;
        self.last_update = None;
    }

    /// One PID step toward `setpoint`.
    ///
    /// The first call after a reset, or a step whose elapsed time is zero,
    /// negative or longer than [`MAX_STEP`], only re-arms the timer and
    /// returns 0 without touching the integral.
    pub fn compute(&mut self, setpoint: f32, measured: f32, now: Instant) -> f32 {
        let error = setpoint - measured;
        let dt = self
            .last_update
            .and_then(|last| now.checked_duration_since(last))
            .filter(|dt| !dt.is_zero() && *dt <= MAX_STEP);
        let Some(dt) = dt else {
            self.last_update = Some(now);
            self.prev_error = error;
            return 0.0;
        };
        let dt = dt.as_secs_f32();

        self.integral = (self.integral + error * dt).clamp(-INTEGRAL_LIMIT, INTEGRAL_LIMIT);
        let derivative = (error - self.prev_error) / dt;
        let out = self.gains.kp * error + self.gains.ki * self.integral + self.gains.kd * derivative;

        self.prev_error = error;
        self.last_update = Some(now);
        if out.is_finite() {
            out.clamp(-OUTPUT_LIMIT, OUTPUT_LIMIT)
        } else {
            0.0
        }
    }
}
