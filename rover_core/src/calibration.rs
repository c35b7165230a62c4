//! PWM sweep that records the wheel speed produced at each duty step.

use crate::drivetrain::Drivetrain;
use crate::error::StartError;
use crate::events::{CalibrationPoint, CoreEvent};
use crate::status::CommandStatus;
use crate::types::{MotorSelect, WheelPair};
use rover_traits::Wheel;
use std::time::{Duration, Instant};

/// Sweep bounds and pacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepConfig {
    pub motor: MotorSelect,
    pub start_duty: i32,
    pub end_duty: i32,
    pub step: i32,
    pub hold: Duration,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            motor: MotorSelect::Both,
            start_duty: 0,
            end_duty: 255,
            step: 10,
            hold: Duration::from_millis(1000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CalibrationSweep {
    cfg: SweepConfig,
    current: i32,
    step_started: Option<Instant>,
    points: u32,
}

impl CalibrationSweep {
    pub fn new(cfg: SweepConfig) -> Self {
        Self {
            cfg,
            current: cfg.start_duty,
            step_started: None,
            points: 0,
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.cfg
    }

    /// Duty currently being held.
    pub fn current_duty(&self) -> i32 {
        self.current
    }

    pub(crate) fn start(&mut self, dt: &mut Drivetrain, now: Instant) -> Result<(), StartError> {
        if self.cfg.step <= 0 {
            return Err(StartError::InvalidStep(self.cfg.step));
        }
        self.current = self.cfg.start_duty;
        self.points = 0;
        self.step_started = Some(now);
        tracing::info!(
            motor = %self.cfg.motor,
            start = self.cfg.start_duty,
            end = self.cfg.end_duty,
            step = self.cfg.step,
            hold_ms = u64::try_from(self.cfg.hold.as_millis()).unwrap_or(u64::MAX),
            "calibration sweep started"
        );
        self.apply(dt);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> CommandStatus {
        let Some(started) = self.step_started else {
            return CommandStatus::Finished;
        };
        if now.saturating_duration_since(started) < self.cfg.hold {
            return CommandStatus::Running;
        }

        let v = dt.measured_velocity().unwrap_or_default();
        events.push(CoreEvent::CalibrationPoint(CalibrationPoint {
            duty: self.current,
            left_velocity: v.left,
            right_velocity: v.right,
        }));
        events.push(CoreEvent::CalibrationProgress {
            current: self.current,
            start: self.cfg.start_duty,
            end: self.cfg.end_duty,
        });
        self.points += 1;

        self.current = self.current.saturating_add(self.cfg.step);
        if self.current > self.cfg.end_duty {
            dt.driver.stop();
            self.step_started = None;
            tracing::info!(points = self.points, "calibration sweep complete");
            events.push(CoreEvent::CalibrationComplete {
                points: self.points,
            });
            return CommandStatus::Finished;
        }
        self.apply(dt);
        self.step_started = Some(now);
        CommandStatus::Running
    }

    pub(crate) fn stop(&mut self, dt: &mut Drivetrain) {
        self.step_started = None;
        dt.driver.stop();
    }

    #[allow(clippy::cast_precision_loss)]
    fn apply(&self, dt: &mut Drivetrain) {
        let power = self.current as f32 / 255.0;
        let mut powers = WheelPair::<f32>::default();
        for wheel in Wheel::BOTH {
            if self.cfg.motor.drives(wheel) {
                powers[wheel] = power;
            }
        }
        dt.driver.set_powers(powers.left, powers.right);
    }
}
