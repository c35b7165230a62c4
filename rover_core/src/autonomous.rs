//! Scripted motion: a list of drive/turn/wait primitives run in order.
//!
//! Turns are open loop. Completion is estimated as `elapsed × angular
//! velocity`, there is no heading feedback.

use crate::drivetrain::Drivetrain;
use crate::error::StartError;
use crate::events::CoreEvent;
use crate::status::CommandStatus;
use std::time::{Duration, Instant};

pub const DEFAULT_TURN_RATE: f32 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    /// Travel `cm` (sign ignored) at `velocity` cm/s.
    DriveDistance { cm: f32, velocity: f32 },
    /// Turn in place; positive degrees turn right (left wheel forward).
    TurnAngle { degrees: f32, rate: f32 },
    DriveTime { velocity: f32, duration: Duration },
    Wait(Duration),
    Stop,
}

impl Action {
    pub fn drive(cm: f32, velocity: f32) -> Self {
        Self::DriveDistance { cm, velocity }
    }

    pub fn turn(degrees: f32) -> Self {
        Self::TurnAngle {
            degrees,
            rate: DEFAULT_TURN_RATE,
        }
    }

    pub fn wait_ms(ms: u64) -> Self {
        Self::Wait(Duration::from_millis(ms))
    }

    fn check(&self) -> Result<(), &'static str> {
        match *self {
            Action::DriveDistance { cm, velocity } => {
                if !cm.is_finite() || !velocity.is_finite() || velocity == 0.0 {
                    return Err("drive distance needs finite distance and nonzero velocity");
                }
            }
            Action::TurnAngle { degrees, rate } => {
                if !degrees.is_finite() || !rate.is_finite() || rate <= 0.0 {
                    return Err("turn needs finite angle and positive rate");
                }
            }
            Action::DriveTime { velocity, .. } => {
                if !velocity.is_finite() {
                    return Err("drive time needs finite velocity");
                }
            }
            Action::Wait(_) | Action::Stop => {}
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct AutonomousSequence {
    steps: Vec<Action>,
    cursor: usize,
    step_started: Option<Instant>,
    distance_origin: f32,
    active: bool,
    interruptible: bool,
}

impl AutonomousSequence {
    pub fn new(steps: Vec<Action>) -> Self {
        Self {
            steps,
            cursor: 0,
            step_started: None,
            distance_origin: 0.0,
            active: false,
            interruptible: true,
        }
    }

    /// A non-interruptible sequence can only end by itself or by `cancel`.
    pub fn with_interruptible(mut self, interruptible: bool) -> Self {
        self.interruptible = interruptible;
        self
    }

    /// Four sides of `side_cm` with right-angle turns, then stop.
    pub fn square(side_cm: f32) -> Self {
        let mut steps = Vec::with_capacity(17);
        for _ in 0..4 {
            steps.push(Action::drive(side_cm, 20.0));
            steps.push(Action::wait_ms(500));
            steps.push(Action::turn(90.0));
            steps.push(Action::wait_ms(500));
        }
        steps.push(Action::Stop);
        Self::new(steps)
    }

    pub fn figure_eight() -> Self {
        Self::new(vec![
            Action::drive(50.0, 20.0),
            Action::turn(180.0),
            Action::drive(50.0, 20.0),
            Action::turn(180.0),
            Action::turn(-180.0),
            Action::drive(50.0, 20.0),
            Action::turn(-180.0),
            Action::drive(50.0, 20.0),
            Action::Stop,
        ])
    }

    pub fn steps(&self) -> &[Action] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_interruptible(&self) -> bool {
        self.interruptible
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub(crate) fn start(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        _events: &mut Vec<CoreEvent>,
    ) -> Result<(), StartError> {
        if self.steps.is_empty() {
            return Err(StartError::EmptySequence);
        }
        for (index, step) in self.steps.iter().enumerate() {
            step.check()
                .map_err(|reason| StartError::InvalidAction { index, reason })?;
            if matches!(step, Action::DriveDistance { .. }) && !dt.has_odometry() {
                return Err(StartError::MissingOdometry);
            }
        }
        dt.regulator.reset_pid();
        self.cursor = 0;
        self.active = true;
        tracing::info!(steps = self.steps.len(), "autonomous sequence started");
        self.enter_step(dt, now);
        Ok(())
    }

    pub(crate) fn update(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> CommandStatus {
        let Some(action) = self.steps.get(self.cursor).copied().filter(|_| self.active) else {
            return CommandStatus::Finished;
        };
        dt.regulate(now);

        let elapsed = self
            .step_started
            .map_or(Duration::ZERO, |t| now.saturating_duration_since(t));
        let done = match action {
            Action::DriveDistance { cm, .. } => {
                let travelled = (dt.mean_distance_cm().unwrap_or(0.0) - self.distance_origin).abs();
                travelled >= cm.abs()
            }
            Action::TurnAngle { degrees, rate } => elapsed.as_secs_f32() * rate >= degrees.abs(),
            Action::DriveTime { duration, .. } | Action::Wait(duration) => elapsed >= duration,
            Action::Stop => true,
        };
        if !done {
            return CommandStatus::Running;
        }

        self.cursor += 1;
        let total = self.steps.len();
        events.push(CoreEvent::SequenceProgress {
            step: self.cursor,
            total,
        });
        if self.cursor >= total {
            self.active = false;
            dt.regulator.clear_targets();
            tracing::info!("autonomous sequence complete");
            events.push(CoreEvent::SequenceComplete { success: true });
            return CommandStatus::Finished;
        }
        self.enter_step(dt, now);
        CommandStatus::Running
    }

    /// Halt the wheels. Reports an unsuccessful completion only when the
    /// sequence was cut short.
    pub(crate) fn stop(&mut self, dt: &mut Drivetrain, events: &mut Vec<CoreEvent>) {
        dt.halt();
        if self.active {
            self.active = false;
            tracing::info!(step = self.cursor, "autonomous sequence stopped early");
            events.push(CoreEvent::SequenceComplete { success: false });
        }
    }

    fn enter_step(&mut self, dt: &mut Drivetrain, now: Instant) {
        let Some(action) = self.steps.get(self.cursor).copied() else {
            return;
        };
        self.step_started = Some(now);
        tracing::debug!(step = self.cursor, ?action, "sequence step");
        match action {
            Action::DriveDistance { velocity, .. } => {
                self.distance_origin = dt.mean_distance_cm().unwrap_or(0.0);
                dt.regulator.set_targets(velocity, velocity);
            }
            Action::TurnAngle { degrees, rate } => {
                let v = if degrees < 0.0 { -rate } else { rate };
                dt.regulator.set_targets(v, -v);
            }
            Action::DriveTime { velocity, .. } => dt.regulator.set_targets(velocity, velocity),
            Action::Wait(_) | Action::Stop => dt.regulator.clear_targets(),
        }
    }
}
