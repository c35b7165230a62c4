//! Units of control the engine can run.
//!
//! `Command` is a closed sum type: refreshing a running joystick or velocity
//! command is a pattern match on the active variant, never a cast.

use crate::autonomous::AutonomousSequence;
use crate::calibration::CalibrationSweep;
use crate::drivetrain::Drivetrain;
use crate::error::StartError;
use crate::events::CoreEvent;
use crate::status::CommandStatus;
use crate::util::finite_or_zero;
use std::fmt;
use std::time::{Duration, Instant};

/// Silence after which a continuously driven command ends itself.
pub const INACTIVITY_TIMEOUT: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Joystick,
    DirectMotor,
    Velocity,
    Calibration,
    Autonomous,
}

impl CommandKind {
    /// Blocking kinds hold the engine until they finish or are cancelled.
    pub fn is_blocking(self) -> bool {
        matches!(self, CommandKind::Calibration | CommandKind::Autonomous)
    }

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Joystick => "Joystick",
            CommandKind::DirectMotor => "DirectMotor",
            CommandKind::Velocity => "Velocity",
            CommandKind::Calibration => "Calibration",
            CommandKind::Autonomous => "AutonomousSequence",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Keep-alive bookkeeping shared by the teleoperation commands.
#[derive(Debug, Clone, Copy)]
struct Freshness {
    last_update: Option<Instant>,
    timeout: Duration,
}

impl Freshness {
    fn new() -> Self {
        Self {
            last_update: None,
            timeout: INACTIVITY_TIMEOUT,
        }
    }

    fn touch(&mut self, now: Instant) {
        self.last_update = Some(now);
    }

    fn expired(&self, now: Instant) -> bool {
        self.last_update
            .is_some_and(|t| now.saturating_duration_since(t) > self.timeout)
    }
}

/// Joystick teleoperation: `y` is throttle, `x` is steering.
#[derive(Debug, Clone, Copy)]
pub struct JoystickCommand {
    x: f32,
    y: f32,
    fresh: Freshness,
}

impl JoystickCommand {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            x: finite_or_zero(x),
            y: finite_or_zero(y),
            fresh: Freshness::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fresh.timeout = timeout;
        self
    }

    pub fn refresh(&mut self, x: f32, y: f32, now: Instant) {
        self.x = finite_or_zero(x);
        self.y = finite_or_zero(y);
        self.fresh.touch(now);
    }

    pub fn axes(&self) -> (f32, f32) {
        (self.x, self.y)
    }
}

/// Raw per-wheel power.
#[derive(Debug, Clone, Copy)]
pub struct DirectMotorCommand {
    left: f32,
    right: f32,
    fresh: Freshness,
}

impl DirectMotorCommand {
    pub fn new(left: f32, right: f32) -> Self {
        Self {
            left,
            right,
            fresh: Freshness::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fresh.timeout = timeout;
        self
    }

    pub fn refresh(&mut self, left: f32, right: f32, now: Instant) {
        self.left = left;
        self.right = right;
        self.fresh.touch(now);
    }

    pub fn powers(&self) -> (f32, f32) {
        (self.left, self.right)
    }
}

/// Closed-loop straight-line velocity, same target on both wheels.
#[derive(Debug, Clone, Copy)]
pub struct VelocityCommand {
    target: f32,
    fresh: Freshness,
}

impl VelocityCommand {
    pub fn new(target: f32) -> Self {
        Self {
            target: finite_or_zero(target),
            fresh: Freshness::new(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.fresh.timeout = timeout;
        self
    }

    pub fn refresh(&mut self, target: f32, dt: &mut Drivetrain, now: Instant) {
        self.target = finite_or_zero(target);
        dt.regulator.set_targets(self.target, self.target);
        self.fresh.touch(now);
    }

    pub fn target(&self) -> f32 {
        self.target
    }
}

#[derive(Debug, Clone)]
pub enum Command {
    Joystick(JoystickCommand),
    DirectMotor(DirectMotorCommand),
    Velocity(VelocityCommand),
    Calibration(CalibrationSweep),
    Autonomous(AutonomousSequence),
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Joystick(_) => CommandKind::Joystick,
            Command::DirectMotor(_) => CommandKind::DirectMotor,
            Command::Velocity(_) => CommandKind::Velocity,
            Command::Calibration(_) => CommandKind::Calibration,
            Command::Autonomous(_) => CommandKind::Autonomous,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.kind().is_blocking()
    }

    pub fn is_interruptible(&self) -> bool {
        match self {
            Command::Autonomous(seq) => seq.is_interruptible(),
            _ => true,
        }
    }

    pub fn start(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> Result<(), StartError> {
        match self {
            Command::Joystick(c) => {
                c.fresh.touch(now);
                dt.driver.drive_mixed(c.y, c.x);
            }
            Command::DirectMotor(c) => {
                c.fresh.touch(now);
                dt.driver.set_powers(c.left, c.right);
            }
            Command::Velocity(c) => {
                dt.regulator.reset_pid();
                c.refresh(c.target, dt, now);
            }
            Command::Calibration(c) => c.start(dt, now)?,
            Command::Autonomous(c) => c.start(dt, now, events)?,
        }
        Ok(())
    }

    pub fn update(
        &mut self,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> CommandStatus {
        match self {
            Command::Joystick(c) => {
                if c.fresh.expired(now) {
                    tracing::debug!("joystick input timed out");
                    return CommandStatus::Finished;
                }
                dt.driver.drive_mixed(c.y, c.x);
            }
            Command::DirectMotor(c) => {
                if c.fresh.expired(now) {
                    tracing::debug!("direct motor input timed out");
                    return CommandStatus::Finished;
                }
                dt.driver.set_powers(c.left, c.right);
            }
            Command::Velocity(c) => {
                if c.fresh.expired(now) {
                    tracing::debug!(target = c.target, "velocity input timed out");
                    return CommandStatus::Finished;
                }
                dt.regulate(now);
            }
            Command::Calibration(c) => return c.update(dt, now, events),
            Command::Autonomous(c) => return c.update(dt, now, events),
        }
        CommandStatus::Running
    }

    pub fn stop(&mut self, dt: &mut Drivetrain, events: &mut Vec<CoreEvent>) {
        match self {
            Command::Joystick(_) | Command::DirectMotor(_) => dt.driver.stop(),
            Command::Velocity(_) => dt.halt(),
            Command::Calibration(c) => c.stop(dt),
            Command::Autonomous(c) => c.stop(dt, events),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuation::ActuationDriver;
    use crate::mocks::RecordingBridge;
    use crate::regulator::VelocityRegulator;
    use crate::types::WheelPair;

    fn drivetrain() -> Drivetrain {
        Drivetrain::new(
            ActuationDriver::new(Box::new(RecordingBridge::default())),
            VelocityRegulator::default(),
        )
    }

    #[test]
    fn joystick_mixes_and_times_out() {
        let mut dt = drivetrain();
        let mut ev = Vec::new();
        let t0 = Instant::now();
        let mut cmd = Command::Joystick(JoystickCommand::new(0.5, 1.0));
        cmd.start(&mut dt, t0, &mut ev).unwrap();
        // left = 1.5, right = 0.5, normalized by 1.5
        assert_eq!(dt.driver.last_duty(), WheelPair::new(255, 85));
        let t = t0 + Duration::from_millis(500);
        assert_eq!(cmd.update(&mut dt, t, &mut ev), CommandStatus::Running);
        let t = t0 + Duration::from_millis(501);
        assert_eq!(cmd.update(&mut dt, t, &mut ev), CommandStatus::Finished);
    }

    #[test]
    fn refresh_extends_lifetime() {
        let mut dt = drivetrain();
        let mut ev = Vec::new();
        let t0 = Instant::now();
        let mut cmd = Command::DirectMotor(DirectMotorCommand::new(0.3, -0.3));
        cmd.start(&mut dt, t0, &mut ev).unwrap();
        if let Command::DirectMotor(c) = &mut cmd {
            c.refresh(0.6, 0.6, t0 + Duration::from_millis(400));
        }
        let t = t0 + Duration::from_millis(800);
        assert!(cmd.update(&mut dt, t, &mut ev).is_running());
        assert_eq!(dt.driver.last_duty(), WheelPair::splat(153));
    }

    #[test]
    fn velocity_stop_clears_targets() {
        let mut dt = drivetrain();
        let mut ev = Vec::new();
        let t0 = Instant::now();
        let mut cmd = Command::Velocity(VelocityCommand::new(20.0));
        cmd.start(&mut dt, t0, &mut ev).unwrap();
        assert!(cmd.update(&mut dt, t0, &mut ev).is_running());
        assert_eq!(dt.driver.last_duty(), WheelPair::splat(120));
        cmd.stop(&mut dt, &mut ev);
        assert_eq!(dt.regulator.targets(), WheelPair::default());
        assert!(dt.driver.is_stopped());
    }
}
