//! Coarse motion mode derived from the engine, with a generic keep-alive.

use crate::command::{CommandKind, INACTIVITY_TIMEOUT};
use crate::drivetrain::Drivetrain;
use crate::engine::CommandEngine;
use crate::events::CoreEvent;
use std::fmt;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionMode {
    #[default]
    Idle,
    Joystick,
    DirectMotor,
    Velocity,
    Calibration,
    Autonomous,
}

impl MotionMode {
    pub fn from_active(kind: Option<CommandKind>) -> Self {
        match kind {
            None => MotionMode::Idle,
            Some(CommandKind::Joystick) => MotionMode::Joystick,
            Some(CommandKind::DirectMotor) => MotionMode::DirectMotor,
            Some(CommandKind::Velocity) => MotionMode::Velocity,
            Some(CommandKind::Calibration) => MotionMode::Calibration,
            Some(CommandKind::Autonomous) => MotionMode::Autonomous,
        }
    }

    /// Modes whose own state machine decides when they end.
    pub fn is_self_terminating(self) -> bool {
        matches!(self, MotionMode::Calibration | MotionMode::Autonomous)
    }

    pub fn name(self) -> &'static str {
        match self {
            MotionMode::Idle => "IDLE",
            MotionMode::Joystick => "JOYSTICK",
            MotionMode::DirectMotor => "DIRECT_MOTOR",
            MotionMode::Velocity => "VELOCITY",
            MotionMode::Calibration => "CALIBRATION",
            MotionMode::Autonomous => "AUTONOMOUS",
        }
    }
}

impl fmt::Display for MotionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct MotionModeSupervisor {
    mode: MotionMode,
    last_command: Option<Instant>,
    timeout: Duration,
}

impl Default for MotionModeSupervisor {
    fn default() -> Self {
        Self::new(INACTIVITY_TIMEOUT)
    }
}

impl MotionModeSupervisor {
    pub fn new(timeout: Duration) -> Self {
        Self {
            mode: MotionMode::Idle,
            last_command: None,
            timeout,
        }
    }

    pub fn mode(&self) -> MotionMode {
        self.mode
    }

    pub fn last_command_time(&self) -> Option<Instant> {
        self.last_command
    }

    /// Record that a command of `kind` was issued or refreshed.
    pub fn note_command(&mut self, kind: CommandKind, now: Instant) {
        if kind != CommandKind::Calibration {
            self.last_command = Some(now);
        }
    }

    /// Re-derive the mode from the engine. Entering `Idle` zeroes the
    /// drivetrain. Returns true when the mode changed.
    pub fn sync(
        &mut self,
        engine: &CommandEngine,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> bool {
        let next = MotionMode::from_active(engine.active_kind());
        if next == self.mode {
            return false;
        }
        if next == MotionMode::Idle {
            dt.halt();
        }
        let from = std::mem::replace(&mut self.mode, next);
        self.last_command = Some(now);
        tracing::info!(%from, to = %next, "motion mode changed");
        events.push(CoreEvent::ModeChanged { from, to: next });
        true
    }

    pub fn timed_out(&self, now: Instant) -> bool {
        if self.mode == MotionMode::Idle || self.mode.is_self_terminating() {
            return false;
        }
        self.last_command
            .is_some_and(|t| now.saturating_duration_since(t) > self.timeout)
    }

    /// Force `Idle` when commands stopped arriving. Returns true if it fired.
    pub fn check_timeout(
        &mut self,
        engine: &mut CommandEngine,
        dt: &mut Drivetrain,
        now: Instant,
        events: &mut Vec<CoreEvent>,
    ) -> bool {
        if !self.timed_out(now) {
            return false;
        }
        tracing::info!(mode = %self.mode, "no commands received, reverting to idle");
        engine.cancel(dt, events);
        self.sync(engine, dt, now, events);
        true
    }
}
