//! `RoverCore`: the control-loop context that ties the components together.
//!
//! A transport hands it `(client, Intent)` pairs through [`RoverCore::handle`]
//! and calls [`RoverCore::tick`] once per loop pass. Everything the outside
//! world should hear about is queued as [`CoreEvent`]s and collected with
//! [`RoverCore::drain_events`].

use crate::arbiter::{ControlArbiter, OwnershipChange};
use crate::autonomous::AutonomousSequence;
use crate::calibration::{CalibrationSweep, SweepConfig};
use crate::command::{
    Command, CommandKind, DirectMotorCommand, JoystickCommand, VelocityCommand,
};
use crate::config::Timing;
use crate::drivetrain::Drivetrain;
use crate::engine::CommandEngine;
use crate::error::IntentError;
use crate::events::CoreEvent;
use crate::regulator::RegulatorConfig;
use crate::supervisor::{MotionMode, MotionModeSupervisor};
use crate::telemetry::{EncoderSnapshot, TelemetrySnapshot, TelemetryThrottle};
use crate::types::{ClientId, WheelPair};
use rover_traits::Clock;
use std::sync::Arc;
use std::time::Instant;

/// Parsed inbound request from a remote client.
#[derive(Debug, Clone)]
pub enum Intent {
    RequestControl,
    ReleaseControl,
    Disconnect,
    Joystick { x: f32, y: f32 },
    DirectMotor { left: f32, right: f32 },
    Velocity(f32),
    FeedforwardGain(f32),
    Deadzone(f32),
    PidGains { kp: f32, ki: f32, kd: f32 },
    PidEnable(bool),
    PolyVelToDuty { degree: i32, coeffs: Vec<f32> },
    PolyDutyToVel { degree: i32, coeffs: Vec<f32> },
    PolyEnable(bool),
    StartCalibration(SweepConfig),
    StopCalibration,
    StartAutonomous(AutonomousSequence),
    StopAutonomous,
    ResetEncoders,
}

impl Intent {
    pub fn name(&self) -> &'static str {
        match self {
            Intent::RequestControl => "REQUEST_CONTROL",
            Intent::ReleaseControl => "RELEASE_CONTROL",
            Intent::Disconnect => "DISCONNECT",
            Intent::Joystick { .. } => "JOYSTICK",
            Intent::DirectMotor { .. } => "MOTORS",
            Intent::Velocity(_) => "VELOCITY",
            Intent::FeedforwardGain(_) => "FF_GAIN",
            Intent::Deadzone(_) => "DEADZONE",
            Intent::PidGains { .. } => "PID_GAINS",
            Intent::PidEnable(_) => "PID_ENABLE",
            Intent::PolyVelToDuty { .. } => "POLY_VEL2PWM",
            Intent::PolyDutyToVel { .. } => "POLY_PWM2VEL",
            Intent::PolyEnable(_) => "POLY_ENABLE",
            Intent::StartCalibration(_) => "START_CALIBRATION",
            Intent::StopCalibration => "STOP_CALIBRATION",
            Intent::StartAutonomous(_) => "START_AUTONOMOUS",
            Intent::StopAutonomous => "STOP_AUTONOMOUS",
            Intent::ResetEncoders => "RESET",
        }
    }

    /// Everything except the ownership intents needs the control token.
    pub fn requires_control(&self) -> bool {
        !matches!(
            self,
            Intent::RequestControl | Intent::ReleaseControl | Intent::Disconnect
        )
    }
}

pub struct RoverCore {
    clock: Arc<dyn Clock>,
    arbiter: ControlArbiter,
    engine: CommandEngine,
    supervisor: MotionModeSupervisor,
    drivetrain: Drivetrain,
    timing: Timing,
    throttle: TelemetryThrottle,
    events: Vec<CoreEvent>,
}

impl std::fmt::Debug for RoverCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RoverCore")
            .field("mode", &self.supervisor.mode())
            .field("owner", &self.arbiter.owner())
            .field("active", &self.engine.active_kind())
            .field("queued_events", &self.events.len())
            .finish()
    }
}

impl RoverCore {
    pub(crate) fn from_parts(clock: Arc<dyn Clock>, drivetrain: Drivetrain, timing: Timing) -> Self {
        Self {
            clock,
            arbiter: ControlArbiter::new(),
            engine: CommandEngine::new(),
            supervisor: MotionModeSupervisor::new(timing.command_timeout),
            drivetrain,
            timing,
            throttle: TelemetryThrottle::new(
                timing.telemetry_interval,
                timing.telemetry_count_threshold,
            ),
            events: Vec::new(),
        }
    }

    pub fn mode(&self) -> MotionMode {
        self.supervisor.mode()
    }

    pub fn owner(&self) -> Option<ClientId> {
        self.arbiter.owner()
    }

    pub fn active_kind(&self) -> Option<CommandKind> {
        self.engine.active_kind()
    }

    pub fn drivetrain(&self) -> &Drivetrain {
        &self.drivetrain
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn tuning(&self) -> RegulatorConfig {
        *self.drivetrain.regulator.config()
    }

    /// Replace the regulator configuration wholesale (startup or reload).
    pub fn apply_tuning(&mut self, config: RegulatorConfig) {
        self.drivetrain.regulator.apply_config(config);
        self.events.push(CoreEvent::TuningApplied);
    }

    /// Transport accepted a new connection.
    pub fn on_connect(&mut self, client: ClientId) {
        if let Some(change) = self.arbiter.grant_to_first_if_unowned(client) {
            self.notify_ownership(change);
        }
    }

    /// Take every event queued since the last call.
    pub fn drain_events(&mut self) -> Vec<CoreEvent> {
        std::mem::take(&mut self.events)
    }

    /// Process one inbound intent from `client`.
    pub fn handle(&mut self, client: ClientId, intent: Intent) -> Result<(), IntentError> {
        let now = self.clock.now();
        let name = intent.name();
        if intent.requires_control() && !self.arbiter.has_control(client) {
            tracing::warn!(client = client.0, intent = name, "intent without control ignored");
            let err = IntentError::NotOwner(client.0);
            self.events.push(CoreEvent::CommandRejected {
                intent: name,
                reason: err.to_string(),
            });
            return Err(err);
        }

        let result = self.dispatch(client, intent, now);
        match &result {
            Ok(true) => self.events.push(CoreEvent::CommandAccepted { intent: name }),
            Ok(false) => {}
            Err(e) => self.events.push(CoreEvent::CommandRejected {
                intent: name,
                reason: e.to_string(),
            }),
        }
        self.supervisor
            .sync(&self.engine, &mut self.drivetrain, now, &mut self.events);
        result.map(|_| ())
    }

    /// Ok(true) when the intent should be acknowledged, Ok(false) for silent
    /// refreshes and ownership changes (which have their own notice).
    fn dispatch(&mut self, client: ClientId, intent: Intent, now: Instant) -> Result<bool, IntentError> {
        let timeout = self.timing.command_timeout;
        match intent {
            Intent::RequestControl => {
                let change = self.arbiter.request(client);
                self.notify_ownership(change);
                Ok(false)
            }
            Intent::ReleaseControl => {
                if let Some(change) = self.arbiter.release(client) {
                    self.notify_ownership(change);
                }
                Ok(false)
            }
            Intent::Disconnect => {
                if let Some(change) = self.arbiter.on_disconnect(client) {
                    self.notify_ownership(change);
                }
                Ok(false)
            }
            Intent::Joystick { x, y } => {
                self.supervisor.note_command(CommandKind::Joystick, now);
                if let Some(Command::Joystick(c)) = self.engine.active_mut() {
                    c.refresh(x, y, now);
                    return Ok(false);
                }
                let cmd = Command::Joystick(JoystickCommand::new(x, y).with_timeout(timeout));
                self.start(cmd, now)
            }
            Intent::DirectMotor { left, right } => {
                self.supervisor.note_command(CommandKind::DirectMotor, now);
                if let Some(Command::DirectMotor(c)) = self.engine.active_mut() {
                    c.refresh(left, right, now);
                    return Ok(false);
                }
                let cmd = Command::DirectMotor(DirectMotorCommand::new(left, right).with_timeout(timeout));
                self.start(cmd, now)
            }
            Intent::Velocity(v) => {
                self.supervisor.note_command(CommandKind::Velocity, now);
                if let Some(Command::Velocity(c)) = self.engine.active_mut() {
                    c.refresh(v, &mut self.drivetrain, now);
                    return Ok(true);
                }
                let cmd = Command::Velocity(VelocityCommand::new(v).with_timeout(timeout));
                self.start(cmd, now)
            }
            Intent::FeedforwardGain(g) => self.tune(|c| c.set_feedforward_gain(g)),
            Intent::Deadzone(d) => self.tune(|c| c.set_deadzone(d)),
            Intent::PidGains { kp, ki, kd } => self.tune(|c| c.set_pid_gains(kp, ki, kd)),
            Intent::PidEnable(on) => self.tune(|c| c.set_pid_enabled(on)),
            Intent::PolyVelToDuty { degree, coeffs } => {
                self.tune(|c| {
                    if !c.set_vel_to_duty(degree, &coeffs) {
                        tracing::warn!(degree, "velocity-to-duty model ignored");
                    }
                })
            }
            Intent::PolyDutyToVel { degree, coeffs } => {
                self.tune(|c| {
                    if !c.set_duty_to_vel(degree, &coeffs) {
                        tracing::warn!(degree, "duty-to-velocity model ignored");
                    }
                })
            }
            Intent::PolyEnable(on) => self.tune(|c| c.set_polynomial_enabled(on)),
            Intent::StartCalibration(cfg) => {
                self.start(Command::Calibration(CalibrationSweep::new(cfg)), now)
            }
            Intent::StopCalibration => self.stop_kind(CommandKind::Calibration),
            Intent::StartAutonomous(seq) => {
                self.supervisor.note_command(CommandKind::Autonomous, now);
                self.start(Command::Autonomous(seq), now)
            }
            Intent::StopAutonomous => self.stop_kind(CommandKind::Autonomous),
            Intent::ResetEncoders => {
                self.drivetrain.reset_encoders(now);
                self.throttle.reset();
                tracing::info!("encoders reset");
                self.events.push(CoreEvent::EncodersReset);
                Ok(true)
            }
        }
    }

    fn start(&mut self, cmd: Command, now: Instant) -> Result<bool, IntentError> {
        self.engine
            .execute(cmd, &mut self.drivetrain, now, &mut self.events)?;
        Ok(true)
    }

    fn stop_kind(&mut self, kind: CommandKind) -> Result<bool, IntentError> {
        if self.engine.active_kind() != Some(kind) {
            return Err(IntentError::NotActive(kind));
        }
        self.engine.cancel(&mut self.drivetrain, &mut self.events);
        Ok(true)
    }

    fn tune(&mut self, f: impl FnOnce(&mut RegulatorConfig)) -> Result<bool, IntentError> {
        self.drivetrain.regulator.tune(f);
        self.events.push(CoreEvent::TuningApplied);
        Ok(true)
    }

    fn notify_ownership(&mut self, change: OwnershipChange) {
        self.events.push(CoreEvent::ControlChanged {
            previous: change.previous,
            owner: change.owner,
        });
    }

    /// One control-loop pass: sample odometry, enforce the keep-alive, step
    /// the active command, and queue a throttled encoder snapshot.
    pub fn tick(&mut self) {
        let now = self.clock.now();
        self.drivetrain.tick_odometers(now);
        self.supervisor.check_timeout(
            &mut self.engine,
            &mut self.drivetrain,
            now,
            &mut self.events,
        );
        self.engine
            .tick(&mut self.drivetrain, now, &mut self.events);
        self.supervisor
            .sync(&self.engine, &mut self.drivetrain, now, &mut self.events);

        if let Some(snap) = self.encoder_snapshot() {
            if self.throttle.admit(now, snap.map(|s| s.count)) {
                self.events.push(CoreEvent::Encoders(snap));
            }
        }
        if let Some(fault) = self.drivetrain.driver.take_fault() {
            tracing::debug!(error = %fault, "bridge fault this tick");
        }
    }

    /// Stop everything regardless of ownership (shutdown path).
    pub fn halt(&mut self) {
        let now = self.clock.now();
        self.engine.cancel(&mut self.drivetrain, &mut self.events);
        self.drivetrain.halt();
        self.supervisor
            .sync(&self.engine, &mut self.drivetrain, now, &mut self.events);
    }

    pub fn encoder_snapshot(&self) -> Option<WheelPair<EncoderSnapshot>> {
        self.drivetrain
            .odometers()
            .map(|o| WheelPair::new(EncoderSnapshot::from(&o.left), EncoderSnapshot::from(&o.right)))
    }

    pub fn telemetry(&self) -> TelemetrySnapshot {
        let regulator = &self.drivetrain.regulator;
        TelemetrySnapshot {
            mode: self.supervisor.mode(),
            owner: self.arbiter.owner(),
            encoders: self.encoder_snapshot(),
            duty: self.drivetrain.driver.last_duty(),
            targets: regulator.targets(),
            velocity_error: regulator.velocity_error(),
            pid_enabled: regulator.config().pid_enabled(),
        }
    }
}
