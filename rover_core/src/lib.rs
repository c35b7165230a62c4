#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Motion-control core for a two-wheel teleoperated rover (hardware-agnostic).
//!
//! All hardware interaction goes through `rover_traits::MotorBridge` (outputs)
//! and `rover_traits::EdgeSink` (encoder interrupts in). Time comes from a
//! `rover_traits::Clock`, so every path is drivable from tests.
//!
//! ## Architecture
//!
//! - **Odometry**: lock-free quadrature counters fed from interrupt context,
//!   windowed velocity on the control thread (`odometer`)
//! - **Actuation**: signed power → direction + 8-bit duty, dead-band, joystick
//!   mixing (`actuation`)
//! - **Regulation**: feedforward or polynomial model plus optional per-wheel PID
//!   (`regulator`, `pid`, `polynomial`)
//! - **Ownership**: single-owner control token (`arbiter`)
//! - **Commands**: joystick, direct motor, velocity, calibration sweep and
//!   autonomous sequences with blocking/interruptible semantics (`command`,
//!   `calibration`, `autonomous`, `engine`)
//! - **Modes**: mode reporting and the keep-alive timeout (`supervisor`)
//! - **Context**: `RoverCore` ties it together behind `handle()` / `tick()`
//!
//! ## Units
//!
//! Velocities are cm/s, distances cm, duty is 0..=255 with a separate
//! direction, and normalized power is in [-1, 1].

// Module declarations
pub mod actuation;
pub mod arbiter;
pub mod autonomous;
pub mod builder;
pub mod calibration;
pub mod command;
pub mod config;
pub mod conversions;
pub mod drivetrain;
pub mod engine;
pub mod error;
pub mod events;
pub mod hw_error;
pub mod mocks;
pub mod odometer;
pub mod pid;
pub mod polynomial;
pub mod regulator;
pub mod rover;
pub mod status;
pub mod supervisor;
pub mod telemetry;
pub mod types;
pub mod util;

pub use crate::actuation::{ActuationDriver, DEAD_BAND, differential_mix, power_to_output};
pub use crate::arbiter::{ControlArbiter, OwnershipChange};
pub use crate::autonomous::{Action, AutonomousSequence};
pub use crate::builder::{Missing, RoverCoreBuilder, Set};
pub use crate::calibration::{CalibrationSweep, SweepConfig};
pub use crate::command::{Command, CommandKind};
pub use crate::config::{Geometry, Timing};
pub use crate::rover::{Intent, RoverCore};
pub use crate::drivetrain::Drivetrain;
pub use crate::engine::CommandEngine;
pub use crate::error::{
    BuildError, EngineError, IntentError, RegistryError, Result, RoverError, StartError,
};
pub use crate::events::{CalibrationPoint, CoreEvent};
pub use crate::odometer::{EdgeRegistry, Odometer, QuadratureCounter, WheelEdgeRegistry};
pub use crate::pid::{Pid, PidGains};
pub use crate::polynomial::Polynomial;
pub use crate::regulator::{RegulatorConfig, VelocityRegulator};
pub use crate::supervisor::{MotionMode, MotionModeSupervisor};
pub use crate::telemetry::{EncoderSnapshot, TelemetrySnapshot, TelemetryThrottle};
pub use crate::types::{ClientId, MotorSelect, WheelPair};
pub use rover_traits::{Clock, Direction, ManualClock, MonotonicClock, Phase, Wheel};
