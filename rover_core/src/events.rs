//! Notices produced by the control loop for whoever serializes them.
//!
//! Components push into a caller-provided `Vec<CoreEvent>`; the owner drains
//! it once per tick.

use crate::supervisor::MotionMode;
use crate::telemetry::EncoderSnapshot;
use crate::types::{ClientId, WheelPair};

/// One calibration sample: duty held and the speeds it produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub duty: i32,
    pub left_velocity: f32,
    pub right_velocity: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CoreEvent {
    ControlChanged {
        previous: Option<ClientId>,
        owner: Option<ClientId>,
    },
    CommandAccepted {
        intent: &'static str,
    },
    CommandRejected {
        intent: &'static str,
        reason: String,
    },
    ModeChanged {
        from: MotionMode,
        to: MotionMode,
    },
    CalibrationPoint(CalibrationPoint),
    CalibrationProgress {
        current: i32,
        start: i32,
        end: i32,
    },
    CalibrationComplete {
        points: u32,
    },
    SequenceProgress {
        step: usize,
        total: usize,
    },
    SequenceComplete {
        success: bool,
    },
    TuningApplied,
    EncodersReset,
    /// Throttled encoder snapshot for both wheels.
    Encoders(WheelPair<EncoderSnapshot>),
}

impl CoreEvent {
    /// Stable snake_case tag used by serializers.
    pub fn name(&self) -> &'static str {
        match self {
            CoreEvent::ControlChanged { .. } => "control_changed",
            CoreEvent::CommandAccepted { .. } => "command_accepted",
            CoreEvent::CommandRejected { .. } => "command_rejected",
            CoreEvent::ModeChanged { .. } => "mode_changed",
            CoreEvent::CalibrationPoint(_) => "calibration_point",
            CoreEvent::CalibrationProgress { .. } => "calibration_progress",
            CoreEvent::CalibrationComplete { .. } => "calibration_complete",
            CoreEvent::SequenceProgress { .. } => "sequence_progress",
            CoreEvent::SequenceComplete { .. } => "sequence_complete",
            CoreEvent::TuningApplied => "tuning_applied",
            CoreEvent::EncodersReset => "encoders_reset",
            CoreEvent::Encoders(_) => "encoders",
        }
    }
}
