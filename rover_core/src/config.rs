//! Core-side configuration structs (plain data, no serde).
//!
//! The TOML schemas live in `rover_config`; `conversions` maps them here.

use std::time::Duration;

/// Encoder and wheel dimensions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geometry {
    /// Pulses per wheel revolution after quadrature multiplication.
    pub ppr: u32,
    pub wheel_diameter_cm: f32,
    /// Invert the decoded direction of the left encoder.
    pub left_reversed: bool,
    /// Invert the decoded direction of the right encoder.
    pub right_reversed: bool,
}

impl Default for Geometry {
    fn default() -> Self {
        Self {
            ppr: 960,
            wheel_diameter_cm: 5.0,
            left_reversed: false,
            right_reversed: true,
        }
    }
}

impl Geometry {
    /// Wheel circumference in cm.
    #[inline]
    pub fn circumference_cm(&self) -> f32 {
        std::f32::consts::PI * self.wheel_diameter_cm
    }

    /// Linear travel per encoder pulse in cm.
    #[inline]
    pub fn cm_per_pulse(&self) -> f32 {
        if self.ppr == 0 {
            return 0.0;
        }
        self.circumference_cm() / self.ppr as f32
    }
}

/// Control-loop timing knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timing {
    /// Continuously driven commands and the mode supervisor fall back to idle
    /// after this much silence.
    pub command_timeout: Duration,
    /// Odometer velocity window.
    pub sample_window: Duration,
    /// Minimum spacing between encoder telemetry snapshots.
    pub telemetry_interval: Duration,
    /// Pulse delta on either wheel that makes a snapshot worth sending.
    pub telemetry_count_threshold: u32,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            command_timeout: Duration::from_millis(500),
            sample_window: Duration::from_millis(100),
            telemetry_interval: Duration::from_millis(200),
            telemetry_count_threshold: 5,
        }
    }
}
