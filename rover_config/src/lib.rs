#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas and calibration data handling for the rover.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `TuningRecord` is the flat, persisted regulator tuning; `TuningPatch`
//!   merges a partial update into it.
//! - `calibration` reads/writes sweep CSVs and fits feedforward or
//!   polynomial models from them.
use serde::Deserialize;

pub mod calibration;
pub mod tuning;

pub use calibration::{
    CalibrationRow, FeedforwardFit, Side, fit_duty_to_velocity, fit_feedforward,
    fit_polynomial, fit_velocity_to_duty, load_calibration_csv, write_calibration_csv,
};
pub use tuning::{MAX_COEFFICIENTS, TuningPatch, TuningRecord};

/// GPIO assignment for the L298N bridge and the two encoders (BCM numbering).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Pins {
    pub left_pwm: u8,
    pub left_in_a: u8,
    pub left_in_b: u8,
    pub right_pwm: u8,
    pub right_in_a: u8,
    pub right_in_b: u8,
    pub left_enc_a: u8,
    pub left_enc_b: u8,
    pub right_enc_a: u8,
    pub right_enc_b: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            left_pwm: 13,
            left_in_a: 5,
            left_in_b: 6,
            right_pwm: 12,
            right_in_a: 20,
            right_in_b: 21,
            left_enc_a: 17,
            left_enc_b: 27,
            right_enc_a: 22,
            right_enc_b: 23,
        }
    }
}

impl Pins {
    fn all(&self) -> [u8; 10] {
        [
            self.left_pwm,
            self.left_in_a,
            self.left_in_b,
            self.right_pwm,
            self.right_in_a,
            self.right_in_b,
            self.left_enc_a,
            self.left_enc_b,
            self.right_enc_a,
            self.right_enc_b,
        ]
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct GeometryCfg {
    /// Encoder counts per wheel revolution (after x4 decoding).
    pub ppr: u32,
    pub wheel_diameter_cm: f32,
    pub left_reversed: bool,
    pub right_reversed: bool,
}

impl Default for GeometryCfg {
    fn default() -> Self {
        Self {
            ppr: 960,
            wheel_diameter_cm: 5.0,
            left_reversed: false,
            right_reversed: true,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct ControlCfg {
    /// Control loop period.
    pub tick_ms: u64,
    /// Continuously driven commands revert to idle after this much silence.
    pub command_timeout_ms: u64,
    /// Odometer velocity window.
    pub sample_window_ms: u64,
    pub telemetry_interval_ms: u64,
    /// Minimum pulse change on either wheel before a snapshot is published.
    pub telemetry_count_threshold: u32,
}

impl Default for ControlCfg {
    fn default() -> Self {
        Self {
            tick_ms: 10,
            command_timeout_ms: 500,
            sample_window_ms: 100,
            telemetry_interval_ms: 200,
            telemetry_count_threshold: 5,
        }
    }
}

/// Simulated plant parameters (used when no hardware backend is compiled in).
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(default)]
pub struct SimCfg {
    /// Duty below which the simulated wheel does not turn.
    pub deadzone_duty: f32,
    /// Steady-state cm/s per duty step above the dead-zone.
    pub cm_s_per_duty: f32,
    /// First-order response time constant.
    pub time_constant_ms: u64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            deadzone_duty: 55.0,
            cm_s_per_duty: 0.35,
            time_constant_ms: 80,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub pins: Pins,
    pub geometry: GeometryCfg,
    pub control: ControlCfg,
    pub tuning: TuningRecord,
    pub sim: SimCfg,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Geometry
        if self.geometry.ppr == 0 {
            eyre::bail!("geometry.ppr must be > 0");
        }
        if !(self.geometry.wheel_diameter_cm.is_finite() && self.geometry.wheel_diameter_cm > 0.0) {
            eyre::bail!("geometry.wheel_diameter_cm must be > 0");
        }

        // Control timing
        if self.control.tick_ms == 0 {
            eyre::bail!("control.tick_ms must be > 0");
        }
        if self.control.sample_window_ms == 0 {
            eyre::bail!("control.sample_window_ms must be > 0");
        }
        if self.control.sample_window_ms < self.control.tick_ms {
            eyre::bail!("control.sample_window_ms must be >= control.tick_ms");
        }
        if self.control.command_timeout_ms <= self.control.tick_ms {
            eyre::bail!("control.command_timeout_ms must be greater than control.tick_ms");
        }

        // Tuning
        self.tuning.validate()?;

        // Simulation
        if !(self.sim.cm_s_per_duty.is_finite() && self.sim.cm_s_per_duty > 0.0) {
            eyre::bail!("sim.cm_s_per_duty must be > 0");
        }
        if !(self.sim.deadzone_duty.is_finite() && (0.0..255.0).contains(&self.sim.deadzone_duty)) {
            eyre::bail!("sim.deadzone_duty must be in [0, 255)");
        }

        // Pins must be distinct
        let pins = self.pins.all();
        for (i, a) in pins.iter().enumerate() {
            if pins[i + 1..].contains(a) {
                eyre::bail!("pins: GPIO {a} is assigned more than once");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref() {
            if !matches!(rot, "never" | "daily" | "hourly") {
                eyre::bail!("logging.rotation must be one of never|daily|hourly");
            }
        }
        Ok(())
    }
}
