//! The persisted tuning record and partial updates to it.

use serde::{Deserialize, Serialize};

/// Maximum number of polynomial coefficients (degree 5).
pub const MAX_COEFFICIENTS: usize = 6;

/// Flat record of regulator tuning values.
///
/// Every field has a default, so a file with any subset of keys loads.
///
/// ```toml
/// feedforward_gain = 3.0
/// deadzone_pwm = 60.0
/// pid_enabled = false
/// pid_kp = 0.0
/// pid_ki = 0.0
/// pid_kd = 0.0
/// polynomial_enabled = false
/// vel2pwm = [0.0, 1.0, 0.0, 0.0]
/// pwm2vel = [0.0, 1.0, 0.0, 0.0]
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningRecord {
    #[serde(alias = "feedforwardGain")]
    pub feedforward_gain: f32,
    #[serde(alias = "deadzonePWM")]
    pub deadzone_pwm: f32,
    #[serde(alias = "pidEnabled")]
    pub pid_enabled: bool,
    #[serde(alias = "pidKp")]
    pub pid_kp: f32,
    #[serde(alias = "pidKi")]
    pub pid_ki: f32,
    #[serde(alias = "pidKd")]
    pub pid_kd: f32,
    #[serde(alias = "polynomialEnabled")]
    pub polynomial_enabled: bool,
    /// Velocity → duty model, ascending powers.
    pub vel2pwm: Vec<f32>,
    /// Duty → velocity model, ascending powers.
    pub pwm2vel: Vec<f32>,
}

impl Default for TuningRecord {
    fn default() -> Self {
        Self {
            feedforward_gain: 3.0,
            deadzone_pwm: 60.0,
            pid_enabled: false,
            pid_kp: 0.0,
            pid_ki: 0.0,
            pid_kd: 0.0,
            polynomial_enabled: false,
            vel2pwm: vec![0.0, 1.0, 0.0, 0.0],
            pwm2vel: vec![0.0, 1.0, 0.0, 0.0],
        }
    }
}

impl TuningRecord {
    pub fn load_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn to_toml(&self) -> eyre::Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre::eyre!("serialize tuning record: {e}"))
    }

    pub fn load_file(path: &std::path::Path) -> eyre::Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| eyre::eyre!("read tuning file {:?}: {}", path, e))?;
        let rec = Self::load_toml(&text)
            .map_err(|e| eyre::eyre!("parse tuning file {:?}: {}", path, e))?;
        rec.validate()?;
        Ok(rec)
    }

    pub fn save_file(&self, path: &std::path::Path) -> eyre::Result<()> {
        let text = self.to_toml()?;
        std::fs::write(path, text).map_err(|e| eyre::eyre!("write tuning file {:?}: {}", path, e))
    }

    /// Restore every field to its default.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn validate(&self) -> eyre::Result<()> {
        let finite = [
            ("feedforward_gain", self.feedforward_gain),
            ("deadzone_pwm", self.deadzone_pwm),
            ("pid_kp", self.pid_kp),
            ("pid_ki", self.pid_ki),
            ("pid_kd", self.pid_kd),
        ];
        for (name, v) in finite {
            if !v.is_finite() {
                eyre::bail!("tuning.{name} must be finite");
            }
        }
        if self.feedforward_gain <= 0.0 {
            eyre::bail!("tuning.feedforward_gain must be > 0");
        }
        if self.deadzone_pwm < 0.0 {
            eyre::bail!("tuning.deadzone_pwm must be >= 0");
        }
        for (name, coeffs) in [("vel2pwm", &self.vel2pwm), ("pwm2vel", &self.pwm2vel)] {
            if coeffs.len() > MAX_COEFFICIENTS {
                eyre::bail!(
                    "tuning.{name} supports at most {MAX_COEFFICIENTS} coefficients, got {}",
                    coeffs.len()
                );
            }
            if coeffs.iter().any(|c| !c.is_finite()) {
                eyre::bail!("tuning.{name} coefficients must be finite");
            }
        }
        Ok(())
    }
}

/// Partial update: only the fields that are present are applied.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TuningPatch {
    #[serde(alias = "feedforwardGain")]
    pub feedforward_gain: Option<f32>,
    #[serde(alias = "deadzonePWM")]
    pub deadzone_pwm: Option<f32>,
    #[serde(alias = "pidEnabled")]
    pub pid_enabled: Option<bool>,
    #[serde(alias = "pidKp")]
    pub pid_kp: Option<f32>,
    #[serde(alias = "pidKi")]
    pub pid_ki: Option<f32>,
    #[serde(alias = "pidKd")]
    pub pid_kd: Option<f32>,
    #[serde(alias = "polynomialEnabled")]
    pub polynomial_enabled: Option<bool>,
    pub vel2pwm: Option<Vec<f32>>,
    pub pwm2vel: Option<Vec<f32>>,
}

impl TuningPatch {
    pub fn load_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge into `rec`; the result is validated before it replaces `rec`.
    pub fn apply(&self, rec: &mut TuningRecord) -> eyre::Result<()> {
        let mut next = rec.clone();
        if let Some(v) = self.feedforward_gain {
            next.feedforward_gain = v;
        }
        if let Some(v) = self.deadzone_pwm {
            next.deadzone_pwm = v;
        }
        if let Some(v) = self.pid_enabled {
            next.pid_enabled = v;
        }
        if let Some(v) = self.pid_kp {
            next.pid_kp = v;
        }
        if let Some(v) = self.pid_ki {
            next.pid_ki = v;
        }
        if let Some(v) = self.pid_kd {
            next.pid_kd = v;
        }
        if let Some(v) = self.polynomial_enabled {
            next.polynomial_enabled = v;
        }
        if let Some(v) = &self.vel2pwm {
            next.vel2pwm.clone_from(v);
        }
        if let Some(v) = &self.pwm2vel {
            next.pwm2vel.clone_from(v);
        }
        next.validate()?;
        *rec = next;
        Ok(())
    }
}
