//! Type-state builder for `RoverCore`.
//!
//! `build()` only exists once a motor bridge is supplied; `try_build()` is
//! always available and reports what is missing at runtime.

use std::marker::PhantomData;
use std::sync::Arc;

use rover_traits::{Clock, MonotonicClock, MotorBridge, Wheel};

use crate::actuation::ActuationDriver;
use crate::config::{Geometry, Timing};
use crate::rover::RoverCore;
use crate::drivetrain::Drivetrain;
use crate::error::{BuildError, Result};
use crate::odometer::{Odometer, QuadratureCounter, WheelEdgeRegistry};
use crate::regulator::{RegulatorConfig, VelocityRegulator};
use crate::types::WheelPair;

#[derive(Debug, Default)]
pub struct Missing;
#[derive(Debug, Default)]
pub struct Set;

pub struct RoverCoreBuilder<B = Missing> {
    bridge: Option<Box<dyn MotorBridge + Send>>,
    clock: Option<Arc<dyn Clock>>,
    geometry: Geometry,
    timing: Timing,
    tuning: RegulatorConfig,
    counters: Option<WheelPair<Arc<QuadratureCounter>>>,
    _b: PhantomData<B>,
}

impl Default for RoverCoreBuilder<Missing> {
    fn default() -> Self {
        Self {
            bridge: None,
            clock: None,
            geometry: Geometry::default(),
            timing: Timing::default(),
            tuning: RegulatorConfig::default(),
            counters: None,
            _b: PhantomData,
        }
    }
}

impl RoverCore {
    pub fn builder() -> RoverCoreBuilder<Missing> {
        RoverCoreBuilder::default()
    }
}

impl<B> RoverCoreBuilder<B> {
    /// Defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_geometry(mut self, geometry: Geometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = timing;
        self
    }

    pub fn with_tuning(mut self, tuning: RegulatorConfig) -> Self {
        self.tuning = tuning;
        self
    }

    /// Use existing counters (e.g. already wired to interrupts). Their
    /// reversal flags must match the geometry given to `with_geometry`.
    pub fn with_counters(mut self, counters: WheelPair<Arc<QuadratureCounter>>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Create one counter per wheel, honouring the configured reversal flags,
    /// and register them on `registry` as channels 0 (left) and 1 (right).
    ///
    /// Call after `with_geometry`: the flags are fixed here, and `try_build`
    /// rejects counters whose flags no longer match the geometry.
    pub fn with_registry(mut self, registry: &WheelEdgeRegistry) -> Result<Self> {
        let counters = WheelPair::new(
            Arc::new(QuadratureCounter::new(self.geometry.left_reversed)),
            Arc::new(QuadratureCounter::new(self.geometry.right_reversed)),
        );
        for wheel in Wheel::BOTH {
            registry.register(wheel.index(), counters[wheel].clone())?;
        }
        self.counters = Some(counters);
        Ok(self)
    }

    pub fn try_build(self) -> Result<RoverCore> {
        let bridge = self.bridge.ok_or(BuildError::MissingBridge)?;
        if self.geometry.ppr == 0 {
            return Err(BuildError::InvalidConfig("ppr must be > 0").into());
        }
        if !(self.geometry.wheel_diameter_cm.is_finite() && self.geometry.wheel_diameter_cm > 0.0) {
            return Err(BuildError::InvalidConfig("wheel diameter must be > 0").into());
        }
        if self.timing.sample_window.is_zero() {
            return Err(BuildError::InvalidConfig("sample window must be > 0").into());
        }
        if let Some(c) = &self.counters {
            if c.left.is_reversed() != self.geometry.left_reversed
                || c.right.is_reversed() != self.geometry.right_reversed
            {
                return Err(BuildError::InvalidConfig(
                    "encoder reversal differs from geometry (set geometry before the registry)",
                )
                .into());
            }
        }
        let clock = self.clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
        let now = clock.now();

        let mut drivetrain = Drivetrain::new(
            ActuationDriver::new(bridge),
            VelocityRegulator::new(self.tuning),
        );
        if let Some(counters) = self.counters {
            let geometry = self.geometry;
            let window = self.timing.sample_window;
            drivetrain =
                drivetrain.with_odometers(counters.map(|c| Odometer::new(c, geometry, window, now)));
        }
        tracing::debug!(
            ppr = self.geometry.ppr,
            diameter_cm = self.geometry.wheel_diameter_cm,
            odometry = drivetrain.has_odometry(),
            "rover core built"
        );
        Ok(RoverCore::from_parts(clock, drivetrain, self.timing))
    }
}

impl RoverCoreBuilder<Missing> {
    pub fn with_bridge(self, bridge: impl MotorBridge + Send + 'static) -> RoverCoreBuilder<Set> {
        RoverCoreBuilder {
            bridge: Some(Box::new(bridge)),
            clock: self.clock,
            geometry: self.geometry,
            timing: self.timing,
            tuning: self.tuning,
            counters: self.counters,
            _b: PhantomData,
        }
    }
}

impl RoverCoreBuilder<Set> {
    pub fn build(self) -> Result<RoverCore> {
        self.try_build()
    }
}
