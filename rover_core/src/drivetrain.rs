//! The actuation side of the rover as seen by commands.

use crate::actuation::ActuationDriver;
use crate::odometer::Odometer;
use crate::regulator::VelocityRegulator;
use crate::types::WheelPair;
use std::time::Instant;

/// Driver, regulator and (optionally) wheel odometry, handed to each command
/// call by mutable reference.
#[derive(Debug)]
pub struct Drivetrain {
    pub driver: ActuationDriver,
    pub regulator: VelocityRegulator,
    odometers: Option<WheelPair<Odometer>>,
}

impl Drivetrain {
    pub fn new(driver: ActuationDriver, regulator: VelocityRegulator) -> Self {
        Self {
            driver,
            regulator,
            odometers: None,
        }
    }

    pub fn with_odometers(mut self, odometers: WheelPair<Odometer>) -> Self {
        self.odometers = Some(odometers);
        self
    }

    pub fn odometers(&self) -> Option<&WheelPair<Odometer>> {
        self.odometers.as_ref()
    }

    pub fn has_odometry(&self) -> bool {
        self.odometers.is_some()
    }

    pub fn tick_odometers(&mut self, now: Instant) {
        if let Some(o) = self.odometers.as_mut() {
            o.left.tick(now);
            o.right.tick(now);
        }
    }

    pub fn reset_encoders(&mut self, now: Instant) {
        if let Some(o) = self.odometers.as_mut() {
            o.left.reset(now);
            o.right.reset(now);
        }
    }

    pub fn measured_velocity(&self) -> Option<WheelPair<f32>> {
        self.odometers
            .as_ref()
            .map(|o| WheelPair::new(o.left.velocity(), o.right.velocity()))
    }

    /// Mean of both wheel distances in cm.
    pub fn mean_distance_cm(&self) -> Option<f32> {
        self.odometers
            .as_ref()
            .map(|o| (o.left.distance_cm() + o.right.distance_cm()) / 2.0)
    }

    /// Run one regulator step with whatever odometry is available.
    pub fn regulate(&mut self, now: Instant) {
        let measured = self.measured_velocity();
        self.regulator.update(&mut self.driver, measured, now);
    }

    /// Zero both outputs and both velocity targets.
    pub fn halt(&mut self) {
        self.driver.stop();
        self.regulator.clear_targets();
    }
}
