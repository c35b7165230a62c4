//! Signed power → H-bridge direction lines and 8-bit duty.

use crate::error::RoverError;
use crate::hw_error::map_bridge_error;
use crate::types::WheelPair;
use crate::util::{duty_u8, finite_or_zero};
use rover_traits::{Direction, MotorBridge, Wheel};

/// Powers with magnitude at or below this are treated as stop.
pub const DEAD_BAND: f32 = 0.05;
pub const MAX_DUTY: u8 = 255;

/// Owns the motor bridge and remembers the last applied output per wheel.
pub struct ActuationDriver {
    bridge: Box<dyn MotorBridge + Send>,
    last_duty: WheelPair<i16>,
    last_fault: Option<RoverError>,
}

impl std::fmt::Debug for ActuationDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActuationDriver")
            .field("last_duty", &self.last_duty)
            .field("last_fault", &self.last_fault)
            .finish_non_exhaustive()
    }
}

/// Direction and duty for a normalized power, after clamping and dead-band.
pub fn power_to_output(power: f32) -> (Direction, u8) {
    let p = finite_or_zero(power).clamp(-1.0, 1.0);
    if p > DEAD_BAND {
        (Direction::Forward, duty_u8(p * f32::from(MAX_DUTY)))
    } else if p < -DEAD_BAND {
        (Direction::Reverse, duty_u8(-p * f32::from(MAX_DUTY)))
    } else {
        (Direction::Coast, 0)
    }
}

/// Forward/turn mix for a differential drive.
///
/// `left = forward + turn`, `right = forward - turn`; when either exceeds unit
/// magnitude both are divided by the larger one so the turn ratio survives.
pub fn differential_mix(forward: f32, turn: f32) -> (f32, f32) {
    let forward = finite_or_zero(forward);
    let turn = finite_or_zero(turn);
    let left = forward + turn;
    let right = forward - turn;
    let scale = left.abs().max(right.abs()).max(1.0);
    (left / scale, right / scale)
}

impl ActuationDriver {
    pub fn new(bridge: Box<dyn MotorBridge + Send>) -> Self {
        Self {
            bridge,
            last_duty: WheelPair::default(),
            last_fault: None,
        }
    }

    /// Apply a normalized power in [-1, 1] to one wheel.
    ///
    /// A bridge failure is logged and remembered; the recorded duty still
    /// reflects what was commanded.
    pub fn set_power(&mut self, wheel: Wheel, power: f32) {
        let (direction, duty) = power_to_output(power);
        let signed = match direction {
            Direction::Reverse => -i16::from(duty),
            _ => i16::from(duty),
        };
        self.last_duty[wheel] = signed;
        if let Err(e) = self.bridge.write(wheel, direction, duty) {
            let mapped = map_bridge_error(e.as_ref());
            tracing::warn!(wheel = wheel.name(), error = %mapped, "bridge write failed");
            self.last_fault = Some(mapped);
        }
    }

    pub fn set_powers(&mut self, left: f32, right: f32) {
        self.set_power(Wheel::Left, left);
        self.set_power(Wheel::Right, right);
    }

    /// Drive with the joystick convention: `forward` is throttle, `turn` is steering.
    pub fn drive_mixed(&mut self, forward: f32, turn: f32) {
        let (l, r) = differential_mix(forward, turn);
        self.set_powers(l, r);
    }

    pub fn stop(&mut self) {
        self.set_powers(0.0, 0.0);
    }

    /// Last commanded signed duty (-255..=255) per wheel.
    pub fn last_duty(&self) -> WheelPair<i16> {
        self.last_duty
    }

    pub fn is_stopped(&self) -> bool {
        self.last_duty == WheelPair::default()
    }

    /// Most recent bridge failure, cleared on read.
    pub fn take_fault(&mut self) -> Option<RoverError> {
        self.last_fault.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::RecordingBridge;
    use rstest::rstest;

    #[rstest]
    #[case(0.0, Direction::Coast, 0)]
    #[case(0.05, Direction::Coast, 0)]
    #[case(-0.05, Direction::Coast, 0)]
    #[case(0.5, Direction::Forward, 128)]
    #[case(-1.0, Direction::Reverse, 255)]
    #[case(7.0, Direction::Forward, 255)]
    #[case(f32::NAN, Direction::Coast, 0)]
    fn output_table(#[case] p: f32, #[case] dir: Direction, #[case] duty: u8) {
        assert_eq!(power_to_output(p), (dir, duty));
    }

    #[test]
    fn mix_normalizes_when_saturated() {
        let (l, r) = differential_mix(1.0, 0.5);
        assert!((l - 1.0).abs() < 1e-6);
        assert!((r - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn records_signed_duty_and_writes_lines() {
        let bridge = RecordingBridge::default();
        let mut drv = ActuationDriver::new(Box::new(bridge.clone()));
        drv.set_powers(-0.5, 0.02);
        assert_eq!(drv.last_duty(), WheelPair::new(-128, 0));
        let w = bridge.last(Wheel::Left).unwrap();
        assert_eq!(w.direction, Direction::Reverse);
        assert_eq!(bridge.last(Wheel::Right).unwrap().direction.lines(), (false, false));
    }

    #[test]
    fn bridge_failure_is_recorded_not_fatal() {
        let bridge = RecordingBridge::failing("pin busy");
        let mut drv = ActuationDriver::new(Box::new(bridge));
        drv.set_power(Wheel::Left, 0.8);
        assert_eq!(drv.last_duty().left, 204);
        assert!(matches!(drv.take_fault(), Some(RoverError::Bridge(_))));
        assert!(drv.take_fault().is_none());
    }
}
