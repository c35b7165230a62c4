//! Numeric helpers for the control path.

/// Replace NaN/±Inf with 0.0 so downstream clamps stay total.
#[inline]
pub fn finite_or_zero(x: f32) -> f32 {
    if x.is_finite() { x } else { 0.0 }
}

/// Round a magnitude in [0, 255] to the nearest 8-bit duty.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn duty_u8(magnitude: f32) -> u8 {
    finite_or_zero(magnitude).clamp(0.0, 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duty_rounds_and_clamps() {
        assert_eq!(duty_u8(127.5), 128);
        assert_eq!(duty_u8(300.0), 255);
        assert_eq!(duty_u8(-4.0), 0);
        assert_eq!(duty_u8(f32::NAN), 0);
    }

    #[test]
    fn non_finite_becomes_zero() {
        assert_eq!(finite_or_zero(f32::INFINITY), 0.0);
        assert_eq!(finite_or_zero(-0.25), -0.25);
    }
}
