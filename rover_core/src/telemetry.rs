//! Telemetry values and the encoder publication throttle.

use crate::odometer::Odometer;
use crate::supervisor::MotionMode;
use crate::types::{ClientId, WheelPair};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct EncoderSnapshot {
    pub count: i64,
    pub revolutions: f32,
    pub distance_cm: f32,
    pub velocity: f32,
    pub rpm: f32,
}

impl From<&Odometer> for EncoderSnapshot {
    fn from(o: &Odometer) -> Self {
        Self {
            count: o.count(),
            revolutions: o.revolutions(),
            distance_cm: o.distance_cm(),
            velocity: o.velocity(),
            rpm: o.rpm(),
        }
    }
}

/// Full state of the motion core at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    pub mode: MotionMode,
    pub owner: Option<ClientId>,
    pub encoders: Option<WheelPair<EncoderSnapshot>>,
    /// Last commanded signed duty (-255..=255).
    pub duty: WheelPair<i16>,
    pub targets: WheelPair<f32>,
    pub velocity_error: WheelPair<f32>,
    pub pid_enabled: bool,
}

/// Limits encoder snapshots to a minimum interval and a minimum count change.
#[derive(Debug, Clone)]
pub struct TelemetryThrottle {
    interval: Duration,
    threshold: u32,
    last_sent: Option<Instant>,
    last_counts: WheelPair<i64>,
}

impl TelemetryThrottle {
    pub fn new(interval: Duration, threshold: u32) -> Self {
        Self {
            interval,
            threshold,
            last_sent: None,
            last_counts: WheelPair::default(),
        }
    }

    /// True when a snapshot with `counts` should go out now; records it as sent.
    pub fn admit(&mut self, now: Instant, counts: WheelPair<i64>) -> bool {
        if let Some(last) = self.last_sent {
            if now.saturating_duration_since(last) < self.interval {
                return false;
            }
            let moved = |a: i64, b: i64| a.abs_diff(b) > u64::from(self.threshold);
            if !moved(counts.left, self.last_counts.left)
                && !moved(counts.right, self.last_counts.right)
            {
                return false;
            }
        }
        self.last_sent = Some(now);
        self.last_counts = counts;
        true
    }

    /// Forget history so the next snapshot is always sent.
    pub fn reset(&mut self) {
        self.last_sent = None;
    }
}
