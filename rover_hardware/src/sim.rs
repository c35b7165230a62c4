//! Simulated drivetrain for running without GPIO.
//!
//! [`SimulatedBridge`] stores the last commanded duty per wheel.
//! [`SimulatedPlant`] turns that duty into wheel speed with a dead-zone and a
//! first-order lag, integrates position, and replays the travelled distance
//! as Gray-code quadrature edges into an [`EdgeSink`], exactly as the
//! interrupt handlers would on the real rover.

use rover_traits::{Clock, Direction, EdgeSink, MotorBridge, Phase, Wheel};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI16, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::HwError;

/// Forward rotation walks this sequence of (A, B) levels.
const GRAY: [(bool, bool); 4] = [(false, false), (true, false), (true, true), (false, true)];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimParams {
    /// Duty magnitude at or below which the wheel stays still.
    pub deadzone_duty: f32,
    /// Steady-state cm/s per duty step above the dead-zone.
    pub cm_s_per_duty: f32,
    pub time_constant: Duration,
    /// Travel per encoder pulse in cm.
    pub cm_per_pulse: f32,
    /// Encoder mounted mirrored on this wheel (left, right).
    pub reversed: [bool; 2],
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            deadzone_duty: 55.0,
            cm_s_per_duty: 0.35,
            time_constant: Duration::from_millis(80),
            cm_per_pulse: std::f32::consts::PI * 5.0 / 960.0,
            reversed: [false, true],
        }
    }
}

#[derive(Debug, Default)]
struct Shared {
    duty: [AtomicI16; 2],
    faulted: AtomicBool,
}

/// Motor bridge half of the simulation. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SimulatedBridge {
    shared: Arc<Shared>,
}

impl SimulatedBridge {
    /// Signed duty last written for `wheel`.
    pub fn duty(&self, wheel: Wheel) -> i16 {
        self.shared.duty[wheel.index()].load(Ordering::Relaxed)
    }
}

impl MotorBridge for SimulatedBridge {
    fn write(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.shared.faulted.load(Ordering::Relaxed) {
            return Err(Box::new(HwError::Timeout));
        }
        let signed = match direction {
            Direction::Forward => i16::from(duty),
            Direction::Reverse => -i16::from(duty),
            Direction::Coast => 0,
        };
        self.shared.duty[wheel.index()].store(signed, Ordering::Relaxed);
        tracing::trace!(wheel = wheel.name(), duty = signed, "sim bridge write");
        Ok(())
    }
}

pub struct SimulatedPlant {
    params: SimParams,
    shared: Arc<Shared>,
    sink: Arc<dyn EdgeSink>,
    speed: [f32; 2],
    position_cm: [f64; 2],
    pulses: [i64; 2],
    gray: [usize; 2],
}

impl std::fmt::Debug for SimulatedPlant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedPlant")
            .field("params", &self.params)
            .field("speed", &self.speed)
            .field("pulses", &self.pulses)
            .finish_non_exhaustive()
    }
}

impl SimulatedPlant {
    pub fn new(params: SimParams, sink: Arc<dyn EdgeSink>) -> Self {
        Self {
            params,
            shared: Arc::new(Shared::default()),
            sink,
            speed: [0.0; 2],
            position_cm: [0.0; 2],
            pulses: [0; 2],
            gray: [0; 2],
        }
    }

    /// A bridge whose writes drive this plant.
    pub fn bridge(&self) -> SimulatedBridge {
        SimulatedBridge {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Make every subsequent bridge write fail with a timeout.
    pub fn set_faulted(&self, faulted: bool) {
        self.shared.faulted.store(faulted, Ordering::Relaxed);
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    /// Current wheel speed in cm/s (positive is forward).
    pub fn speed(&self, wheel: Wheel) -> f32 {
        self.speed[wheel.index()]
    }

    /// Net pulses emitted for `wheel`, in wheel-forward terms.
    pub fn pulses(&self, wheel: Wheel) -> i64 {
        self.pulses[wheel.index()]
    }

    /// Speed the wheel settles at for a signed duty.
    pub fn steady_state_speed(&self, duty: i16) -> f32 {
        let magnitude = f32::from(duty.unsigned_abs());
        if magnitude <= self.params.deadzone_duty {
            return 0.0;
        }
        let v = (magnitude - self.params.deadzone_duty) * self.params.cm_s_per_duty;
        if duty < 0 { -v } else { v }
    }

    /// Advance the simulation by `dt`, emitting any edges it produces.
    pub fn step(&mut self, dt: Duration) {
        if dt.is_zero() {
            return;
        }
        let tau = self.params.time_constant.as_secs_f32();
        let alpha = if tau > 0.0 {
            1.0 - (-dt.as_secs_f32() / tau).exp()
        } else {
            1.0
        };
        for wheel in Wheel::BOTH {
            let i = wheel.index();
            let target = self.steady_state_speed(self.shared.duty[i].load(Ordering::Relaxed));
            self.speed[i] += (target - self.speed[i]) * alpha;
            self.position_cm[i] += f64::from(self.speed[i]) * dt.as_secs_f64();

            #[allow(clippy::cast_possible_truncation)]
            let want = (self.position_cm[i] / f64::from(self.params.cm_per_pulse)).floor() as i64;
            while self.pulses[i] < want {
                self.emit(i, true);
                self.pulses[i] += 1;
            }
            while self.pulses[i] > want {
                self.emit(i, false);
                self.pulses[i] -= 1;
            }
        }
    }

    fn emit(&mut self, channel: usize, wheel_forward: bool) {
        let encoder_forward = wheel_forward != self.params.reversed[channel];
        let from = self.gray[channel];
        let to = if encoder_forward { (from + 1) % 4 } else { (from + 3) % 4 };
        let (a, b) = GRAY[to];
        let phase = if a == GRAY[from].0 { Phase::B } else { Phase::A };
        self.gray[channel] = to;
        self.sink.on_edge(channel, phase, a, b);
    }

    /// Run the plant on its own thread, stepping every `period`.
    pub fn spawn<C: Clock + 'static>(mut self, period: Duration, clock: C) -> PlantHandle {
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop = Arc::clone(&shutdown);
        let join = std::thread::spawn(move || {
            let mut last = clock.now();
            while !stop.load(Ordering::Relaxed) {
                clock.sleep(period);
                let now = clock.now();
                self.step(now.saturating_duration_since(last));
                last = now;
            }
            tracing::trace!("plant thread exiting");
            self
        });
        PlantHandle {
            shutdown,
            join: Some(join),
        }
    }
}

/// Owner of a running plant thread; stops and joins it on drop.
#[derive(Debug)]
pub struct PlantHandle {
    shutdown: Arc<AtomicBool>,
    join: Option<JoinHandle<SimulatedPlant>>,
}

impl PlantHandle {
    /// Stop the thread and hand the plant back.
    pub fn stop(mut self) -> Option<SimulatedPlant> {
        self.shutdown.store(true, Ordering::Relaxed);
        self.join.take().and_then(|j| j.join().ok())
    }
}

impl Drop for PlantHandle {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
    }
}
