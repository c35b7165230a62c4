//! Wiring of a backend to a `RoverCore` and the fixed-rate control loop.

use crate::publish::{Publisher, Record};
use rover_config::Config;
use rover_core::{
    ClientId, CoreEvent, Geometry, Intent, IntentError, MotionMode, RegulatorConfig, RoverCore,
    Timing, WheelEdgeRegistry,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// The CLI is the only client of its own core.
pub const CLI_CLIENT: ClientId = ClientId(1);

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("interrupted by signal")]
    Interrupted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ended {
    /// The run limit elapsed with a command still active.
    Deadline,
    /// The active command finished (or timed out) on its own.
    Idle,
}

#[derive(Debug, Clone, Copy)]
pub struct RunStats {
    pub ticks: u64,
    pub elapsed: Duration,
    /// Ticks that started later than their slot.
    pub overruns: u64,
    pub ended: Ended,
}

/// What the backend reports when the rig is closed.
#[derive(Debug, Clone, Copy)]
pub struct BackendReport {
    pub name: &'static str,
    /// Pulses emitted by the simulated plant (left, right), sim only.
    pub plant_pulses: Option<[i64; 2]>,
}

enum Backend {
    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    Sim(rover_hardware::PlantHandle),
    #[cfg(all(feature = "hardware", target_os = "linux"))]
    Gpio(rover_hardware::encoder::EncoderInterrupts),
}

pub struct Rig {
    core: RoverCore,
    backend: Backend,
    tick: Duration,
    keep_alive: Duration,
    started: Instant,
}

impl Rig {
    pub fn open(cfg: &Config) -> eyre::Result<Self> {
        let geometry: Geometry = (&cfg.geometry).into();
        let timing: Timing = (&cfg.control).into();
        let tuning: RegulatorConfig = (&cfg.tuning).into();
        let registry = Arc::new(WheelEdgeRegistry::new());
        let builder = RoverCore::builder()
            .with_geometry(geometry)
            .with_timing(timing)
            .with_tuning(tuning)
            .with_registry(&registry)?;

        let (core, backend) = open_backend(cfg, builder, &registry)?;
        tracing::info!(
            backend = backend.name(),
            tick_ms = cfg.control.tick_ms,
            timeout_ms = cfg.control.command_timeout_ms,
            "rig ready"
        );
        Ok(Self {
            core,
            backend,
            tick: Duration::from_millis(cfg.control.tick_ms),
            keep_alive: timing.command_timeout / 4,
            started: Instant::now(),
        })
    }

    pub fn core(&self) -> &RoverCore {
        &self.core
    }

    /// Connect as [`CLI_CLIENT`], which takes the free control token.
    pub fn connect(&mut self) {
        self.core.on_connect(CLI_CLIENT);
    }

    pub fn send(&mut self, intent: Intent) -> Result<(), IntentError> {
        self.core.handle(CLI_CLIENT, intent)
    }

    /// Tick the core until its command ends, `limit` elapses or `shutdown`
    /// is raised. `keep_alive` runs often enough to beat the command timeout.
    pub fn run(
        &mut self,
        publisher: &Publisher,
        shutdown: &AtomicBool,
        limit: Option<Duration>,
        mut keep_alive: impl FnMut(&mut RoverCore) -> Result<(), IntentError>,
        mut observe: impl FnMut(&CoreEvent),
    ) -> eyre::Result<RunStats> {
        let begin = Instant::now();
        let deadline = limit.map(|d| begin + d);
        let mut next = begin;
        let mut last_refresh = begin;
        let mut ticks = 0u64;
        let mut overruns = 0u64;

        let ended = loop {
            if shutdown.load(Ordering::Relaxed) {
                tracing::warn!(ticks, "shutdown requested; halting");
                self.core.halt();
                self.flush(publisher, &mut observe);
                return Err(SessionError::Interrupted.into());
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                break Ended::Deadline;
            }
            if now.saturating_duration_since(last_refresh) >= self.keep_alive {
                keep_alive(&mut self.core)?;
                last_refresh = now;
            }

            self.core.tick();
            ticks += 1;
            self.flush(publisher, &mut observe);
            if self.core.mode() == MotionMode::Idle {
                break Ended::Idle;
            }

            next += self.tick;
            let now = Instant::now();
            if next > now {
                std::thread::sleep(next - now);
            } else {
                overruns += 1;
                next = now;
            }
        };

        let stats = RunStats {
            ticks,
            elapsed: begin.elapsed(),
            overruns,
            ended,
        };
        tracing::debug!(?stats, "control loop finished");
        Ok(stats)
    }

    /// Hand every queued core event to the publisher.
    pub fn flush(&mut self, publisher: &Publisher, observe: &mut impl FnMut(&CoreEvent)) {
        let t_ms = u64::try_from(self.started.elapsed().as_millis()).unwrap_or(u64::MAX);
        for event in self.core.drain_events() {
            observe(&event);
            publisher.publish(Record::Event { t_ms, event });
        }
    }

    /// Stop the motors, publish the last events and release the backend.
    pub fn close(mut self, publisher: &Publisher) -> BackendReport {
        self.core.halt();
        self.flush(publisher, &mut |_: &CoreEvent| {});
        let name = self.backend.name();
        let plant_pulses = match self.backend {
            #[cfg(not(all(feature = "hardware", target_os = "linux")))]
            Backend::Sim(handle) => handle.stop().map(|plant| {
                [
                    plant.pulses(rover_traits::Wheel::Left),
                    plant.pulses(rover_traits::Wheel::Right),
                ]
            }),
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            Backend::Gpio(irq) => {
                drop(irq);
                None
            }
        };
        BackendReport { name, plant_pulses }
    }
}

impl Backend {
    fn name(&self) -> &'static str {
        match self {
            #[cfg(not(all(feature = "hardware", target_os = "linux")))]
            Backend::Sim(_) => "sim",
            #[cfg(all(feature = "hardware", target_os = "linux"))]
            Backend::Gpio(_) => "l298n",
        }
    }
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn open_backend(
    cfg: &Config,
    builder: rover_core::RoverCoreBuilder,
    registry: &Arc<WheelEdgeRegistry>,
) -> eyre::Result<(RoverCore, Backend)> {
    use rover_hardware::{SimParams, SimulatedPlant};
    use rover_traits::{EdgeSink, MonotonicClock};

    let geometry: Geometry = (&cfg.geometry).into();
    let params = SimParams {
        deadzone_duty: cfg.sim.deadzone_duty,
        cm_s_per_duty: cfg.sim.cm_s_per_duty,
        time_constant: Duration::from_millis(cfg.sim.time_constant_ms),
        cm_per_pulse: geometry.cm_per_pulse(),
        reversed: [geometry.left_reversed, geometry.right_reversed],
    };
    let sink: Arc<dyn EdgeSink> = registry.clone();
    let plant = SimulatedPlant::new(params, sink);
    let core = builder.with_bridge(plant.bridge()).build()?;
    let handle = plant.spawn(Duration::from_millis(1), MonotonicClock::new());
    Ok((core, Backend::Sim(handle)))
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn open_backend(
    cfg: &Config,
    builder: rover_core::RoverCoreBuilder,
    registry: &Arc<WheelEdgeRegistry>,
) -> eyre::Result<(RoverCore, Backend)> {
    use rover_hardware::encoder::{EncoderInterrupts, EncoderPins};
    use rover_hardware::l298n::{ChannelPins, L298nBridge};
    use rover_traits::EdgeSink;

    let p = &cfg.pins;
    let bridge = L298nBridge::new(
        ChannelPins {
            enable: p.left_pwm,
            in_a: p.left_in_a,
            in_b: p.left_in_b,
        },
        ChannelPins {
            enable: p.right_pwm,
            in_a: p.right_in_a,
            in_b: p.right_in_b,
        },
    )?;
    let sink: Arc<dyn EdgeSink> = registry.clone();
    let irq = EncoderInterrupts::attach(
        [
            EncoderPins {
                a: p.left_enc_a,
                b: p.left_enc_b,
            },
            EncoderPins {
                a: p.right_enc_a,
                b: p.right_enc_b,
            },
        ],
        sink,
    )?;
    let core = builder.with_bridge(bridge).build()?;
    Ok((core, Backend::Gpio(irq)))
}
