//! Hardware seams shared by the rover crates.
//!
//! The core talks to the outside world only through these traits: a [`Clock`]
//! for time and a [`MotorBridge`] for the H-bridge outputs. Encoder edges come
//! in the other direction: whatever owns the interrupt lines pushes them into
//! an [`EdgeSink`].
pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

/// One side of the differential drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wheel {
    Left,
    Right,
}

impl Wheel {
    pub const BOTH: [Wheel; 2] = [Wheel::Left, Wheel::Right];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Wheel::Left => 0,
            Wheel::Right => 1,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Wheel::Left => "left",
            Wheel::Right => "right",
        }
    }
}

/// State of the two direction inputs of one H-bridge channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
    /// Both direction lines low, motor free-wheels.
    Coast,
}

impl Direction {
    /// Levels of the (IN_A, IN_B) pair for this direction.
    #[inline]
    pub fn lines(self) -> (bool, bool) {
        match self {
            Direction::Forward => (false, true),
            Direction::Reverse => (true, false),
            Direction::Coast => (false, false),
        }
    }
}

/// Output stage for one dual-channel H-bridge.
pub trait MotorBridge {
    /// Drive `wheel` with the given direction lines and an 8-bit duty cycle.
    fn write(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Encoder output line that produced an edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    A,
    B,
}

/// Receiver for quadrature edges, called from interrupt context.
///
/// `channel` identifies the encoder (0 = left, 1 = right); `a` and `b` are the
/// levels of both phase lines sampled right after the edge. Implementations
/// must not block or allocate.
///
/// All calls for one channel must come from a single context (one interrupt
/// thread per encoder); the sink does not order concurrent edges.
pub trait EdgeSink: Send + Sync {
    fn on_edge(&self, channel: usize, phase: Phase, a: bool, b: bool);

    /// Seed `channel` with the current line levels before the first edge.
    fn prime(&self, _channel: usize, _a: bool, _b: bool) {}
}

impl<B: MotorBridge + ?Sized> MotorBridge for Box<B> {
    fn write(
        &mut self,
        wheel: Wheel,
        direction: Direction,
        duty: u8,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        (**self).write(wheel, direction, duty)
    }
}
