//! Quadrature decoding and wheel velocity estimation.
//!
//! Two contexts touch an encoder. The interrupt side calls
//! [`QuadratureCounter::on_edge`] (usually through an [`EdgeRegistry`]); it is
//! the only writer of the pulse count and the last-phase bits. The control loop
//! owns an [`Odometer`] that reads the count once per tick and derives
//! velocity over a fixed sampling window.

use crate::config::Geometry;
use crate::error::RegistryError;
use rover_traits::{EdgeSink, Phase};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Lock-free pulse counter written from interrupt context.
#[derive(Debug, Default)]
pub struct QuadratureCounter {
    count: AtomicI64,
    last_a: AtomicBool,
    last_b: AtomicBool,
    reversed: bool,
}

impl QuadratureCounter {
    pub fn new(reversed: bool) -> Self {
        Self {
            reversed,
            ..Self::default()
        }
    }

    /// Seed the last-phase bits with the current line levels so the first real
    /// edge is not mistaken for a repeat.
    pub fn prime(&self, a: bool, b: bool) {
        self.last_a.store(a, Ordering::Relaxed);
        self.last_b.store(b, Ordering::Relaxed);
    }

    /// Record one edge on `phase` with both lines sampled as (`a`, `b`).
    ///
    /// Forward rotation walks the Gray sequence 00 → 10 → 11 → 01. An A edge
    /// counts up when A and B differ afterwards, a B edge counts up when they
    /// match. An edge whose phase level did not actually change is ignored.
    #[inline]
    pub fn on_edge(&self, phase: Phase, a: bool, b: bool) {
        let (level, last) = match phase {
            Phase::A => (a, &self.last_a),
            Phase::B => (b, &self.last_b),
        };
        if last.swap(level, Ordering::Relaxed) == level {
            return;
        }
        match phase {
            Phase::A => self.last_b.store(b, Ordering::Relaxed),
            Phase::B => self.last_a.store(a, Ordering::Relaxed),
        }
        let forward = match phase {
            Phase::A => a != b,
            Phase::B => a == b,
        };
        let step = if forward != self.reversed { 1 } else { -1 };
        self.count.fetch_add(step, Ordering::Release);
    }

    #[inline]
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::Acquire)
    }

    /// Zero the count. The caller must make sure no edge is delivered
    /// concurrently (mask the interrupt or call from the control loop only
    /// while the wheels are stopped).
    pub fn reset(&self) {
        self.count.store(0, Ordering::Release);
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }
}

/// Fixed table mapping an interrupt channel index to its counter.
///
/// Populated once at startup; the interrupt path only does an index lookup.
#[derive(Debug)]
pub struct EdgeRegistry<const N: usize> {
    slots: [OnceLock<Arc<QuadratureCounter>>; N],
}

impl<const N: usize> Default for EdgeRegistry<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> EdgeRegistry<N> {
    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| OnceLock::new()),
        }
    }

    pub fn register(
        &self,
        channel: usize,
        counter: Arc<QuadratureCounter>,
    ) -> Result<(), RegistryError> {
        let slot = self
            .slots
            .get(channel)
            .ok_or(RegistryError::OutOfRange(channel))?;
        slot.set(counter)
            .map_err(|_| RegistryError::Occupied(channel))
    }

    pub fn get(&self, channel: usize) -> Option<&Arc<QuadratureCounter>> {
        self.slots.get(channel).and_then(OnceLock::get)
    }

    /// Route an edge to the registered counter. Returns false for an empty or
    /// unknown channel.
    #[inline]
    pub fn dispatch(&self, channel: usize, phase: Phase, a: bool, b: bool) -> bool {
        match self.get(channel) {
            Some(counter) => {
                counter.on_edge(phase, a, b);
                true
            }
            None => false,
        }
    }
}

impl<const N: usize> EdgeSink for EdgeRegistry<N> {
    fn on_edge(&self, channel: usize, phase: Phase, a: bool, b: bool) {
        self.dispatch(channel, phase, a, b);
    }

    fn prime(&self, channel: usize, a: bool, b: bool) {
        if let Some(counter) = self.get(channel) {
            counter.prime(a, b);
        }
    }
}

/// Two-wheel registry used by the rover: channel 0 is left, 1 is right.
pub type WheelEdgeRegistry = EdgeRegistry<2>;

/// Control-loop view of one encoder.
#[derive(Debug)]
pub struct Odometer {
    counter: Arc<QuadratureCounter>,
    geometry: Geometry,
    window: Duration,
    window_start: Instant,
    count_at_window_start: i64,
    velocity: f32,
}

impl Odometer {
    pub fn new(
        counter: Arc<QuadratureCounter>,
        geometry: Geometry,
        window: Duration,
        now: Instant,
    ) -> Self {
        let start = counter.count();
        Self {
            counter,
            geometry,
            window,
            window_start: now,
            count_at_window_start: start,
            velocity: 0.0,
        }
    }

    /// Recompute velocity once the sampling window has elapsed; otherwise a no-op.
    pub fn tick(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < self.window || elapsed.is_zero() {
            return;
        }
        let count = self.counter.count();
        let delta = count - self.count_at_window_start;
        #[allow(clippy::cast_precision_loss)]
        let revolutions = delta as f32 / self.ppr_f32();
        self.velocity = revolutions * self.geometry.circumference_cm() / elapsed.as_secs_f32();
        self.window_start = now;
        self.count_at_window_start = count;
        tracing::trace!(count, delta, velocity = self.velocity, "odometer window");
    }

    /// Zero the count and velocity and restart the sampling window.
    pub fn reset(&mut self, now: Instant) {
        self.counter.reset();
        self.count_at_window_start = 0;
        self.window_start = now;
        self.velocity = 0.0;
    }

    #[inline]
    pub fn count(&self) -> i64 {
        self.counter.count()
    }

    /// Linear velocity in cm/s from the last completed window.
    #[inline]
    pub fn velocity(&self) -> f32 {
        self.velocity
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn revolutions(&self) -> f32 {
        self.count() as f32 / self.ppr_f32()
    }

    pub fn distance_cm(&self) -> f32 {
        self.revolutions() * self.geometry.circumference_cm()
    }

    pub fn rpm(&self) -> f32 {
        let c = self.geometry.circumference_cm();
        if c <= 0.0 {
            return 0.0;
        }
        self.velocity / c * 60.0
    }

    /// Wheel angle within the current revolution, in [0, 360).
    #[allow(clippy::cast_precision_loss)]
    pub fn degrees(&self) -> f32 {
        let ppr = i64::from(self.geometry.ppr.max(1));
        self.count().rem_euclid(ppr) as f32 * 360.0 / ppr as f32
    }

    pub fn radians(&self) -> f32 {
        self.degrees().to_radians()
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    #[allow(clippy::cast_precision_loss)]
    fn ppr_f32(&self) -> f32 {
        self.geometry.ppr.max(1) as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    const FORWARD: [(bool, bool); 4] = [(true, false), (true, true), (false, true), (false, false)];
    const BACKWARD: [(bool, bool); 4] = [(false, true), (true, true), (true, false), (false, false)];

    fn spin(counter: &QuadratureCounter, steps: usize, forward: bool) {
        let seq = if forward { FORWARD } else { BACKWARD };
        let mut state = (false, false);
        for next in seq.iter().cycle().take(steps).copied() {
            let phase = if next.0 != state.0 { Phase::A } else { Phase::B };
            counter.on_edge(phase, next.0, next.1);
            state = next;
        }
    }

    #[rstest]
    #[case(false, true, 8)]
    #[case(true, true, -8)]
    #[case(false, false, -8)]
    #[case(true, false, 8)]
    fn gray_sequence_direction(#[case] reversed: bool, #[case] forward: bool, #[case] want: i64) {
        let c = QuadratureCounter::new(reversed);
        spin(&c, 8, forward);
        assert_eq!(c.count(), want);
    }

    #[test]
    fn repeated_level_is_not_a_transition() {
        let c = QuadratureCounter::new(false);
        c.on_edge(Phase::A, true, false);
        c.on_edge(Phase::A, true, false);
        assert_eq!(c.count(), 1);
    }

    #[test]
    fn registry_rejects_double_registration_and_unknown_channel() {
        let reg = WheelEdgeRegistry::new();
        reg.register(0, Arc::new(QuadratureCounter::new(false)))
            .unwrap();
        assert_eq!(
            reg.register(0, Arc::new(QuadratureCounter::new(false))),
            Err(RegistryError::Occupied(0))
        );
        assert_eq!(
            reg.register(5, Arc::new(QuadratureCounter::new(false))),
            Err(RegistryError::OutOfRange(5))
        );
        assert!(!reg.dispatch(1, Phase::A, true, false));
        assert!(reg.dispatch(0, Phase::A, true, false));
        assert_eq!(reg.get(0).map(|c| c.count()), Some(1));
    }

    #[test]
    fn primed_levels_suppress_the_stale_first_edge() {
        let reg = WheelEdgeRegistry::new();
        reg.register(0, Arc::new(QuadratureCounter::new(false)))
            .unwrap();
        let sink: &dyn EdgeSink = &reg;
        sink.prime(0, true, true);
        // Lines already high: a repeated A-high report is not a transition.
        sink.on_edge(0, Phase::A, true, true);
        assert_eq!(reg.get(0).map(|c| c.count()), Some(0));
        // 11 -> 01 is a forward step.
        sink.on_edge(0, Phase::A, false, true);
        assert_eq!(reg.get(0).map(|c| c.count()), Some(1));
        sink.prime(1, true, true);
    }

    #[test]
    fn velocity_is_zero_until_first_window() {
        let t0 = Instant::now();
        let c = Arc::new(QuadratureCounter::new(false));
        let mut odo = Odometer::new(c.clone(), Geometry::default(), Duration::from_millis(100), t0);
        spin(&c, 40, true);
        odo.tick(t0 + Duration::from_millis(99));
        assert_eq!(odo.velocity(), 0.0);
        assert_eq!(odo.count(), 40);
    }

    #[test]
    fn getters_follow_count() {
        let t0 = Instant::now();
        let c = Arc::new(QuadratureCounter::new(false));
        let odo = Odometer::new(c.clone(), Geometry::default(), Duration::from_millis(100), t0);
        spin(&c, 1200, true);
        assert!((odo.revolutions() - 1.25).abs() < 1e-6);
        assert!((odo.distance_cm() - 1.25 * std::f32::consts::PI * 5.0).abs() < 1e-3);
        assert!((odo.degrees() - 90.0).abs() < 1e-4);
        assert!((odo.radians() - std::f32::consts::FRAC_PI_2).abs() < 1e-5);
    }
}
