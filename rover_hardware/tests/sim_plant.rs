use rover_hardware::error::HwError;
use rover_hardware::{SimParams, SimulatedPlant};
use rover_traits::{Direction, EdgeSink, MonotonicClock, MotorBridge, Phase, Wheel};
use rstest::rstest;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

/// Decodes edges with the same convention as the core counters, without any
/// mount reversal.
#[derive(Default)]
struct DecodingSink {
    counts: [AtomicI64; 2],
}

impl EdgeSink for DecodingSink {
    fn on_edge(&self, channel: usize, phase: Phase, a: bool, b: bool) {
        let forward = match phase {
            Phase::A => a != b,
            Phase::B => a == b,
        };
        self.counts[channel].fetch_add(if forward { 1 } else { -1 }, Ordering::Relaxed);
    }
}

impl DecodingSink {
    fn count(&self, channel: usize) -> i64 {
        self.counts[channel].load(Ordering::Relaxed)
    }
}

fn plant() -> (SimulatedPlant, Arc<DecodingSink>) {
    let sink = Arc::new(DecodingSink::default());
    let plant = SimulatedPlant::new(SimParams::default(), sink.clone());
    (plant, sink)
}

fn run(plant: &mut SimulatedPlant, ms: u64) {
    for _ in 0..ms {
        plant.step(Duration::from_millis(1));
    }
}

#[rstest]
#[case::forward(Direction::Forward, 1)]
#[case::reverse(Direction::Reverse, -1)]
fn left_wheel_emits_edges_in_travel_direction(#[case] direction: Direction, #[case] sign: i64) {
    let (mut plant, sink) = plant();
    let mut bridge = plant.bridge();
    bridge.write(Wheel::Left, direction, 200).unwrap();
    run(&mut plant, 1000);

    // Steady state (200 - 55) * 0.35 = 50.75 cm/s
    let v = plant.speed(Wheel::Left);
    assert!((v.abs() - 50.75).abs() < 0.5, "speed {v}");
    assert_eq!(sink.count(0), plant.pulses(Wheel::Left));
    assert_eq!(sink.count(0).signum(), sign);
    assert_eq!(sink.count(1), 0);
}

#[test]
fn mirrored_encoder_counts_backwards() {
    let (mut plant, sink) = plant();
    let mut bridge = plant.bridge();
    bridge.write(Wheel::Right, Direction::Forward, 150).unwrap();
    run(&mut plant, 500);
    assert!(plant.pulses(Wheel::Right) > 0);
    assert_eq!(sink.count(1), -plant.pulses(Wheel::Right));
}

#[test]
fn duty_inside_deadzone_does_not_move() {
    let (mut plant, sink) = plant();
    let mut bridge = plant.bridge();
    bridge.write(Wheel::Left, Direction::Forward, 55).unwrap();
    run(&mut plant, 500);
    assert_eq!(plant.speed(Wheel::Left), 0.0);
    assert_eq!(sink.count(0), 0);
    assert_eq!(bridge.duty(Wheel::Left), 55);
}

#[test]
fn coasting_wheel_slows_down() {
    let (mut plant, _sink) = plant();
    let mut bridge = plant.bridge();
    bridge.write(Wheel::Left, Direction::Forward, 255).unwrap();
    run(&mut plant, 500);
    let cruising = plant.speed(Wheel::Left);
    bridge.write(Wheel::Left, Direction::Coast, 0).unwrap();
    run(&mut plant, 100);
    assert!(plant.speed(Wheel::Left) < cruising / 2.0);
}

#[test]
fn injected_fault_fails_writes_with_timeout() {
    let (plant, _sink) = plant();
    let mut bridge = plant.bridge();
    plant.set_faulted(true);
    let err = bridge.write(Wheel::Left, Direction::Forward, 100).unwrap_err();
    assert!(matches!(err.downcast_ref::<HwError>(), Some(HwError::Timeout)));
    plant.set_faulted(false);
    assert!(bridge.write(Wheel::Left, Direction::Forward, 100).is_ok());
}

#[test]
fn plant_thread_advances_and_stops() {
    let (plant, sink) = plant();
    let mut bridge = plant.bridge();
    bridge.write(Wheel::Left, Direction::Forward, 255).unwrap();
    let handle = plant.spawn(Duration::from_millis(1), MonotonicClock::new());
    std::thread::sleep(Duration::from_millis(200));
    let plant = handle.stop().expect("plant thread joined");
    assert!(plant.pulses(Wheel::Left) > 0);
    assert_eq!(sink.count(0), plant.pulses(Wheel::Left));
}
