//! Encoder edges → counts → windowed velocity through a fully built core.

use rover_core::{
    ClientId, CoreEvent, Intent, ManualClock, Phase, RoverCore, WheelEdgeRegistry,
    mocks::RecordingBridge,
};
use rstest::rstest;
use std::sync::Arc;

const FORWARD: [(bool, bool); 4] = [(true, false), (true, true), (false, true), (false, false)];

/// Walk `steps` forward Gray transitions on `channel`, starting from 00.
fn pulse(registry: &WheelEdgeRegistry, channel: usize, steps: usize) {
    let mut prev = (false, false);
    for i in 0..steps {
        let (a, b) = FORWARD[i % 4];
        let phase = if a == prev.0 { Phase::B } else { Phase::A };
        assert!(registry.dispatch(channel, phase, a, b));
        prev = (a, b);
    }
}

fn rig() -> (RoverCore, ManualClock, Arc<WheelEdgeRegistry>) {
    let clock = ManualClock::new();
    let registry = Arc::new(WheelEdgeRegistry::new());
    let core = RoverCore::builder()
        .with_clock(Arc::new(clock.clone()))
        .with_registry(&registry)
        .unwrap()
        .with_bridge(RecordingBridge::default())
        .build()
        .unwrap();
    (core, clock, registry)
}

#[rstest]
#[case::left(0, 157.08)]
#[case::right_is_mounted_reversed(1, -157.08)]
fn one_revolution_per_window(#[case] channel: usize, #[case] want: f32) {
    let (mut core, clock, registry) = rig();
    pulse(&registry, channel, 960);
    clock.advance_ms(100);
    core.tick();

    let v = core.drivetrain().measured_velocity().unwrap();
    let got = if channel == 0 { v.left } else { v.right };
    assert!((got - want).abs() < 0.05, "velocity {got}");
}

#[test]
fn velocity_waits_for_full_window() {
    let (mut core, clock, registry) = rig();
    pulse(&registry, 0, 480);
    clock.advance_ms(99);
    core.tick();
    assert_eq!(core.drivetrain().measured_velocity().unwrap().left, 0.0);
    clock.advance_ms(1);
    core.tick();
    assert!((core.drivetrain().measured_velocity().unwrap().left - 78.54).abs() < 0.05);
}

#[test]
fn snapshot_reports_distance_and_angle() {
    let (mut core, clock, registry) = rig();
    pulse(&registry, 0, 1200);
    clock.advance_ms(10);
    core.tick();
    let events = core.drain_events();
    let Some(CoreEvent::Encoders(snap)) = events.iter().find(|e| e.name() == "encoders") else {
        panic!("no encoder snapshot in {events:?}");
    };
    assert_eq!(snap.left.count, 1200);
    assert!((snap.left.revolutions - 1.25).abs() < 1e-6);
    assert!((snap.left.distance_cm - 19.635).abs() < 1e-3);
    assert_eq!(snap.right.count, 0);
}

#[test]
fn reset_encoders_zeroes_counts_for_the_owner_only() {
    let (mut core, _clock, registry) = rig();
    pulse(&registry, 0, 64);
    let owner = ClientId(1);
    let other = ClientId(2);
    core.on_connect(owner);

    assert!(core.handle(other, Intent::ResetEncoders).is_err());
    assert_eq!(core.encoder_snapshot().unwrap().left.count, 64);

    core.handle(owner, Intent::ResetEncoders).unwrap();
    assert_eq!(core.encoder_snapshot().unwrap().left.count, 0);
    assert!(
        core.drain_events()
            .iter()
            .any(|e| matches!(e, CoreEvent::EncodersReset))
    );
}
