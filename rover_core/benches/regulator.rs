use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use rover_core::{
    ActuationDriver, Phase, Polynomial, QuadratureCounter, RegulatorConfig,
    VelocityRegulator, WheelPair, mocks::RecordingBridge,
};
use std::time::{Duration, Instant};

fn bench_regulator(c: &mut Criterion) {
    let mut cfg = RegulatorConfig::default();
    cfg.set_pid_gains(1.5, 0.4, 0.05);
    cfg.set_pid_enabled(true);
    let mut group = c.benchmark_group("regulator");

    group.bench_function("update_closed_loop_1k", |b| {
        b.iter_batched(
            || {
                let mut reg = VelocityRegulator::new(cfg);
                reg.set_targets(25.0, 25.0);
                (reg, ActuationDriver::new(Box::new(RecordingBridge::default())))
            },
            |(mut reg, mut driver)| {
                let mut t = Instant::now();
                for i in 0..1000u16 {
                    t += Duration::from_millis(10);
                    let m = f32::from(i % 50);
                    reg.update(&mut driver, Some(WheelPair::new(m, m)), t);
                }
                black_box(reg.last_duty())
            },
            BatchSize::SmallInput,
        );
    });

    let poly = Polynomial::from_coefficients(&[55.0, 3.1, -0.02, 1e-4, 0.0, 0.0]);
    group.bench_function("polynomial_eval", |b| {
        b.iter(|| black_box(poly.eval(black_box(37.5))));
    });
    group.finish();
}

fn bench_decoder(c: &mut Criterion) {
    const FORWARD: [(bool, bool); 4] = [(true, false), (true, true), (false, true), (false, false)];
    c.bench_function("quadrature_edges_4k", |b| {
        let counter = QuadratureCounter::new(false);
        b.iter(|| {
            for _ in 0..1000 {
                for (i, &(a, bl)) in FORWARD.iter().enumerate() {
                    let phase = if i % 2 == 0 { Phase::A } else { Phase::B };
                    counter.on_edge(phase, a, bl);
                }
            }
            black_box(counter.count())
        });
    });
}

criterion_group!(benches, bench_regulator, bench_decoder);
criterion_main!(benches);
