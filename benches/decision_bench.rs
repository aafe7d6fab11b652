// Benchmark for the per-tick decision path
// Run with: cargo bench

use clevo_fan_rs::control::{
    CURVE_55, ControlState, GateDecision, Smoother, TransitionGate, hysteresis, poly_duty,
};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use tokio::time::Instant;

fn bench_policies(c: &mut Criterion) {
    c.bench_function("hysteresis full grid", |b| {
        b.iter(|| {
            let mut changes = 0;
            for temp in 30..110 {
                for duty in 0..=100u8 {
                    if hysteresis(black_box(temp), black_box(duty)).is_some() {
                        changes += 1;
                    }
                }
            }
            changes
        });
    });
    c.bench_function("curve55 30..110C", |b| {
        b.iter(|| (30..110).map(|t| poly_duty(&CURVE_55, black_box(t)) as u32).sum::<u32>());
    });
}

fn bench_tick_decision(c: &mut Criterion) {
    let gate = TransitionGate::default();
    let t0 = Instant::now();
    let state = ControlState::new(t0);
    c.bench_function("smooth + decide 10k samples", |b| {
        b.iter(|| {
            let mut smoother = Smoother::new(5);
            let mut duty = 0u8;
            for i in 0..10_000i32 {
                let smoothed = smoother.push(black_box(45 + (i % 50)));
                let rec = hysteresis(smoothed, duty);
                if let GateDecision::Apply { duty: d, .. } =
                    gate.evaluate(duty, rec, &state, t0)
                {
                    duty = d;
                }
            }
            duty
        });
    });
}

criterion_group!(benches, bench_policies, bench_tick_decision);
criterion_main!(benches);
