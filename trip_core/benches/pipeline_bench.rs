use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;
use trip_core::imm::{FilterBank, ImmConfig, ImmState};
use trip_core::pipeline::{process_users, CancelFlag, PipelineConfig, TripPipeline};
use trip_core::types::{MeasCov, MeasVec, Observation};

fn make_stream(n: usize, dt: f64) -> Vec<Observation> {
    (0..n)
        .map(|i| {
            let t = i as f64 * dt;
            // Walk for the first half, then cycle.
            let x = if i < n / 2 { 1.4 * t } else { 1.4 * (n / 2) as f64 * dt + 6.0 * (t - (n / 2) as f64 * dt) };
            let wobble = (i as f64 * 0.37).sin() * 3.0;
            Observation::new(1_700_000_000.0 + t, 385_000.0 + x + wobble, 6_672_000.0 - wobble, 5.0)
        })
        .collect()
}

fn bench_imm_step(c: &mut Criterion) {
    let bank = FilterBank::new(&ImmConfig::default());
    let r = MeasCov::identity() * 25.0;
    c.bench_function("imm_step", |b| {
        let mut imm = ImmState::from_bank(&bank, &MeasVec::zeros());
        let mut k = 0.0;
        b.iter(|| {
            k += 1.0;
            black_box(imm.step(&bank, 2.0, &MeasVec::new(2.8 * k, 0.0), &r, None));
        });
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("pipeline");
    let pipeline = TripPipeline::new(PipelineConfig::default()).unwrap();

    for n in [600, 3000, 10_000] {
        let stream = make_stream(n, 2.0);
        group.bench_function(format!("{n}_samples"), |b| {
            b.iter(|| black_box(pipeline.process_stream("bench", stream.clone(), &CancelFlag::new())));
        });
    }

    let users: BTreeMap<String, Vec<Observation>> =
        (0..16).map(|u| (format!("user{u:02}"), make_stream(1200, 2.0))).collect();
    group.bench_function("16_users_parallel", |b| {
        b.iter(|| black_box(process_users(users.clone(), &pipeline, &CancelFlag::new())));
    });

    group.finish();
}

criterion_group!(benches, bench_imm_step, bench_pipeline);
criterion_main!(benches);
