//! Pipeline Performance Benchmarks
//!
//! The whole pipeline — extraction, smoothing, normalization, routing —
//! runs once per display tick, so the budget at 60 Hz is 16.6 ms shared
//! with the renderer. In practice the analysis side should stay well under
//! a millisecond; these benchmarks validate that across channel modes and
//! route counts.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mixlens::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

const ROUTE_COUNTS: [usize; 3] = [4, 16, 64];

/// Deterministic pseudo-music frame content
fn fill_frame(frame: &mut AudioFrame, rng: &mut StdRng) {
    for m in frame.spectrum.iter_mut() {
        *m = rng.gen_range(0.0..1.0);
    }
    for s in frame.samples.iter_mut() {
        *s = rng.gen_range(-1.0..1.0);
    }
    let stereo = !frame.left_spectrum.is_empty();
    if stereo {
        for i in 0..frame.left_spectrum.len() {
            frame.left_spectrum[i] = rng.gen_range(0.0..1.0);
            frame.right_spectrum[i] = rng.gen_range(0.0..1.0);
        }
    }
}

fn engine_with_routes(routes: usize) -> AnalysisEngine {
    let mut engine = AnalysisEngine::new();
    let sources = MetricId::ALL;
    for i in 0..routes {
        engine.router_mut().add_slot(
            &format!("param_{}", i),
            ModulationSlot::new(sources[i % sources.len()])
                .with_curve(if i % 3 == 0 { 2.0 } else { 1.0 })
                .with_smoothing(0.5)
                .with_range(0.0, 10.0),
        );
    }
    engine
}

fn bench_feature_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_extraction");
    group.throughput(Throughput::Elements(1));

    for (name, stereo) in [("mono", false), ("stereo", true)] {
        let mut rng = StdRng::seed_from_u64(7);
        let mut frame = if stereo {
            AudioFrame::stereo(48000.0)
        } else {
            AudioFrame::mono(48000.0)
        };
        fill_frame(&mut frame, &mut rng);
        let mut extractor = FeatureExtractor::new();

        group.bench_function(name, |b| {
            b.iter(|| black_box(extractor.extract(black_box(&frame))))
        });
    }
    group.finish();
}

fn bench_full_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_tick");
    group.throughput(Throughput::Elements(1));

    for routes in ROUTE_COUNTS {
        let mut rng = StdRng::seed_from_u64(42);
        let mut engine = engine_with_routes(routes);
        engine
            .start_capture(48000.0, ChannelMode::Stereo)
            .expect("start");
        let mut frame = AudioFrame::stereo(48000.0);
        fill_frame(&mut frame, &mut rng);

        group.bench_with_input(
            BenchmarkId::from_parameter(routes),
            &routes,
            |b, _| {
                b.iter(|| {
                    fill_frame(&mut frame, &mut rng);
                    black_box(engine.tick(&frame))
                })
            },
        );
    }
    group.finish();
}

fn bench_router_only(c: &mut Criterion) {
    let mut group = c.benchmark_group("router_evaluate");
    group.throughput(Throughput::Elements(1));

    for routes in ROUTE_COUNTS {
        let mut engine = engine_with_routes(routes);
        let mut metrics = MetricSet::zeroed(ChannelMode::Stereo);
        metrics.amplitude = 0.6;
        metrics.harshness = 0.4;
        metrics.coherence = 0.8;

        group.bench_with_input(
            BenchmarkId::from_parameter(routes),
            &routes,
            |b, _| b.iter(|| black_box(engine.router_mut().evaluate(black_box(&metrics)))),
        );
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_feature_extraction,
    bench_full_tick,
    bench_router_only
);
criterion_main!(benches);
