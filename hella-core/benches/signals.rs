//! Benchmarks for hella-core
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use hella_core::reactive::ReactiveRuntime;
use hella_core::{ComputedConfig, EffectOptions, RuntimeConfig, SignalConfig};

fn runtime() -> ReactiveRuntime {
    ReactiveRuntime::new(RuntimeConfig::default())
}

// =============================================================================
// SIGNAL BENCHMARKS
// =============================================================================

fn bench_signal_create(c: &mut Criterion) {
    let rt = runtime();
    c.bench_function("signal_create", |b| {
        b.iter(|| black_box(rt.signal(0i32, SignalConfig::default())))
    });
}

fn bench_signal_get(c: &mut Criterion) {
    let rt = runtime();
    let s = rt.signal(42i32, SignalConfig::default());
    c.bench_function("signal_get", |b| b.iter(|| black_box(s.get())));
}

fn bench_signal_set_and_frame(c: &mut Criterion) {
    let rt = runtime();
    let s = rt.signal(0i32, SignalConfig::default());
    let _sub = s.subscribe(|| {}).unwrap();
    c.bench_function("signal_set_and_frame", |b| {
        b.iter(|| {
            s.set(black_box(42)).unwrap();
            rt.advance_frame().unwrap();
        })
    });
}

// =============================================================================
// COMPUTED BENCHMARKS
// =============================================================================

fn bench_computed_get_cached(c: &mut Criterion) {
    let rt = runtime();
    let s = rt.signal(42i32, SignalConfig::default());
    let s_clone = s.clone();
    let d = rt.computed(move || Ok(s_clone.get()? * 2), ComputedConfig::default());

    // First get materializes
    let _ = d.get();

    c.bench_function("computed_get_cached", |b| b.iter(|| black_box(d.get())));
}

fn bench_computed_recompute(c: &mut Criterion) {
    let rt = runtime();
    let s = rt.signal(0i32, SignalConfig::default());
    let s_clone = s.clone();
    let d = rt.computed(move || Ok(s_clone.get()? * 2), ComputedConfig::default());
    let _ = d.get();

    let mut i = 0;
    c.bench_function("computed_recompute", |b| {
        b.iter(|| {
            i += 1;
            s.set(i).unwrap();
            rt.flush().unwrap();
            black_box(d.get())
        })
    });
}

// =============================================================================
// EFFECT BENCHMARKS
// =============================================================================

fn bench_effect_trigger(c: &mut Criterion) {
    let rt = runtime();
    let s = rt.signal(0i32, SignalConfig::default());
    let s_clone = s.clone();
    let _fx = rt
        .effect(
            move || {
                black_box(s_clone.get()?);
                Ok(())
            },
            EffectOptions::immediate(),
        )
        .unwrap();

    let mut i = 0;
    c.bench_function("effect_trigger", |b| {
        b.iter(|| {
            i += 1;
            s.set(i).unwrap();
            rt.advance_frame().unwrap();
        })
    });
}

fn bench_batch_updates(c: &mut Criterion) {
    let rt = runtime();
    let signals: Vec<_> = (0..10).map(|i| rt.signal(i, SignalConfig::default())).collect();
    let reads = signals.clone();
    let _fx = rt
        .effect(
            move || {
                for s in &reads {
                    black_box(s.get()?);
                }
                Ok(())
            },
            EffectOptions::immediate(),
        )
        .unwrap();

    let mut i = 0;
    c.bench_function("batch_10_writes", |b| {
        b.iter(|| {
            i += 1;
            rt.batch(|| {
                for s in &signals {
                    s.set(i)?;
                }
                Ok(())
            })
            .unwrap();
        })
    });
}

// =============================================================================
// STRESS BENCHMARKS
// =============================================================================

fn bench_many_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("fan_out");
    for count in [10usize, 100, 1000] {
        let rt = runtime();
        let s = rt.signal(0i32, SignalConfig::default());
        let effects: Vec<_> = (0..count)
            .map(|_| {
                let s = s.clone();
                rt.effect(
                    move || {
                        black_box(s.get()?);
                        Ok(())
                    },
                    EffectOptions::immediate(),
                )
                .unwrap()
            })
            .collect();

        let mut i = 0;
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                i += 1;
                s.set(i).unwrap();
                rt.advance_frame().unwrap();
            })
        });
        drop(effects);
    }
    group.finish();
}

criterion_group!(
    signal_benches,
    bench_signal_create,
    bench_signal_get,
    bench_signal_set_and_frame,
);

criterion_group!(
    computed_benches,
    bench_computed_get_cached,
    bench_computed_recompute,
);

criterion_group!(effect_benches, bench_effect_trigger, bench_batch_updates);

criterion_group!(stress_benches, bench_many_effects);

criterion_main!(signal_benches, computed_benches, effect_benches, stress_benches);
