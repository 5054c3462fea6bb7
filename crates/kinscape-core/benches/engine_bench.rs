use criterion::{BatchSize, Criterion, criterion_group, criterion_main};
use kinscape_core::{CultureRecord, Engine, EngineConfig, ScopeLevel};
use std::time::Duration;

fn build_records(count: usize) -> Vec<CultureRecord> {
    (0..count)
        .map(|i| {
            let prev = format!("Culture {}", i.saturating_sub(1));
            let next = format!("Culture {}", (i + 1) % count);
            CultureRecord {
                name: format!("Culture {i}"),
                kinships: vec![prev, next],
                affiliations: Vec::new(),
                knowledge: 0.5,
                openness: 0.5,
                language: 0.5,
                sides: 4,
                hue: (i as f32 * 37.0) % 360.0,
                scope: ScopeLevel::Local,
                interior_particles: 80,
                particles_per_edge: 3,
            }
        })
        .collect()
}

fn bench_engine_steps(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine_step");
    group.sample_size(20);
    group.warm_up_time(Duration::from_secs(2));
    group.measurement_time(Duration::from_secs(8));

    let steps = 32usize;
    for &cultures in &[8usize, 24, 48] {
        group.bench_function(format!("cultures_{cultures}_steps_{steps}"), |b| {
            let records = build_records(cultures);
            b.iter_batched(
                || {
                    let config = EngineConfig {
                        rng_seed: Some(0xBEEF),
                        ..EngineConfig::default()
                    };
                    let mut engine = Engine::new(config).expect("engine");
                    engine.load_dataset(&records);
                    engine
                },
                |mut engine| {
                    let focus = engine.culture_id("Culture 0").expect("culture");
                    engine.focus(focus).expect("focus");
                    for _ in 0..steps {
                        engine.step();
                    }
                    engine
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

criterion_group!(benches, bench_engine_steps);
criterion_main!(benches);
