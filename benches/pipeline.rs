use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};
use polars::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};

use token_viewer::chart::{build_chart, project};
use token_viewer::config::ColumnRoles;
use token_viewer::normalize::normalize;
use token_viewer::selection::{default_selection, entity_universe, Selection};

const TOKENS: usize = 64;

fn gen_table(n: usize, seed: u64) -> DataFrame {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut name: Vec<String> = Vec::with_capacity(n);
    let mut ts: Vec<i64> = Vec::with_capacity(n);
    let mut grad: Vec<Option<f64>> = Vec::with_capacity(n);
    let mut t: i64 = 1_700_000_000_000_000_000; // epoch ns base
    for _ in 0..n {
        name.push(format!("tok{:02}", rng.gen::<u32>() as usize % TOKENS));
        t += (rng.gen::<u32>() % 60_000) as i64 * 1_000_000;
        ts.push(t);
        // ~2% missing metric values
        grad.push(if rng.gen::<u32>() % 50 == 0 { None } else { Some(rng.gen::<f64>() * 100.0) });
    }
    let raw = DataFrame::new(vec![
        Series::new("name".into(), name).into_column(),
        Series::new("timestamp".into(), ts).into_column(),
        Series::new("grad_pert".into(), grad).into_column(),
    ])
    .expect("df build");
    normalize(&raw, &ColumnRoles::default()).expect("normalize")
}

fn bench_pipeline(c: &mut Criterion) {
    let roles = ColumnRoles::default();
    let ns = [10_000usize, 100_000usize];
    let mut group = c.benchmark_group("pipeline");
    group.sampling_mode(SamplingMode::Flat);
    group.sample_size(20);

    for &n in &ns {
        let df = gen_table(n, 0xABCD_1234);
        let universe = entity_universe(&df, &roles.entity).expect("universe");
        let selection: Selection = default_selection(&universe, 5);

        group.throughput(Throughput::Elements(n as u64));
        group.bench_with_input(BenchmarkId::new("project_default_selection", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let _out = project(&df, &roles, &selection).expect("project");
            });
        });

        group.bench_with_input(BenchmarkId::new("build_chart_default_selection", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let _out = build_chart(&df, &selection, &roles).expect("chart");
            });
        });

        group.bench_with_input(BenchmarkId::new("entity_universe", n.to_string()), &n, |b, _| {
            b.iter(|| {
                let _u = entity_universe(&df, &roles.entity).expect("universe");
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_pipeline);
criterion_main!(benches);
