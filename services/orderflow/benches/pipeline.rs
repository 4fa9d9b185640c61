//! Criterion benchmarks for the footprint hot path.
//!
//! 1. Print processing (validate, classify, route, update, signals, CVD)
//! 2. Snapshot building at default depth

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use orderflow::ingestion::RawPrint;
use orderflow::synthetic::{SyntheticConfig, SyntheticFeed};
use orderflow::{FootprintConfig, FootprintPipeline};
use types::ids::InstrumentId;

fn prints(n: usize) -> Vec<RawPrint> {
    SyntheticFeed::new(SyntheticConfig::default(), 7).take(n).collect()
}

fn bench_process(c: &mut Criterion) {
    let mut group = c.benchmark_group("process");
    for n in [1_000usize, 10_000] {
        let input = prints(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &input, |b, input| {
            b.iter(|| {
                let mut pipeline =
                    FootprintPipeline::new(InstrumentId::new("BENCH"), FootprintConfig::default())
                        .unwrap();
                for print in input {
                    let _ = black_box(pipeline.process(print));
                }
                black_box(pipeline.cvd())
            })
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut pipeline =
        FootprintPipeline::new(InstrumentId::new("BENCH"), FootprintConfig::default()).unwrap();
    for print in prints(20_000) {
        let _ = pipeline.process(&print);
    }
    c.bench_function("snapshot_depth_50", |b| b.iter(|| black_box(pipeline.snapshot())));
}

criterion_group!(benches, bench_process, bench_snapshot);
criterion_main!(benches);
