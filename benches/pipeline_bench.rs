//! Benchmarks for filter compilation and grouped loading
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use gridquery::pipeline::{compile_filter, filter_pipeline};
use gridquery::query::{GroupLevelSpec, LoadSpec, QueryExecutor};
use gridquery::store::MemoryCollection;
use serde_json::{json, Value};
use std::sync::Arc;

fn create_test_rows(count: i64) -> Vec<Value> {
    (0..count)
        .map(|i| {
            json!({
                "_id": i,
                "int1": i % 10,
                "int2": i % 7,
                "date": {"$date": 1_483_228_800_000i64 + i * 86_400_000},
            })
        })
        .collect()
}

fn bench_filter_compile(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    let simple = json!(["int1", "=", 3]);
    let chain = json!([
        ["int1", ">", 2],
        ["int2", "<", 5],
        "and",
        ["date.month", "=", 3],
        ["name", "contains", "x"]
    ]);
    let negated = json!(["!", [["int1", "=", 3], "or", ["date.quarter", "=", 2]]]);

    group.bench_function("simple", |b| b.iter(|| compile_filter(black_box(&simple), true)));
    group.bench_function("chain_with_nested", |b| {
        b.iter(|| filter_pipeline(black_box(Some(&chain)), 60, true))
    });
    group.bench_function("negated_or", |b| {
        b.iter(|| filter_pipeline(black_box(Some(&negated)), 0, true))
    });

    group.finish();
}

fn bench_grouped_load(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let mut group = c.benchmark_group("grouped_load");

    for size in [100, 1000] {
        let store = MemoryCollection::from_values(create_test_rows(size)).unwrap();
        let executor = QueryExecutor::new(Arc::new(store));
        let spec = LoadSpec::builder()
            .group_by(GroupLevelSpec::new("date").interval("month"))
            .group_by(GroupLevelSpec::new("int1").expanded())
            .group_summary("sum", Some("int2"))
            .require_total_count()
            .build();

        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(format!("two_levels_{}", size), |b| {
            b.iter(|| runtime.block_on(executor.load(black_box(&spec))).unwrap())
        });
    }

    group.finish();
}

criterion_group!(benches, bench_filter_compile, bench_grouped_load);
criterion_main!(benches);
