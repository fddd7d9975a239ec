//! Benchmarks for collection ordering
//!
//! Run with: cargo bench --package ranking
//!
//! Uses a synthetic 5,000 product collection so no snapshot files are needed.

use catalog::Product;
use chrono::{Duration, TimeZone, Utc};
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ranking::{
    BatchJob, OrderingPipeline, PinnedSet, RandomPicker, RuleContext, RuleRegistry, StockPolicy,
    StrategyCatalog, rank_all,
};

fn synthetic_collection(size: u32) -> Vec<Product> {
    let origin = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    (0..size)
        .map(|i| {
            let created = origin + Duration::hours(i64::from(i % 1_700));
            Product::new(i.to_string())
                .with_created_at(created.to_rfc3339())
                .with_revenue(f64::from((i * 7_919) % 10_000))
                .with_sold_units(u64::from((i * 104_729) % 500))
                .with_inventory(i64::from(i % 40) - 5)
                .with_variants(4, f64::from(i % 5))
                .with_discount(f64::from(i % 60), f64::from(i % 25))
                .with_tags(if i % 17 == 0 { vec!["featured"] } else { vec!["regular"] })
        })
        .collect()
}

fn bench_balanced_strategy(c: &mut Criterion) {
    let registry = RuleRegistry::standard();
    let catalog = StrategyCatalog::builtin(&registry).unwrap();
    let products = synthetic_collection(5_000);
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

    let pipeline = OrderingPipeline::new(catalog.get("balanced").unwrap())
        .with_pinned(PinnedSet::new(["10", "20", "30"]))
        .with_stock_policy(StockPolicy {
            out_of_stock_down: true,
            pinned_out_of_stock_down: true,
        });

    c.bench_function("rank_balanced_5000", |b| {
        b.iter(|| {
            let mut picker = RandomPicker::seeded(7);
            let mut ctx = RuleContext::new(now, &mut picker);
            let result = pipeline.rank(black_box(products.clone()), &mut ctx);
            black_box(result)
        })
    });
}

fn bench_rank_all(c: &mut Criterion) {
    let registry = RuleRegistry::standard();
    let catalog = StrategyCatalog::builtin(&registry).unwrap();
    let products = synthetic_collection(2_000);
    let now = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

    let names: Vec<String> = catalog.names().into_iter().map(String::from).collect();

    c.bench_function("rank_all_builtin_strategies", |b| {
        b.iter(|| {
            let jobs: Vec<BatchJob> = names
                .iter()
                .enumerate()
                .map(|(i, name)| BatchJob {
                    key: name.clone(),
                    pipeline: OrderingPipeline::new(catalog.get(name).unwrap()),
                    products: products.clone(),
                    seed: i as u64,
                })
                .collect();
            black_box(rank_all(jobs, now))
        })
    });
}

criterion_group!(benches, bench_balanced_strategy, bench_rank_all);
criterion_main!(benches);
