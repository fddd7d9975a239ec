//! Ranking many collections at once.
//!
//! Collection runs share nothing mutable, so a batch is a plain
//! data-parallel map. Each job carries its own seed so the feeling-lucky
//! rule stays reproducible regardless of scheduling order.

use crate::context::{RandomPicker, RuleContext};
use crate::ordering::{OrderingPipeline, RunResult};
use catalog::Product;
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, instrument};

/// One collection snapshot to rank
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Caller's label for the job (e.g. the collection id)
    pub key: String,
    pub pipeline: OrderingPipeline,
    pub products: Vec<Product>,
    pub seed: u64,
}

/// Rank every job in parallel, returning results in job order.
#[instrument(skip(jobs), fields(jobs = jobs.len()))]
pub fn rank_all(jobs: Vec<BatchJob>, now: DateTime<Utc>) -> Vec<(String, RunResult)> {
    jobs.into_par_iter()
        .map(|job| {
            let mut picker = RandomPicker::seeded(job.seed);
            let mut ctx = RuleContext::new(now, &mut picker);
            let result = job.pipeline.rank(job.products, &mut ctx);
            debug!("Batch job {} ranked {} products", job.key, result.ordered.len());
            (job.key, result)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::now;
    use crate::rules::{LuckyRule, Rule};
    use crate::strategy::Strategy;
    use std::sync::Arc;

    fn job(key: &str, seed: u64) -> BatchJob {
        let strategy = Strategy::new("lucky", vec![Rule::FeelingLucky(LuckyRule::default())]);
        let products = (0..20u32)
            .map(|i| {
                Product::new(i.to_string())
                    .with_created_at(format!("2024-02-{:02}T00:00:00Z", i + 1))
                    .with_revenue(f64::from((i * 7) % 11))
                    .with_inventory(i64::from((i * 3) % 5))
                    .with_sold_units(u64::from((i * 5) % 13))
                    .with_variants(2, f64::from(i % 3))
            })
            .collect();
        BatchJob {
            key: key.to_string(),
            pipeline: OrderingPipeline::new(Arc::new(strategy)),
            products,
            seed,
        }
    }

    #[test]
    fn test_results_follow_job_order() {
        let jobs: Vec<BatchJob> = (0..8).map(|i| job(&format!("c{i}"), i)).collect();
        let results = rank_all(jobs, now());
        let keys: Vec<&str> = results.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["c0", "c1", "c2", "c3", "c4", "c5", "c6", "c7"]);
        for (_, result) in &results {
            assert_eq!(result.ordered.len(), 20);
        }
    }

    #[test]
    fn test_same_seed_same_order() {
        let first = rank_all(vec![job("a", 42)], now());
        let second = rank_all(vec![job("a", 42)], now());
        assert_eq!(first[0].1.ordered_ids(), second[0].1.ordered_ids());
        assert_eq!(first[0].1.report.buckets, second[0].1.report.buckets);
    }
}
