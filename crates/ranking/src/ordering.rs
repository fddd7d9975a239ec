//! The OrderingPipeline turns one collection snapshot into a final order.
//!
//! ## Precedence
//! 1. In-stock pinned products
//! 2. Boosted products (tag matches), in input order
//! 3. Each bucket's claimed products, bucket by bucket
//! 4. Whatever no bucket claimed (reordered by the promotion rule, if any)
//! 5. Buried products (tag matches), in input order
//! 6. Out-of-stock pinned, then out-of-stock non-pinned products
//!
//! Buried products are set aside before any bucket runs, so buckets only
//! ever see products that are neither boosted nor buried. A product that
//! matches both tag sets is boosted.

use crate::context::RuleContext;
use crate::outcome::Rejection;
use crate::segregation::{PinnedSet, StockPolicy, segregate};
use crate::strategy::Strategy;
use crate::traits::RankingRule;
use catalog::{Product, ProductId};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// A product's final 1-based position
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub product_id: ProductId,
    pub position: usize,
}

/// What one bucket did during a run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BucketReport {
    pub rule_name: String,
    /// Concrete rule applied, when it differs (feeling lucky)
    pub resolved_as: Option<String>,
    /// Configured bucket cap, if any
    pub cap: Option<usize>,
    pub input: usize,
    pub claimed: usize,
    pub rejected: usize,
}

/// Side-channel counters for one run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunReport {
    pub strategy: String,
    pub input: usize,
    /// Ids seen more than once; later occurrences were discarded
    pub duplicates: Vec<ProductId>,
    pub pinned: usize,
    pub boosted: usize,
    pub buried: usize,
    pub out_of_stock: usize,
    pub buckets: Vec<BucketReport>,
    /// Buckets whose rule name is not registered
    pub skipped_buckets: Vec<String>,
    /// Records dropped for failing a rule's validation
    pub rejections: Vec<Rejection>,
    /// Records the promotion rule could not score (kept, not dropped)
    pub promotion_misses: Vec<Rejection>,
}

impl RunReport {
    /// Number of records missing from the output because of validation
    pub fn dropped(&self) -> usize {
        self.rejections.len()
    }
}

/// Final order of one run
#[derive(Debug, Clone)]
pub struct RunResult {
    pub ordered: Vec<Product>,
    pub report: RunReport,
}

impl RunResult {
    pub fn ordered_ids(&self) -> Vec<ProductId> {
        self.ordered.iter().map(|p| p.id.clone()).collect()
    }

    pub fn placements(&self) -> Vec<Placement> {
        self.ordered
            .iter()
            .enumerate()
            .map(|(index, product)| Placement {
                product_id: product.id.clone(),
                position: index + 1,
            })
            .collect()
    }

    /// 1-based position of a product, if it is in the output
    pub fn position_of(&self, product_id: &str) -> Option<usize> {
        self.ordered
            .iter()
            .position(|p| p.id == product_id)
            .map(|index| index + 1)
    }
}

/// Ranks one collection with one strategy.
///
/// ## Usage
/// ```ignore
/// let pipeline = OrderingPipeline::new(catalog.get("balanced")?)
///     .with_pinned(PinnedSet::new(["42"]))
///     .with_stock_policy(StockPolicy { out_of_stock_down: true, ..Default::default() });
///
/// let mut picker = RandomPicker::from_entropy();
/// let mut ctx = RuleContext::new(Utc::now(), &mut picker);
/// let result = pipeline.rank(products, &mut ctx);
/// ```
#[derive(Debug, Clone)]
pub struct OrderingPipeline {
    strategy: Arc<Strategy>,
    pinned: PinnedSet,
    stock: StockPolicy,
}

impl OrderingPipeline {
    pub fn new(strategy: Arc<Strategy>) -> Self {
        Self {
            strategy,
            pinned: PinnedSet::default(),
            stock: StockPolicy::default(),
        }
    }

    pub fn with_pinned(mut self, pinned: PinnedSet) -> Self {
        self.pinned = pinned;
        self
    }

    pub fn with_stock_policy(mut self, stock: StockPolicy) -> Self {
        self.stock = stock;
        self
    }

    pub fn strategy(&self) -> &Strategy {
        &self.strategy
    }

    /// Run the full pipeline over one snapshot.
    pub fn rank(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RunResult {
        let strategy = &self.strategy;
        let mut report = RunReport {
            strategy: strategy.name.clone(),
            input: products.len(),
            ..RunReport::default()
        };

        let products = dedupe(products, &mut report.duplicates);
        let segregated = segregate(products, &self.pinned, self.stock);
        report.pinned = segregated.in_stock_pinned.len() + segregated.out_of_stock_pinned.len();
        report.out_of_stock =
            segregated.out_of_stock_pinned.len() + segregated.out_of_stock_non_pinned.len();

        let mut ordered: Vec<Product> = Vec::with_capacity(segregated.total());
        ordered.extend(segregated.in_stock_pinned);

        let (boosted, rest): (Vec<Product>, Vec<Product>) = segregated
            .working_set
            .into_iter()
            .partition(|p| p.has_any_tag(&strategy.boost_tags));
        let (buried, mut working): (Vec<Product>, Vec<Product>) =
            rest.into_iter().partition(|p| p.has_any_tag(&strategy.bury_tags));
        report.boosted = boosted.len();
        report.buried = buried.len();
        ordered.extend(boosted);

        for bucket in &strategy.buckets {
            let rule_name = bucket.rule.name().to_string();
            if bucket.rule.is_noop() {
                tracing::warn!("Skipping bucket with unregistered rule {}", rule_name);
                report.skipped_buckets.push(rule_name);
                continue;
            }

            let input = working.len();
            tracing::debug!("Applying rule: {} (input count: {})", rule_name, input);
            let outcome = bucket.rule.apply(working, ctx);
            tracing::debug!(
                "Rule applied: {} (claimed: {}, remainder: {}, unmatched: {})",
                rule_name,
                outcome.capped.len(),
                outcome.remainder.len(),
                outcome.unmatched.len()
            );

            report.buckets.push(BucketReport {
                rule_name,
                resolved_as: outcome.resolved_as.map(str::to_string),
                cap: bucket.cap,
                input,
                claimed: outcome.capped.len(),
                rejected: outcome.rejections.len(),
            });
            report.rejections.extend(outcome.rejections);

            ordered.extend(outcome.capped);
            working = outcome.remainder;
            working.extend(outcome.unmatched);
        }

        match &strategy.promotion {
            Some(promotion) => {
                let promoted = promotion.apply(working, ctx.now);
                report.promotion_misses = promoted.misses;
                ordered.extend(promoted.ordered);
            }
            None => ordered.extend(working),
        }

        ordered.extend(buried);
        ordered.extend(segregated.out_of_stock_pinned);
        ordered.extend(segregated.out_of_stock_non_pinned);

        if report.dropped() > 0 {
            tracing::warn!(
                "Strategy {} dropped {} of {} products that failed validation",
                strategy.name,
                report.dropped(),
                report.input
            );
        }
        tracing::debug!(
            "Ranked {} products with strategy {} ({} pinned, {} boosted, {} buried)",
            ordered.len(),
            strategy.name,
            report.pinned,
            report.boosted,
            report.buried
        );

        RunResult { ordered, report }
    }
}

/// Keep the first occurrence of every id.
fn dedupe(products: Vec<Product>, duplicates: &mut Vec<ProductId>) -> Vec<Product> {
    let mut seen: HashSet<ProductId> = HashSet::with_capacity(products.len());
    let mut unique = Vec::with_capacity(products.len());
    for product in products {
        if seen.insert(product.id.clone()) {
            unique.push(product);
        } else {
            tracing::warn!("Discarding duplicate product {}", product.id);
            duplicates.push(product.id);
        }
    }
    unique
}
