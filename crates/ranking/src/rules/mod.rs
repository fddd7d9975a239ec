//! Capped-family ranking rules.
//!
//! Every rule follows the same three steps:
//! 1. Screen: extract the rule's key per record, dropping records that
//!    lack it, then apply the optional `days` lookback window
//! 2. Order: stable sort by key (or keep input order for pure filters)
//! 3. Cap: the first `capping` records are claimed, the rest handed back
//!
//! `Rule` is the closed set of rule kinds a bucket can hold.

pub mod discount;
pub mod lucky;
pub mod metric;
pub mod new_arrivals;
pub mod rfm;
pub mod tags;
pub mod threshold;

pub use discount::{DiscountKind, DiscountRule};
pub use lucky::{LUCKY_MENU, LuckyChoice, LuckyRule};
pub use metric::{Metric, MetricRule};
pub use new_arrivals::NewArrivalsRule;
pub use rfm::RfmRule;
pub use tags::TagRule;
pub use threshold::{Comparison, ThresholdRule};

use crate::context::RuleContext;
use crate::outcome::{Rejection, RejectionReason, RuleOutcome};
use crate::traits::RankingRule;
use catalog::{DateType, Product, lookback_start};
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use tracing::warn;

/// A resolved bucket rule.
#[derive(Debug, Clone, PartialEq)]
pub enum Rule {
    NewArrivals(NewArrivalsRule),
    Metric(MetricRule),
    Discount(DiscountRule),
    Tags(TagRule),
    InventoryThreshold(ThresholdRule),
    Rfm(RfmRule),
    FeelingLucky(LuckyRule),
    /// Placeholder for an unregistered rule name; claims nothing
    Noop { name: String },
}

impl Rule {
    pub fn is_noop(&self) -> bool {
        matches!(self, Rule::Noop { .. })
    }
}

impl RankingRule for Rule {
    fn name(&self) -> &str {
        match self {
            Rule::NewArrivals(rule) => rule.name(),
            Rule::Metric(rule) => rule.name(),
            Rule::Discount(rule) => rule.name(),
            Rule::Tags(rule) => rule.name(),
            Rule::InventoryThreshold(rule) => rule.name(),
            Rule::Rfm(rule) => rule.name(),
            Rule::FeelingLucky(rule) => rule.name(),
            Rule::Noop { name } => name,
        }
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        match self {
            Rule::NewArrivals(rule) => rule.apply(products, ctx),
            Rule::Metric(rule) => rule.apply(products, ctx),
            Rule::Discount(rule) => rule.apply(products, ctx),
            Rule::Tags(rule) => rule.apply(products, ctx),
            Rule::InventoryThreshold(rule) => rule.apply(products, ctx),
            Rule::Rfm(rule) => rule.apply(products, ctx),
            Rule::FeelingLucky(rule) => rule.apply(products, ctx),
            Rule::Noop { .. } => RuleOutcome::passthrough(products),
        }
    }
}

// =============================================================================
// Shared machinery
// =============================================================================

/// Sort keys the rules rank by
pub(crate) trait RankKey {
    fn rank_cmp(&self, other: &Self) -> Ordering;
}

impl RankKey for f64 {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.total_cmp(other)
    }
}

impl RankKey for i64 {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl RankKey for u64 {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

impl RankKey for DateTime<Utc> {
    fn rank_cmp(&self, other: &Self) -> Ordering {
        self.cmp(other)
    }
}

/// Pure filters carry no key
impl RankKey for () {
    fn rank_cmp(&self, _other: &Self) -> Ordering {
        Ordering::Equal
    }
}

/// Lookback window: records dated before `start` are out of window
#[derive(Debug, Clone, Copy)]
pub(crate) struct Lookback {
    pub date_type: DateType,
    pub start: DateTime<Utc>,
}

impl Lookback {
    pub fn new(days: Option<u32>, date_type: DateType, now: DateTime<Utc>) -> Option<Self> {
        days.map(|days| Self {
            date_type,
            start: lookback_start(now, days),
        })
    }
}

/// Records that passed validation, with their keys
pub(crate) struct Screened<K> {
    pub scored: Vec<(K, Product)>,
    pub unmatched: Vec<Product>,
    pub rejections: Vec<Rejection>,
}

/// Validate, window-filter and select records for one rule.
///
/// `key` returns `Some(sort key)` for a record the rule selects, `None`
/// for a valid record it does not select, or the reason the record
/// cannot be evaluated at all.
pub(crate) fn screen<K>(
    rule: &str,
    products: Vec<Product>,
    window: Option<Lookback>,
    mut key: impl FnMut(&Product) -> Result<Option<K>, RejectionReason>,
) -> Screened<K> {
    let mut screened = Screened {
        scored: Vec::with_capacity(products.len()),
        unmatched: Vec::new(),
        rejections: Vec::new(),
    };

    for product in products {
        let value = match key(&product) {
            Ok(value) => value,
            Err(reason) => {
                screened.rejections.push(reject(rule, &product, reason));
                continue;
            }
        };

        if let Some(window) = window {
            match product.timestamp(window.date_type) {
                Ok(ts) if ts >= window.start => {}
                Ok(_) => {
                    screened.unmatched.push(product);
                    continue;
                }
                Err(e) => {
                    screened.rejections.push(reject(rule, &product, e.into()));
                    continue;
                }
            }
        }

        match value {
            Some(value) => screened.scored.push((value, product)),
            None => screened.unmatched.push(product),
        }
    }

    screened
}

fn reject(rule: &str, product: &Product, reason: RejectionReason) -> Rejection {
    warn!(
        product_id = %product.id,
        rule,
        "Dropping record: {}",
        reason
    );
    Rejection {
        product_id: product.id.clone(),
        rule: rule.to_string(),
        reason,
    }
}

/// Required finite float field
pub(crate) fn finite(value: Option<f64>, field: &'static str) -> Result<f64, RejectionReason> {
    match value {
        Some(v) if v.is_finite() => Ok(v),
        Some(_) => Err(RejectionReason::InvalidValue(field)),
        None => Err(RejectionReason::MissingField(field)),
    }
}

/// Sort (when `high_to_low` is given) and cap screened records.
///
/// The sort is stable, so records with equal keys keep their input order.
pub(crate) fn finish<K: RankKey>(
    screened: Screened<K>,
    high_to_low: Option<bool>,
    capping: Option<usize>,
) -> RuleOutcome {
    let Screened {
        mut scored,
        unmatched,
        rejections,
    } = screened;

    match high_to_low {
        Some(true) => scored.sort_by(|a, b| b.0.rank_cmp(&a.0)),
        Some(false) => scored.sort_by(|a, b| a.0.rank_cmp(&b.0)),
        None => {}
    }

    let sorted: Vec<Product> = scored.into_iter().map(|(_, product)| product).collect();
    let (capped, remainder) = split_capped(sorted, capping);

    RuleOutcome {
        capped,
        remainder,
        unmatched,
        rejections,
        resolved_as: None,
    }
}

/// First `capping` records are claimed; no cap (or zero) claims them all.
pub fn split_capped(mut sorted: Vec<Product>, capping: Option<usize>) -> (Vec<Product>, Vec<Product>) {
    match capping {
        Some(n) if n > 0 => {
            let remainder = sorted.split_off(n.min(sorted.len()));
            (sorted, remainder)
        }
        _ => (sorted, Vec::new()),
    }
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::context::{FixedPicker, RuleContext};
    use crate::rules::LuckyChoice;
    use chrono::{DateTime, TimeZone, Utc};

    /// Fixed clock used across rule tests: 2024-03-10T00:00:00Z
    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
    }

    pub fn ids(products: &[catalog::Product]) -> Vec<&str> {
        products.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn with_context<T>(f: impl FnOnce(&mut RuleContext<'_>) -> T) -> T {
        let mut picker = FixedPicker(LuckyChoice::New);
        let mut ctx = RuleContext::new(now(), &mut picker);
        f(&mut ctx)
    }
}
