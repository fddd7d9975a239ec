//! Percentile promotion rules.
//!
//! Unlike the capped rules, a promotion rule returns the whole input
//! reordered: the top (or bottom) percentile of the records it can score
//! moves to the front in key order, and every other record follows in
//! its original order. Nothing is dropped.

use crate::outcome::{Rejection, RejectionReason};
use crate::rules::{default_true, finite};
use catalog::{Product, ProductId, lookback_start};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

/// The view of a product the promotion rules read
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionView {
    pub id: ProductId,
    pub listed_date: Result<DateTime<Utc>, RejectionReason>,
    pub revenue: Option<f64>,
    pub sales_velocity: Option<f64>,
    pub variant_availability: Option<f64>,
}

impl PromotionView {
    pub fn from_product(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            listed_date: product.listed_at().map_err(Into::into),
            revenue: product.total_revenue,
            sales_velocity: product.sales_velocity,
            variant_availability: product.variant_availability_ratio(),
        }
    }
}

/// Field a promotion rule ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromotionKey {
    Newest,
    Revenue,
    SalesVelocity,
    VariantAvailability,
}

impl PromotionKey {
    pub fn rule_name(self) -> &'static str {
        match self {
            PromotionKey::Newest => "promote_newest",
            PromotionKey::Revenue => "promote_revenue",
            PromotionKey::SalesVelocity => "promote_sales_velocity",
            PromotionKey::VariantAvailability => "promote_variant_availability",
        }
    }

    fn value(self, view: &PromotionView) -> Result<f64, RejectionReason> {
        match self {
            PromotionKey::Newest => view
                .listed_date
                .clone()
                .map(|listed| listed.timestamp_millis() as f64),
            PromotionKey::Revenue => finite(view.revenue, "revenue"),
            PromotionKey::SalesVelocity => finite(view.sales_velocity, "sales_velocity"),
            PromotionKey::VariantAvailability => {
                finite(view.variant_availability, "variant_availability")
            }
        }
    }
}

fn default_percentile() -> f64 {
    100.0
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PromotionParams {
    /// Share of the scored records to promote, in percent
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Promote the highest values (`true`) or the lowest
    #[serde(default = "default_true")]
    pub top: bool,
    #[serde(default)]
    pub days: Option<u32>,
}

impl Default for PromotionParams {
    fn default() -> Self {
        Self {
            percentile: default_percentile(),
            top: true,
            days: None,
        }
    }
}

impl PromotionParams {
    pub fn validate(&self) -> Result<(), String> {
        if !self.percentile.is_finite() || !(0.0..=100.0).contains(&self.percentile) {
            return Err(format!(
                "percentile must be between 0 and 100, got {}",
                self.percentile
            ));
        }
        Ok(())
    }
}

/// Result of a promotion: the full list, reordered
#[derive(Debug, Clone, Default)]
pub struct PromotionOutcome {
    pub ordered: Vec<Product>,
    pub promoted: usize,
    /// Records the rule could not score; they stay in the tail
    pub misses: Vec<Rejection>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PromotionRule {
    pub key: PromotionKey,
    pub params: PromotionParams,
}

/// Number of records to promote out of `len` scored ones
pub fn promotion_count(len: usize, percentile: f64) -> usize {
    if len == 0 {
        return 0;
    }
    let index = (len as f64 * percentile / 100.0).floor() as usize;
    index.clamp(1, len)
}

impl PromotionRule {
    pub fn new(key: PromotionKey, params: PromotionParams) -> Self {
        Self { key, params }
    }

    pub fn name(&self) -> &'static str {
        self.key.rule_name()
    }

    pub fn apply(&self, products: Vec<Product>, now: DateTime<Utc>) -> PromotionOutcome {
        let start = self.params.days.map(|days| lookback_start(now, days));
        let mut misses = Vec::new();
        let mut scored: Vec<(f64, usize)> = Vec::with_capacity(products.len());

        for (index, product) in products.iter().enumerate() {
            let view = PromotionView::from_product(product);
            let evaluated = self.key.value(&view).and_then(|value| match start {
                Some(start) => view.listed_date.clone().map(|listed| (listed >= start).then_some(value)),
                None => Ok(Some(value)),
            });
            match evaluated {
                Ok(Some(value)) => scored.push((value, index)),
                Ok(None) => {}
                Err(reason) => {
                    warn!(product_id = %view.id, rule = self.name(), "Cannot score record: {}", reason);
                    misses.push(Rejection {
                        product_id: view.id,
                        rule: self.name().to_string(),
                        reason,
                    });
                }
            }
        }

        if self.params.top {
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        } else {
            scored.sort_by(|a, b| a.0.total_cmp(&b.0));
        }
        let promoted = promotion_count(scored.len(), self.params.percentile);

        let mut slots: Vec<Option<Product>> = products.into_iter().map(Some).collect();
        let mut ordered = Vec::with_capacity(slots.len());
        for &(_, index) in scored.iter().take(promoted) {
            if let Some(product) = slots[index].take() {
                ordered.push(product);
            }
        }
        ordered.extend(slots.into_iter().flatten());

        debug!(
            "Promotion {} moved {} of {} records to the front",
            self.name(),
            promoted,
            ordered.len()
        );

        PromotionOutcome {
            ordered,
            promoted,
            misses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ids, now};

    fn velocity_catalog() -> Vec<Product> {
        vec![
            Product::new("a").with_sales_velocity(1.0),
            Product::new("b").with_sales_velocity(5.0),
            Product::new("c"),
            Product::new("d").with_sales_velocity(3.0),
            Product::new("e").with_sales_velocity(4.0),
        ]
    }

    #[test]
    fn test_promotion_count_formula() {
        assert_eq!(promotion_count(10, 100.0), 10);
        assert_eq!(promotion_count(10, 25.0), 2);
        assert_eq!(promotion_count(10, 5.0), 1);
        assert_eq!(promotion_count(3, 0.0), 1);
        assert_eq!(promotion_count(0, 50.0), 0);
    }

    #[test]
    fn test_top_percentile_moves_to_front() {
        let rule = PromotionRule::new(
            PromotionKey::SalesVelocity,
            PromotionParams {
                percentile: 50.0,
                ..Default::default()
            },
        );
        let outcome = rule.apply(velocity_catalog(), now());
        // four scored records, half of them promoted
        assert_eq!(outcome.promoted, 2);
        assert_eq!(ids(&outcome.ordered), vec!["b", "e", "a", "c", "d"]);
        assert_eq!(outcome.misses.len(), 1);
        assert_eq!(outcome.misses[0].product_id, "c");
    }

    #[test]
    fn test_bottom_percentile_and_default_everything() {
        let bottom = PromotionRule::new(
            PromotionKey::SalesVelocity,
            PromotionParams {
                percentile: 25.0,
                top: false,
                days: None,
            },
        );
        let outcome = bottom.apply(velocity_catalog(), now());
        assert_eq!(ids(&outcome.ordered), vec!["a", "b", "c", "d", "e"]);
        assert_eq!(outcome.promoted, 1);

        let everything = PromotionRule::new(PromotionKey::SalesVelocity, PromotionParams::default());
        let outcome = everything.apply(velocity_catalog(), now());
        assert_eq!(ids(&outcome.ordered), vec!["b", "e", "d", "a", "c"]);
    }

    #[test]
    fn test_newest_uses_published_then_created() {
        let products = vec![
            Product::new("old_publish")
                .with_created_at("2024-03-09T00:00:00Z")
                .with_published_at("2024-01-01T00:00:00Z"),
            Product::new("created_only").with_created_at("2024-02-01T00:00:00Z"),
        ];
        let rule = PromotionRule::new(PromotionKey::Newest, PromotionParams::default());
        let outcome = rule.apply(products, now());
        assert_eq!(ids(&outcome.ordered), vec!["created_only", "old_publish"]);
    }

    #[test]
    fn test_lookback_keeps_old_records_in_tail() {
        let products = vec![
            Product::new("old").with_revenue(100.0).with_created_at("2023-01-01"),
            Product::new("new").with_revenue(1.0).with_created_at("2024-03-08"),
        ];
        let rule = PromotionRule::new(
            PromotionKey::Revenue,
            PromotionParams {
                days: Some(7),
                ..Default::default()
            },
        );
        let outcome = rule.apply(products, now());
        assert_eq!(ids(&outcome.ordered), vec!["new", "old"]);
        assert!(outcome.misses.is_empty());
    }

    #[test]
    fn test_validate_percentile() {
        let mut params = PromotionParams::default();
        assert!(params.validate().is_ok());
        params.percentile = 150.0;
        assert!(params.validate().is_err());
        params.percentile = f64::NAN;
        assert!(params.validate().is_err());
    }
}
