//! Single-metric rules: revenue, bestsellers, inventory, variant availability.

use super::{Lookback, default_true, finish, finite, screen};
use crate::context::RuleContext;
use crate::outcome::{RejectionReason, RuleOutcome};
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;

/// The numeric field a `MetricRule` ranks by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Revenue,
    UnitsSold,
    Inventory,
    VariantAvailability,
}

impl Metric {
    pub fn rule_name(self) -> &'static str {
        match self {
            Metric::Revenue => "revenue_generated",
            Metric::UnitsSold => "bestsellers",
            Metric::Inventory => "inventory",
            Metric::VariantAvailability => "variant_availability",
        }
    }

    fn key(self, product: &Product) -> Result<f64, RejectionReason> {
        match self {
            Metric::Revenue => finite(product.total_revenue, "total_revenue"),
            Metric::UnitsSold => product
                .total_sold_units
                .map(|units| units as f64)
                .ok_or(RejectionReason::MissingField("total_sold_units")),
            Metric::Inventory => product
                .total_inventory
                .map(|inventory| inventory as f64)
                .ok_or(RejectionReason::MissingField("total_inventory")),
            Metric::VariantAvailability => {
                let available = finite(product.variant_availability, "variant_availability")?;
                match product.variant_count {
                    Some(0) => Err(RejectionReason::InvalidValue("variant_count")),
                    Some(count) => Ok(available / f64::from(count)),
                    None => Err(RejectionReason::MissingField("variant_count")),
                }
            }
        }
    }
}

/// Parameters shared by the single-metric rules
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SortParams {
    #[serde(default = "default_true")]
    pub high_to_low: bool,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
    /// Date the lookback window compares against
    #[serde(default)]
    pub date_type: DateType,
}

impl Default for SortParams {
    fn default() -> Self {
        Self {
            high_to_low: true,
            days: None,
            capping: None,
            date_type: DateType::Created,
        }
    }
}

/// Ranks products by one numeric field.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRule {
    pub metric: Metric,
    pub params: SortParams,
}

impl MetricRule {
    pub fn new(metric: Metric, params: SortParams) -> Self {
        Self { metric, params }
    }
}

impl RankingRule for MetricRule {
    fn name(&self) -> &str {
        self.metric.rule_name()
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let window = Lookback::new(self.params.days, self.params.date_type, ctx.now);
        let screened = screen(self.name(), products, window, |product| {
            self.metric.key(product).map(Some)
        });
        finish(screened, Some(self.params.high_to_low), self.params.capping)
    }
}
