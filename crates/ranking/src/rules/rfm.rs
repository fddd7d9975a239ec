//! RFM rule: recency, frequency and monetary value combined.

use super::{Lookback, default_true, finish, finite, screen};
use crate::context::RuleContext;
use crate::outcome::{RejectionReason, RuleOutcome};
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;

/// Ranks by `recency_score + total_sold_units + total_revenue`.
///
/// All three fields must be present and `created_at` must parse; the
/// computed score is written to `rfm_score` on every ranked record.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RfmRule {
    #[serde(default = "default_true")]
    pub high_to_low: bool,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
}

impl Default for RfmRule {
    fn default() -> Self {
        Self {
            high_to_low: true,
            days: None,
            capping: None,
        }
    }
}

fn rfm_score(product: &Product) -> Result<f64, RejectionReason> {
    let recency = finite(product.recency_score, "recency_score")?;
    let frequency = product
        .total_sold_units
        .ok_or(RejectionReason::MissingField("total_sold_units"))?;
    let monetary = finite(product.total_revenue, "total_revenue")?;
    product.timestamp(DateType::Created)?;
    Ok(recency + frequency as f64 + monetary)
}

impl RankingRule for RfmRule {
    fn name(&self) -> &str {
        "rfm"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let window = Lookback::new(self.days, DateType::Created, ctx.now);
        let mut screened = screen(self.name(), products, window, |product| {
            rfm_score(product).map(Some)
        });
        for (score, product) in screened.scored.iter_mut() {
            product.rfm_score = Some(*score);
        }
        finish(screened, Some(self.high_to_low), self.capping)
    }
}
