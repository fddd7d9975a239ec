//! Recency rule: newest products first.

use super::{Lookback, default_true, finish, screen};
use crate::context::RuleContext;
use crate::outcome::RuleOutcome;
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;

/// Orders products by one of their dates.
///
/// `date_type` selects created, published or updated; it is also the
/// date the `days` lookback compares against.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewArrivalsRule {
    #[serde(default)]
    pub date_type: DateType,
    #[serde(default = "default_true")]
    pub high_to_low: bool,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
}

impl Default for NewArrivalsRule {
    fn default() -> Self {
        Self {
            date_type: DateType::Created,
            high_to_low: true,
            days: None,
            capping: None,
        }
    }
}

impl RankingRule for NewArrivalsRule {
    fn name(&self) -> &str {
        "new"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let window = Lookback::new(self.days, self.date_type, ctx.now);
        let screened = screen(self.name(), products, window, |product| {
            product.timestamp(self.date_type).map(Some).map_err(Into::into)
        });
        finish(screened, Some(self.high_to_low), self.capping)
    }
}
