//! Discount rule: deepest markdowns first.

use super::{Lookback, default_true, finish, finite, screen};
use crate::context::RuleContext;
use crate::outcome::RuleOutcome;
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;

/// Which discount figure to rank by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscountKind {
    #[default]
    Percentage,
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DiscountRule {
    #[serde(default)]
    pub kind: DiscountKind,
    #[serde(default = "default_true")]
    pub high_to_low: bool,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
    #[serde(default)]
    pub date_type: DateType,
}

impl Default for DiscountRule {
    fn default() -> Self {
        Self {
            kind: DiscountKind::Percentage,
            high_to_low: true,
            days: None,
            capping: None,
            date_type: DateType::Created,
        }
    }
}

impl RankingRule for DiscountRule {
    fn name(&self) -> &str {
        "discount"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let window = Lookback::new(self.days, self.date_type, ctx.now);
        let screened = screen(self.name(), products, window, |product| {
            let value = match self.kind {
                DiscountKind::Percentage => finite(product.discount_percentage, "discount_percentage"),
                DiscountKind::Absolute => finite(product.discount_absolute, "discount_absolute"),
            };
            value.map(Some)
        });
        finish(screened, Some(self.high_to_low), self.capping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ids, with_context};

    #[test]
    fn test_percentage_and_absolute() {
        let products = vec![
            Product::new("cheap_item").with_discount(50.0, 5.0),
            Product::new("expensive_item").with_discount(10.0, 100.0),
            Product::new("full_price"),
        ];

        let outcome = with_context(|ctx| DiscountRule::default().apply(products.clone(), ctx));
        assert_eq!(ids(&outcome.capped), vec!["cheap_item", "expensive_item"]);
        assert_eq!(outcome.rejections.len(), 1);

        let absolute = DiscountRule {
            kind: DiscountKind::Absolute,
            capping: Some(1),
            ..Default::default()
        };
        let outcome = with_context(|ctx| absolute.apply(products, ctx));
        assert_eq!(ids(&outcome.capped), vec!["expensive_item"]);
        assert_eq!(ids(&outcome.remainder), vec!["cheap_item"]);
    }
}
