//! Inventory threshold rule.

use super::{Lookback, finish, screen};
use crate::context::RuleContext;
use crate::outcome::{RejectionReason, RuleOutcome};
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;

/// Comparison applied between a product's inventory and the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum Comparison {
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "==")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
}

impl Comparison {
    pub fn holds(self, value: i64, threshold: i64) -> bool {
        match self {
            Comparison::GreaterThan => value > threshold,
            Comparison::LessThan => value < threshold,
            Comparison::Equal => value == threshold,
            Comparison::NotEqual => value != threshold,
        }
    }
}

/// Selects products whose inventory satisfies `operator threshold`,
/// keeping input order.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ThresholdRule {
    pub operator: Comparison,
    pub threshold: i64,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
    #[serde(default)]
    pub date_type: DateType,
}

impl ThresholdRule {
    pub fn new(operator: Comparison, threshold: i64) -> Self {
        Self {
            operator,
            threshold,
            days: None,
            capping: None,
            date_type: DateType::Created,
        }
    }
}

impl RankingRule for ThresholdRule {
    fn name(&self) -> &str {
        "inventory_threshold"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let window = Lookback::new(self.days, self.date_type, ctx.now);
        let screened = screen(self.name(), products, window, |product| {
            let inventory = product
                .total_inventory
                .ok_or(RejectionReason::MissingField("total_inventory"))?;
            Ok(self.operator.holds(inventory, self.threshold).then_some(()))
        });
        finish(screened, None, self.capping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::test_support::{ids, with_context};

    fn catalog() -> Vec<Product> {
        vec![
            Product::new("a").with_inventory(0),
            Product::new("b").with_inventory(10),
            Product::new("c").with_inventory(5),
            Product::new("d").with_inventory(20),
        ]
    }

    #[test]
    fn test_all_operators() {
        let cases = [
            (Comparison::GreaterThan, vec!["b", "d"]),
            (Comparison::LessThan, vec!["a", "c"]),
            (Comparison::Equal, vec!["c"]),
            (Comparison::NotEqual, vec!["a", "b", "d"]),
        ];
        for (operator, expected) in cases {
            let rule = ThresholdRule::new(operator, 5);
            let outcome = with_context(|ctx| rule.apply(catalog(), ctx));
            assert_eq!(ids(&outcome.capped), expected, "operator {operator:?}");
            assert_eq!(outcome.capped.len() + outcome.unmatched.len(), 4);
        }
    }

    #[test]
    fn test_operator_wire_names() {
        let op: Comparison = serde_json::from_str(r#""!=""#).unwrap();
        assert_eq!(op, Comparison::NotEqual);
        assert!(serde_json::from_str::<Comparison>(r#"">=""#).is_err());
    }

    #[test]
    fn test_missing_inventory_rejected() {
        let rule = ThresholdRule::new(Comparison::GreaterThan, 0);
        let outcome = with_context(|ctx| rule.apply(vec![Product::new("x")], ctx));
        assert!(outcome.capped.is_empty());
        assert_eq!(outcome.rejections.len(), 1);
    }
}
