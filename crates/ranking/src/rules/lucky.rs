//! "Feeling lucky": one of five rules, chosen at run time.

use super::metric::{Metric, MetricRule, SortParams};
use super::new_arrivals::NewArrivalsRule;
use crate::context::RuleContext;
use crate::outcome::RuleOutcome;
use crate::traits::RankingRule;
use catalog::{DateType, Product};
use serde::Deserialize;
use tracing::info;

/// Rules the lucky rule can fall back to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuckyChoice {
    New,
    Revenue,
    Inventory,
    Bestsellers,
    VariantAvailability,
}

/// The fixed menu, in pick order
pub const LUCKY_MENU: [LuckyChoice; 5] = [
    LuckyChoice::New,
    LuckyChoice::Revenue,
    LuckyChoice::Inventory,
    LuckyChoice::Bestsellers,
    LuckyChoice::VariantAvailability,
];

impl LuckyChoice {
    pub fn rule_name(self) -> &'static str {
        match self {
            LuckyChoice::New => "new",
            LuckyChoice::Revenue => Metric::Revenue.rule_name(),
            LuckyChoice::Inventory => Metric::Inventory.rule_name(),
            LuckyChoice::Bestsellers => Metric::UnitsSold.rule_name(),
            LuckyChoice::VariantAvailability => Metric::VariantAvailability.rule_name(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LuckyRule {
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
}

impl LuckyRule {
    fn run(&self, choice: LuckyChoice, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let metric = match choice {
            LuckyChoice::New => {
                let rule = NewArrivalsRule {
                    date_type: DateType::Created,
                    high_to_low: true,
                    days: self.days,
                    capping: self.capping,
                };
                return rule.apply(products, ctx);
            }
            LuckyChoice::Revenue => Metric::Revenue,
            LuckyChoice::Inventory => Metric::Inventory,
            LuckyChoice::Bestsellers => Metric::UnitsSold,
            LuckyChoice::VariantAvailability => Metric::VariantAvailability,
        };
        let params = SortParams {
            high_to_low: true,
            days: self.days,
            capping: self.capping,
            date_type: DateType::Created,
        };
        MetricRule::new(metric, params).apply(products, ctx)
    }
}

impl RankingRule for LuckyRule {
    fn name(&self) -> &str {
        "feeling_lucky"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let choice = ctx.picker.pick(&LUCKY_MENU);
        info!("Feeling lucky picked rule {}", choice.rule_name());

        let mut outcome = self.run(choice, products, ctx);
        outcome.resolved_as = Some(choice.rule_name());
        outcome
    }
}
