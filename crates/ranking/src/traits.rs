//! Core traits for the ranking rules.

use crate::context::RuleContext;
use crate::outcome::RuleOutcome;
use catalog::Product;

/// A capped-family ranking rule.
///
/// Rules take ownership of the working set and split it into the records
/// they claim (`capped`) and the records they hand back. A rule never
/// fails the batch: records it cannot score are returned as rejections.
pub trait RankingRule: Send + Sync {
    /// Wire name of this rule (for logging and reports)
    fn name(&self) -> &str;

    /// Apply this rule to the working set.
    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome;
}
