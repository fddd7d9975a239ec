//! Tag membership rule.

use super::{Lookback, finish, screen};
use crate::context::RuleContext;
use crate::outcome::{RejectionReason, RuleOutcome};
use crate::traits::RankingRule;
use catalog::{DateType, Product, TagSet};
use serde::Deserialize;

/// Selects products by tag membership, keeping input order.
///
/// With `include`, a product must carry at least one of those tags.
/// With `exclude`, it must carry none of them. Both may be combined.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagRule {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub days: Option<u32>,
    #[serde(default)]
    pub capping: Option<usize>,
    #[serde(default)]
    pub date_type: DateType,
}

impl TagRule {
    pub fn including<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: tags.into_iter().map(Into::into).collect(),
            exclude: Vec::new(),
            days: None,
            capping: None,
            date_type: DateType::Created,
        }
    }

    pub fn excluding<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            include: Vec::new(),
            exclude: tags.into_iter().map(Into::into).collect(),
            days: None,
            capping: None,
            date_type: DateType::Created,
        }
    }

    /// A tag rule with no tags at all selects nothing meaningful.
    pub fn validate(&self) -> Result<(), String> {
        if self.include.is_empty() && self.exclude.is_empty() {
            return Err("either include or exclude must list at least one tag".to_string());
        }
        Ok(())
    }
}

impl RankingRule for TagRule {
    fn name(&self) -> &str {
        "tags"
    }

    fn apply(&self, products: Vec<Product>, ctx: &mut RuleContext<'_>) -> RuleOutcome {
        let include = TagSet::new(&self.include);
        let exclude = TagSet::new(&self.exclude);
        let window = Lookback::new(self.days, self.date_type, ctx.now);

        let screened = screen(self.name(), products, window, |product| {
            if product.tags.is_none() {
                return Err(RejectionReason::MissingField("tags"));
            }
            let included = include.is_empty() || product.has_any_tag(&include);
            let excluded = product.has_any_tag(&exclude);
            Ok((included && !excluded).then_some(()))
        });
        finish(screened, None, self.capping)
    }
}
