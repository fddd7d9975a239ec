//! Rule registry: wire names to typed rules.
//!
//! The registry is an immutable value built once and passed to whatever
//! resolves strategy configurations. Resolution is the only place bucket
//! parameters are interpreted.

use crate::error::{ConfigurationError, Result};
use crate::promotion::{PromotionKey, PromotionParams, PromotionRule};
use crate::rules::metric::SortParams;
use crate::rules::{
    DiscountRule, LuckyRule, Metric, MetricRule, NewArrivalsRule, RfmRule, Rule, TagRule,
    ThresholdRule,
};
use crate::strategy::BucketConfig;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// The family and kind a rule name refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKind {
    NewArrivals,
    Metric(Metric),
    Discount,
    Tags,
    InventoryThreshold,
    Rfm,
    FeelingLucky,
    Promotion(PromotionKey),
}

impl RuleKind {
    pub fn is_promotion(self) -> bool {
        matches!(self, RuleKind::Promotion(_))
    }
}

#[derive(Debug, Clone)]
pub struct RuleRegistry {
    kinds: HashMap<&'static str, RuleKind>,
}

impl RuleRegistry {
    /// Registry holding every rule this crate implements
    pub fn standard() -> Self {
        let mut kinds = HashMap::new();
        kinds.insert("new", RuleKind::NewArrivals);
        for metric in [
            Metric::Revenue,
            Metric::UnitsSold,
            Metric::Inventory,
            Metric::VariantAvailability,
        ] {
            kinds.insert(metric.rule_name(), RuleKind::Metric(metric));
        }
        kinds.insert("discount", RuleKind::Discount);
        kinds.insert("tags", RuleKind::Tags);
        kinds.insert("inventory_threshold", RuleKind::InventoryThreshold);
        kinds.insert("rfm", RuleKind::Rfm);
        kinds.insert("feeling_lucky", RuleKind::FeelingLucky);
        for key in [
            PromotionKey::Newest,
            PromotionKey::Revenue,
            PromotionKey::SalesVelocity,
            PromotionKey::VariantAvailability,
        ] {
            kinds.insert(key.rule_name(), RuleKind::Promotion(key));
        }
        Self { kinds }
    }

    pub fn kind(&self, name: &str) -> Option<RuleKind> {
        self.kinds.get(name).copied()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.kinds.keys().copied().collect();
        names.sort_unstable();
        names
    }

    /// Turn a bucket configuration into a capped-family rule.
    ///
    /// Unknown names resolve to `Rule::Noop` with a warning. A bucket
    /// `cap` overrides the `capping` parameter.
    pub fn resolve_bucket(&self, bucket: &BucketConfig) -> Result<Rule> {
        let name = bucket.rule_name.as_str();
        let Some(kind) = self.kind(name) else {
            warn!("Unknown rule {:?}; bucket will contribute nothing", name);
            return Ok(Rule::Noop {
                name: name.to_string(),
            });
        };

        let params = &bucket.parameters;
        let rule = match kind {
            RuleKind::NewArrivals => {
                let mut rule: NewArrivalsRule = parse_params(name, params)?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::NewArrivals(rule)
            }
            RuleKind::Metric(metric) => {
                let mut sort: SortParams = parse_params(name, params)?;
                sort.capping = bucket.cap.or(sort.capping);
                Rule::Metric(MetricRule::new(metric, sort))
            }
            RuleKind::Discount => {
                let mut rule: DiscountRule = parse_params(name, params)?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::Discount(rule)
            }
            RuleKind::Tags => {
                let mut rule: TagRule = parse_params(name, params)?;
                rule.validate().map_err(|reason| invalid(name, reason))?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::Tags(rule)
            }
            RuleKind::InventoryThreshold => {
                let mut rule: ThresholdRule = parse_params(name, params)?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::InventoryThreshold(rule)
            }
            RuleKind::Rfm => {
                let mut rule: RfmRule = parse_params(name, params)?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::Rfm(rule)
            }
            RuleKind::FeelingLucky => {
                let mut rule: LuckyRule = parse_params(name, params)?;
                rule.capping = bucket.cap.or(rule.capping);
                Rule::FeelingLucky(rule)
            }
            RuleKind::Promotion(_) => {
                return Err(ConfigurationError::PromotionRuleInBucket {
                    rule: name.to_string(),
                });
            }
        };
        Ok(rule)
    }

    /// Turn a promotion slot configuration into a percentile rule.
    ///
    /// Unknown names resolve to `None` with a warning, matching buckets.
    pub fn resolve_promotion(&self, config: &BucketConfig) -> Result<Option<PromotionRule>> {
        let name = config.rule_name.as_str();
        match self.kind(name) {
            None => {
                warn!("Unknown promotion rule {:?}; leftover order is kept", name);
                Ok(None)
            }
            Some(RuleKind::Promotion(key)) => {
                if config.cap.is_some() {
                    return Err(invalid(name, "promotion rules take a percentile, not a cap"));
                }
                let params: PromotionParams = parse_params(name, &config.parameters)?;
                params.validate().map_err(|reason| invalid(name, reason))?;
                Ok(Some(PromotionRule::new(key, params)))
            }
            Some(_) => Err(ConfigurationError::CappedRuleAsPromotion {
                rule: name.to_string(),
            }),
        }
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn parse_params<P: DeserializeOwned>(rule: &str, params: &Map<String, Value>) -> Result<P> {
    serde_json::from_value(Value::Object(params.clone())).map_err(|e| invalid(rule, e.to_string()))
}

fn invalid(rule: &str, reason: impl Into<String>) -> ConfigurationError {
    ConfigurationError::InvalidParameters {
        rule: rule.to_string(),
        reason: reason.into(),
    }
}
