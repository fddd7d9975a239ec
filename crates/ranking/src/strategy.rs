//! Strategies: named bucket lists plus boost and bury tags.
//!
//! ## Wire format
//! ```json
//! {
//!   "name": "balanced",
//!   "buckets": [
//!     {"rule_name": "new", "parameters": {"days": 30}, "cap": 8},
//!     {"rule_name": "bestsellers"}
//!   ],
//!   "boost_tags": ["featured"],
//!   "bury_tags": ["discontinued"],
//!   "promotion": {"rule_name": "promote_sales_velocity", "parameters": {"percentile": 20}}
//! }
//! ```
//! `buckets` may also be a single mapping, read as a one-element list.

use crate::error::{ConfigurationError, Result};
use crate::promotion::PromotionRule;
use crate::registry::RuleRegistry;
use crate::rules::Rule;
use catalog::TagSet;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// One bucket as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BucketConfig {
    pub rule_name: String,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cap: Option<usize>,
}

impl BucketConfig {
    pub fn new(rule_name: impl Into<String>) -> Self {
        Self {
            rule_name: rule_name.into(),
            parameters: Map::new(),
            cap: None,
        }
    }
}

/// A bucket list, or a lone bucket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BucketList {
    Many(Vec<BucketConfig>),
    One(BucketConfig),
}

impl Default for BucketList {
    fn default() -> Self {
        BucketList::Many(Vec::new())
    }
}

impl BucketList {
    pub fn into_vec(self) -> Vec<BucketConfig> {
        match self {
            BucketList::Many(buckets) => buckets,
            BucketList::One(bucket) => vec![bucket],
        }
    }
}

/// A strategy as configured
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StrategyConfig {
    pub name: String,
    #[serde(default)]
    pub buckets: BucketList,
    #[serde(default)]
    pub boost_tags: Vec<String>,
    #[serde(default)]
    pub bury_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promotion: Option<BucketConfig>,
}

/// Parse a JSON array of strategy configurations.
pub fn parse_strategies(json: &str) -> Result<Vec<StrategyConfig>> {
    serde_json::from_str(json).map_err(|e| ConfigurationError::Malformed(e.to_string()))
}

/// A resolved bucket
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    pub rule: Rule,
    pub cap: Option<usize>,
}

/// A resolved, immutable strategy
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub name: String,
    pub buckets: Vec<Bucket>,
    pub boost_tags: TagSet,
    pub bury_tags: TagSet,
    pub promotion: Option<PromotionRule>,
}

impl Strategy {
    /// Strategy with the given buckets and no tags
    pub fn new(name: impl Into<String>, rules: Vec<Rule>) -> Self {
        Self {
            name: name.into(),
            buckets: rules.into_iter().map(|rule| Bucket { rule, cap: None }).collect(),
            boost_tags: TagSet::default(),
            bury_tags: TagSet::default(),
            promotion: None,
        }
    }

    pub fn with_boost_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.boost_tags = TagSet::new(tags);
        self
    }

    pub fn with_bury_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.bury_tags = TagSet::new(tags);
        self
    }

    pub fn with_promotion(mut self, promotion: PromotionRule) -> Self {
        self.promotion = Some(promotion);
        self
    }

    /// Resolve a configuration against a registry.
    pub fn from_config(config: StrategyConfig, registry: &RuleRegistry) -> Result<Self> {
        let buckets = config
            .buckets
            .into_vec()
            .iter()
            .map(|bucket| {
                Ok(Bucket {
                    rule: registry.resolve_bucket(bucket)?,
                    cap: bucket.cap,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let promotion = match &config.promotion {
            Some(promotion) => registry.resolve_promotion(promotion)?,
            None => None,
        };

        Ok(Self {
            name: config.name,
            buckets,
            boost_tags: TagSet::new(&config.boost_tags),
            bury_tags: TagSet::new(&config.bury_tags),
            promotion,
        })
    }
}

/// Builtin strategies. Each capped rule is available on its own under its
/// rule name; `balanced` and `clearance` are multi-bucket strategies.
const BUILTIN_STRATEGIES: &str = r#"[
    {"name": "new", "buckets": {"rule_name": "new"}},
    {"name": "revenue_generated", "buckets": {"rule_name": "revenue_generated"}},
    {"name": "bestsellers", "buckets": {"rule_name": "bestsellers"}},
    {"name": "inventory", "buckets": {"rule_name": "inventory"}},
    {"name": "variant_availability", "buckets": {"rule_name": "variant_availability"}},
    {"name": "discount", "buckets": {"rule_name": "discount"}},
    {"name": "rfm", "buckets": {"rule_name": "rfm"}},
    {"name": "feeling_lucky", "buckets": {"rule_name": "feeling_lucky"}},
    {
        "name": "balanced",
        "buckets": [
            {"rule_name": "new", "parameters": {"days": 30}, "cap": 8},
            {"rule_name": "bestsellers", "cap": 16},
            {"rule_name": "revenue_generated"}
        ]
    },
    {
        "name": "clearance",
        "buckets": [
            {"rule_name": "inventory_threshold", "parameters": {"operator": ">", "threshold": 50}},
            {"rule_name": "discount"}
        ],
        "promotion": {"rule_name": "promote_variant_availability", "parameters": {"percentile": 50}}
    }
]"#;

/// Named strategies available to collections
#[derive(Debug, Clone, Default)]
pub struct StrategyCatalog {
    strategies: HashMap<String, Arc<Strategy>>,
}

impl StrategyCatalog {
    /// An empty catalog
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog pre-loaded with the builtin strategies
    pub fn builtin(registry: &RuleRegistry) -> Result<Self> {
        let mut catalog = Self::new();
        catalog.extend_from_configs(parse_strategies(BUILTIN_STRATEGIES)?, registry)?;
        Ok(catalog)
    }

    /// Add or replace a strategy
    pub fn insert(&mut self, strategy: Strategy) {
        self.strategies.insert(strategy.name.clone(), Arc::new(strategy));
    }

    /// Resolve and add configured strategies, replacing same-named ones.
    pub fn extend_from_configs(
        &mut self,
        configs: Vec<StrategyConfig>,
        registry: &RuleRegistry,
    ) -> Result<()> {
        for config in configs {
            let strategy = Strategy::from_config(config, registry)?;
            debug!(
                "Registered strategy {} with {} buckets",
                strategy.name,
                strategy.buckets.len()
            );
            self.insert(strategy);
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Arc<Strategy>> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigurationError::UnknownStrategy(name.to_string()))
    }

    /// Strategy names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.strategies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::RankingRule;

    #[test]
    fn test_single_bucket_mapping_is_one_element_list() {
        let configs = parse_strategies(
            r#"[{"name": "solo", "buckets": {"rule_name": "inventory", "cap": 3}}]"#,
        )
        .unwrap();
        let strategy = Strategy::from_config(configs[0].clone(), &RuleRegistry::standard()).unwrap();
        assert_eq!(strategy.buckets.len(), 1);
        assert_eq!(strategy.buckets[0].rule.name(), "inventory");
        assert_eq!(strategy.buckets[0].cap, Some(3));
    }

    #[test]
    fn test_list_form_keeps_order_and_tags() {
        let configs = parse_strategies(
            r#"[{
                "name": "mixed",
                "buckets": [{"rule_name": "new"}, {"rule_name": "bogus"}, {"rule_name": "rfm"}],
                "boost_tags": ["Featured"],
                "bury_tags": ["old"]
            }]"#,
        )
        .unwrap();
        let strategy = Strategy::from_config(configs[0].clone(), &RuleRegistry::standard()).unwrap();
        let names: Vec<&str> = strategy.buckets.iter().map(|b| b.rule.name()).collect();
        assert_eq!(names, vec!["new", "bogus", "rfm"]);
        assert!(strategy.buckets[1].rule.is_noop());
        assert!(strategy.boost_tags.contains("featured"));
        assert!(strategy.bury_tags.contains("OLD"));
    }

    #[test]
    fn test_malformed_documents() {
        assert!(matches!(
            parse_strategies(r#"[{"buckets": []}]"#),
            Err(ConfigurationError::Malformed(_))
        ));
        assert!(parse_strategies(r#"[{"name": "x", "buckets": 5}]"#).is_err());
        assert!(parse_strategies(r#"[{"name": "x", "boost": []}]"#).is_err());
    }

    #[test]
    fn test_builtin_catalog() {
        let catalog = StrategyCatalog::builtin(&RuleRegistry::standard()).unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.get("balanced").unwrap().buckets.len(), 3);
        assert!(catalog.get("clearance").unwrap().promotion.is_some());
        assert!(matches!(
            catalog.get("nope"),
            Err(ConfigurationError::UnknownStrategy(_))
        ));
    }

    #[test]
    fn test_configs_replace_builtins() {
        let registry = RuleRegistry::standard();
        let mut catalog = StrategyCatalog::builtin(&registry).unwrap();
        let configs = parse_strategies(r#"[{"name": "balanced", "buckets": {"rule_name": "rfm"}}]"#).unwrap();
        catalog.extend_from_configs(configs, &registry).unwrap();
        assert_eq!(catalog.len(), 10);
        assert_eq!(catalog.get("balanced").unwrap().buckets.len(), 1);
    }

    #[test]
    fn test_bad_strategy_fails_only_itself() {
        let registry = RuleRegistry::standard();
        let mut catalog = StrategyCatalog::new();
        let good = parse_strategies(r#"[{"name": "good", "buckets": {"rule_name": "new"}}]"#).unwrap();
        let bad = parse_strategies(r#"[{"name": "bad", "buckets": {"rule_name": "promote_newest"}}]"#).unwrap();
        catalog.extend_from_configs(good, &registry).unwrap();
        assert!(catalog.extend_from_configs(bad, &registry).is_err());
        assert_eq!(catalog.names(), vec!["good"]);
    }
}
