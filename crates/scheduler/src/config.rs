//! Scheduler configuration file.
//!
//! ```json
//! {
//!   "strategies": [{"name": "summer", "buckets": [{"rule_name": "new", "cap": 4}]}],
//!   "shops": [{
//!     "shop_id": "acme",
//!     "collections": [
//!       {"collection_id": "tees", "strategy": "summer", "pinned_products": ["42"],
//!        "out_of_stock_down": true}
//!     ]
//!   }],
//!   "driver": {"fetch_timeout_secs": 10, "max_concurrent_collections": 4}
//! }
//! ```
//! Every field except ids and strategy names has a default.

use anyhow::{Context, Result};
use catalog::{CollectionId, ProductId, ShopId};
use ranking::{
    ConfigurationError, PinnedSet, RuleRegistry, StockPolicy, Strategy, StrategyCatalog,
    StrategyConfig,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Strategies added to (or replacing) the builtin ones
    #[serde(default)]
    pub strategies: Vec<StrategyConfig>,
    #[serde(default)]
    pub shops: Vec<ShopConfig>,
    #[serde(default)]
    pub driver: DriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopConfig {
    pub shop_id: ShopId,
    #[serde(default)]
    pub collections: Vec<CollectionConfig>,
}

/// Merchant settings for one collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionConfig {
    pub collection_id: CollectionId,
    pub strategy: String,
    #[serde(default)]
    pub pinned_products: Vec<ProductId>,
    #[serde(default)]
    pub out_of_stock_down: bool,
    #[serde(default)]
    pub pinned_out_of_stock_down: bool,
    /// Window for fetched sales data, in days
    #[serde(default = "default_lookback_days")]
    pub lookback_days: u32,
}

impl CollectionConfig {
    pub fn new(collection_id: impl Into<CollectionId>, strategy: impl Into<String>) -> Self {
        Self {
            collection_id: collection_id.into(),
            strategy: strategy.into(),
            pinned_products: Vec::new(),
            out_of_stock_down: false,
            pinned_out_of_stock_down: false,
            lookback_days: default_lookback_days(),
        }
    }

    pub fn pinned(&self) -> PinnedSet {
        PinnedSet::new(self.pinned_products.iter().cloned())
    }

    pub fn stock_policy(&self) -> StockPolicy {
        StockPolicy {
            out_of_stock_down: self.out_of_stock_down,
            pinned_out_of_stock_down: self.pinned_out_of_stock_down,
        }
    }
}

/// Timeouts and fan-out width for the driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverConfig {
    #[serde(default = "default_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_timeout_secs")]
    pub push_timeout_secs: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent_collections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            fetch_timeout_secs: default_timeout_secs(),
            push_timeout_secs: default_timeout_secs(),
            max_concurrent_collections: default_max_concurrent(),
        }
    }
}

impl DriverConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn push_timeout(&self) -> Duration {
        Duration::from_secs(self.push_timeout_secs)
    }
}

fn default_lookback_days() -> u32 {
    30
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_max_concurrent() -> usize {
    8
}

impl SchedulerConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse scheduler configuration")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config = Self::from_json(&json)?;
        info!(
            "Loaded configuration: {} strategies, {} shops",
            config.strategies.len(),
            config.shops.len()
        );
        Ok(config)
    }

    /// Resolve configured strategies on top of the builtin catalog.
    ///
    /// A strategy that fails to resolve is remembered with its error so
    /// only the collections using it fail.
    pub fn resolve_strategies(&self, registry: &RuleRegistry) -> ranking::Result<StrategyBook> {
        let mut catalog = StrategyCatalog::builtin(registry)?;
        let mut broken = HashMap::new();

        for config in &self.strategies {
            let name = config.name.clone();
            match Strategy::from_config(config.clone(), registry) {
                Ok(strategy) => {
                    broken.remove(&name);
                    catalog.insert(strategy);
                }
                Err(e) => {
                    warn!("Strategy {} is unusable: {}", name, e);
                    broken.insert(name, e);
                }
            }
        }

        Ok(StrategyBook { catalog, broken })
    }
}

/// Resolved strategies plus the ones that failed to resolve
#[derive(Debug, Clone, Default)]
pub struct StrategyBook {
    catalog: StrategyCatalog,
    broken: HashMap<String, ConfigurationError>,
}

impl StrategyBook {
    pub fn new(catalog: StrategyCatalog) -> Self {
        Self {
            catalog,
            broken: HashMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> ranking::Result<Arc<Strategy>> {
        match self.broken.get(name) {
            Some(e) => Err(e.clone()),
            None => self.catalog.get(name),
        }
    }

    pub fn catalog(&self) -> &StrategyCatalog {
        &self.catalog
    }

    /// Names of strategies that failed to resolve, sorted
    pub fn broken(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.broken.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
