//! # Sort Driver
//!
//! Runs the ordering pipeline for scheduled collections:
//! 1. Audit the run as pending, then running
//! 2. Fetch the collection snapshot (and order lines, when available)
//! 3. Fold order lines into sales fields
//! 4. Resolve the collection's strategy
//! 5. Rank on a blocking thread
//! 6. Push the order back to the storefront
//! 7. Meter the sort and close the audit entry
//!
//! A failed fetch, an empty snapshot or a bad strategy ends the run
//! before anything is pushed. `run_shop` fans collections out over tokio
//! tasks and recomputes the shop's revenue rollup once all of them finish.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, warn};

use crate::audit::{AuditEntry, AuditStatus};
use crate::config::{CollectionConfig, DriverConfig, ShopConfig, StrategyBook};
use crate::error::{DriverError, Result};
use crate::traits::{AuditSink, CatalogOrderPusher, ProductProvider, RevenueRollup, UsageMeter};
use catalog::{CollectionId, Product, ProductId, SalesLedger, ShopId};
use ranking::{OrderingPipeline, RandomPicker, RuleContext, RunReport};

/// Source of "now" for a run
pub type Clock = fn() -> DateTime<Utc>;

/// External systems the driver depends on
#[derive(Clone)]
pub struct Collaborators {
    pub provider: Arc<dyn ProductProvider>,
    pub pusher: Arc<dyn CatalogOrderPusher>,
    pub meter: Arc<dyn UsageMeter>,
    pub rollup: Arc<dyn RevenueRollup>,
    pub audit: Arc<dyn AuditSink>,
}

/// A run that ended with an accepted push
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub shop: ShopId,
    pub collection: CollectionId,
    pub strategy: String,
    pub ordered_ids: Vec<ProductId>,
    pub report: RunReport,
}

/// Every collection outcome for one shop, in configuration order
#[derive(Debug)]
pub struct ShopReport {
    pub shop: ShopId,
    pub runs: Vec<(CollectionId, Result<RunSummary>)>,
    pub rollup_ok: bool,
}

impl ShopReport {
    pub fn succeeded(&self) -> usize {
        self.runs.iter().filter(|(_, run)| run.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.runs.len() - self.succeeded()
    }
}

type RunKey = (ShopId, CollectionId);

/// Marks a collection as running until dropped
struct RunGuard {
    key: RunKey,
    in_flight: Arc<Mutex<HashSet<RunKey>>>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.key);
    }
}

#[derive(Clone)]
pub struct SortDriver {
    provider: Arc<dyn ProductProvider>,
    pusher: Arc<dyn CatalogOrderPusher>,
    meter: Arc<dyn UsageMeter>,
    rollup: Arc<dyn RevenueRollup>,
    audit: Arc<dyn AuditSink>,
    strategies: Arc<StrategyBook>,
    settings: DriverConfig,
    clock: Clock,
    seed: Option<u64>,
    in_flight: Arc<Mutex<HashSet<RunKey>>>,
}

impl SortDriver {
    pub fn new(collaborators: Collaborators, strategies: StrategyBook, settings: DriverConfig) -> Self {
        Self {
            provider: collaborators.provider,
            pusher: collaborators.pusher,
            meter: collaborators.meter,
            rollup: collaborators.rollup,
            audit: collaborators.audit,
            strategies: Arc::new(strategies),
            settings,
            clock: Utc::now,
            seed: None,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Seed the feeling-lucky picker so every run makes the same choice
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn strategies(&self) -> &StrategyBook {
        &self.strategies
    }

    /// Rank and push one collection.
    #[instrument(skip(self, collection), fields(collection = %collection.collection_id))]
    pub async fn run_collection(&self, shop: &str, collection: &CollectionConfig) -> Result<RunSummary> {
        let _guard = self.acquire(shop, &collection.collection_id)?;
        let start_time = Instant::now();

        let entry = AuditEntry::pending(shop, &collection.collection_id, (self.clock)());
        self.audit.record(entry.clone()).await;
        self.audit.record(entry.advance(AuditStatus::Running)).await;

        let result = self.execute(shop, collection).await;

        let finished_at = (self.clock)();
        match &result {
            Ok(summary) => {
                info!(
                    "Sorted {}/{}: {} products with strategy {} in {:.2?}",
                    shop,
                    collection.collection_id,
                    summary.ordered_ids.len(),
                    summary.strategy,
                    start_time.elapsed()
                );
                let detail = format!(
                    "{} products ranked, {} dropped",
                    summary.ordered_ids.len(),
                    summary.report.dropped()
                );
                self.audit
                    .record(entry.finish(AuditStatus::Done, finished_at, detail))
                    .await;
            }
            Err(e) => {
                warn!("Run for {}/{} failed: {}", shop, collection.collection_id, e);
                self.audit
                    .record(entry.finish(AuditStatus::Failed, finished_at, e.to_string()))
                    .await;
            }
        }

        result
    }

    /// Rank every collection of a shop, then recompute its revenue rollup.
    #[instrument(skip(self, shop), fields(shop = %shop.shop_id, collections = shop.collections.len()))]
    pub async fn run_shop(&self, shop: &ShopConfig) -> ShopReport {
        let start_time = Instant::now();
        let permits = Arc::new(Semaphore::new(self.settings.max_concurrent_collections.max(1)));
        let mut tasks = JoinSet::new();

        for (index, collection) in shop.collections.iter().cloned().enumerate() {
            let driver = self.clone();
            let shop_id = shop.shop_id.clone();
            let permits = Arc::clone(&permits);
            tasks.spawn(async move {
                let _permit = permits.acquire_owned().await.ok();
                let result = driver.run_collection(&shop_id, &collection).await;
                (index, collection.collection_id, result)
            });
        }

        let mut runs = Vec::with_capacity(shop.collections.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(run) => runs.push(run),
                Err(e) => error!("Collection task for shop {} panicked: {}", shop.shop_id, e),
            }
        }
        runs.sort_by_key(|(index, _, _)| *index);

        let rollup_ok = match self.rollup.recompute(&shop.shop_id).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Revenue rollup for shop {} failed: {:#}", shop.shop_id, e);
                false
            }
        };

        let report = ShopReport {
            shop: shop.shop_id.clone(),
            runs: runs
                .into_iter()
                .map(|(_, collection, result)| (collection, result))
                .collect(),
            rollup_ok,
        };
        info!(
            "Shop {} finished: {} succeeded, {} failed in {:.2?}",
            report.shop,
            report.succeeded(),
            report.failed(),
            start_time.elapsed()
        );
        report
    }

    /// Run several shops concurrently.
    pub async fn run_all(&self, shops: &[ShopConfig]) -> Vec<ShopReport> {
        let mut tasks = JoinSet::new();
        for (index, shop) in shops.iter().cloned().enumerate() {
            let driver = self.clone();
            tasks.spawn(async move { (index, driver.run_shop(&shop).await) });
        }

        let mut reports = Vec::with_capacity(shops.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(report) => reports.push(report),
                Err(e) => error!("Shop task panicked: {}", e),
            }
        }
        reports.sort_by_key(|(index, _)| *index);
        reports.into_iter().map(|(_, report)| report).collect()
    }

    async fn execute(&self, shop: &str, collection: &CollectionConfig) -> Result<RunSummary> {
        let collection_id = collection.collection_id.as_str();
        let now = (self.clock)();

        let mut products = self.fetch_products(shop, collection).await?;
        debug!("Fetched {} products for {}/{}", products.len(), shop, collection_id);

        if let Some(orders) = self.fetch_orders(shop, collection).await? {
            let ledger = SalesLedger::from_orders(&orders, now, collection.lookback_days);
            ledger.enrich(&mut products);
            debug!(
                "Enriched {} products from {} order lines",
                products.len(),
                orders.len()
            );
        }

        let strategy = self.strategies.get(&collection.strategy)?;
        let strategy_name = strategy.name.clone();
        let pipeline = OrderingPipeline::new(strategy)
            .with_pinned(collection.pinned())
            .with_stock_policy(collection.stock_policy());

        let seed = self.seed;
        let result = tokio::task::spawn_blocking(move || {
            let mut picker = match seed {
                Some(seed) => RandomPicker::seeded(seed),
                None => RandomPicker::from_entropy(),
            };
            let mut ctx = RuleContext::new(now, &mut picker);
            pipeline.rank(products, &mut ctx)
        })
        .await?;

        if result.ordered.is_empty() {
            warn!(
                "Every product in {}/{} was rejected ({} dropped)",
                shop,
                collection_id,
                result.report.dropped()
            );
            return Err(DriverError::EmptyCatalog {
                shop: shop.to_string(),
                collection: collection_id.to_string(),
            });
        }

        let ordered_ids = result.ordered_ids();
        let push_timeout = self.settings.push_timeout();
        let accepted = timeout(
            push_timeout,
            self.pusher.push(shop, collection_id, &ordered_ids),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            stage: "push",
            after: push_timeout,
        })?;

        if !accepted {
            return Err(DriverError::PushRejected {
                shop: shop.to_string(),
                collection: collection_id.to_string(),
            });
        }
        self.meter.record_sort(shop).await;

        Ok(RunSummary {
            shop: shop.to_string(),
            collection: collection_id.to_string(),
            strategy: strategy_name,
            ordered_ids,
            report: result.report,
        })
    }

    async fn fetch_products(&self, shop: &str, collection: &CollectionConfig) -> Result<Vec<Product>> {
        let collection_id = collection.collection_id.as_str();
        let limit = self.settings.fetch_timeout();
        let products = timeout(
            limit,
            self.provider.fetch(shop, collection_id, collection.lookback_days),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            stage: "fetch",
            after: limit,
        })?
        .map_err(|e| provider_failure(shop, collection_id, e))?;

        if products.is_empty() {
            return Err(DriverError::EmptyCatalog {
                shop: shop.to_string(),
                collection: collection_id.to_string(),
            });
        }
        Ok(products)
    }

    async fn fetch_orders(
        &self,
        shop: &str,
        collection: &CollectionConfig,
    ) -> Result<Option<Vec<catalog::OrderLine>>> {
        let collection_id = collection.collection_id.as_str();
        let limit = self.settings.fetch_timeout();
        timeout(
            limit,
            self.provider
                .fetch_orders(shop, collection_id, collection.lookback_days),
        )
        .await
        .map_err(|_| DriverError::Timeout {
            stage: "order fetch",
            after: limit,
        })?
        .map_err(|e| provider_failure(shop, collection_id, e))
    }

    fn acquire(&self, shop: &str, collection: &str) -> Result<RunGuard> {
        let key = (shop.to_string(), collection.to_string());
        let mut in_flight = self.in_flight.lock().unwrap_or_else(PoisonError::into_inner);
        if !in_flight.insert(key.clone()) {
            return Err(DriverError::AlreadyRunning {
                shop: shop.to_string(),
                collection: collection.to_string(),
            });
        }
        Ok(RunGuard {
            key,
            in_flight: Arc::clone(&self.in_flight),
        })
    }
}

fn provider_failure(shop: &str, collection: &str, e: anyhow::Error) -> DriverError {
    DriverError::ProviderFailure {
        shop: shop.to_string(),
        collection: collection.to_string(),
        reason: format!("{:#}", e),
    }
}
