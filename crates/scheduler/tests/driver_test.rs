//! Integration tests for the sort driver.
//!
//! Providers and pushers here are mocks; audit, metering and rollup use
//! the crate's in-memory collaborators.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use catalog::{OrderLine, Product, ProductId};
use chrono::{DateTime, TimeZone, Utc};
use ranking::{ConfigurationError, RuleRegistry};
use scheduler::{
    AuditStatus, CatalogOrderPusher, CollectionConfig, Collaborators, CountingUsageMeter,
    DriverConfig, DriverError, MemoryAuditLog, ProductProvider, RecordingRollup, SchedulerConfig,
    ShopConfig, SortDriver,
};

// ============================================================================
// Test Fixtures
// ============================================================================

fn fixed_now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap()
}

#[derive(Default)]
struct MockProvider {
    products: HashMap<String, Vec<Product>>,
    orders: HashMap<String, Vec<OrderLine>>,
    failing: Vec<String>,
    delay: Option<Duration>,
}

impl MockProvider {
    fn with_collection(mut self, collection: &str, products: Vec<Product>) -> Self {
        self.products.insert(collection.to_string(), products);
        self
    }

    fn with_orders(mut self, collection: &str, orders: Vec<OrderLine>) -> Self {
        self.orders.insert(collection.to_string(), orders);
        self
    }

    fn failing_on(mut self, collection: &str) -> Self {
        self.failing.push(collection.to_string());
        self
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl ProductProvider for MockProvider {
    async fn fetch(
        &self,
        _shop: &str,
        collection: &str,
        _lookback_days: u32,
    ) -> anyhow::Result<Vec<Product>> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.iter().any(|c| c == collection) {
            anyhow::bail!("storefront returned 503");
        }
        Ok(self.products.get(collection).cloned().unwrap_or_default())
    }

    async fn fetch_orders(
        &self,
        _shop: &str,
        collection: &str,
        _lookback_days: u32,
    ) -> anyhow::Result<Option<Vec<OrderLine>>> {
        Ok(self.orders.get(collection).cloned())
    }
}

struct MockPusher {
    accept: bool,
    pushed: Mutex<Vec<(String, String, Vec<ProductId>)>>,
}

impl MockPusher {
    fn accepting(accept: bool) -> Self {
        Self {
            accept,
            pushed: Mutex::new(Vec::new()),
        }
    }

    fn pushed(&self) -> Vec<(String, String, Vec<ProductId>)> {
        self.pushed.lock().unwrap().clone()
    }
}

#[async_trait]
impl CatalogOrderPusher for MockPusher {
    async fn push(&self, shop: &str, collection: &str, ordered_ids: &[ProductId]) -> bool {
        self.pushed.lock().unwrap().push((
            shop.to_string(),
            collection.to_string(),
            ordered_ids.to_vec(),
        ));
        self.accept
    }
}

struct Harness {
    driver: SortDriver,
    pusher: Arc<MockPusher>,
    meter: Arc<CountingUsageMeter>,
    rollup: Arc<RecordingRollup>,
    audit: Arc<MemoryAuditLog>,
}

fn build_harness(provider: MockProvider, accept: bool, settings: DriverConfig) -> Harness {
    let pusher = Arc::new(MockPusher::accepting(accept));
    let meter = Arc::new(CountingUsageMeter::new());
    let rollup = Arc::new(RecordingRollup::new());
    let audit = Arc::new(MemoryAuditLog::new());

    let config = SchedulerConfig::from_json(
        r#"{"strategies": [
            {"name": "revenue_first", "buckets": [
                {"rule_name": "revenue_generated", "cap": 2},
                {"rule_name": "new"}
            ]},
            {"name": "broken", "buckets": {"rule_name": "promote_revenue"}}
        ]}"#,
    )
    .unwrap();
    let strategies = config.resolve_strategies(&RuleRegistry::standard()).unwrap();

    let driver = SortDriver::new(
        Collaborators {
            provider: Arc::new(provider),
            pusher: pusher.clone(),
            meter: meter.clone(),
            rollup: rollup.clone(),
            audit: audit.clone(),
        },
        strategies,
        settings,
    )
    .with_clock(fixed_now)
    .with_seed(7);

    Harness {
        driver,
        pusher,
        meter,
        rollup,
        audit,
    }
}

fn tees() -> Vec<Product> {
    vec![
        Product::new("t1")
            .with_created_at("2024-03-01T00:00:00Z")
            .with_revenue(20.0)
            .with_inventory(4),
        Product::new("t2")
            .with_created_at("2024-03-08T00:00:00Z")
            .with_revenue(90.0)
            .with_inventory(0),
        Product::new("t3")
            .with_created_at("2024-02-01T00:00:00Z")
            .with_revenue(55.0)
            .with_inventory(7),
        Product::new("t4")
            .with_created_at("2024-03-09T00:00:00Z")
            .with_revenue(5.0)
            .with_inventory(2),
    ]
}

// ============================================================================
// Single collection runs
// ============================================================================

#[tokio::test]
async fn test_successful_run_pushes_and_meters_once() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", tees()),
        true,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let summary = harness.driver.run_collection("acme", &collection).await.unwrap();

    // revenue claims t2, t3; "new" orders the rest newest first
    assert_eq!(summary.ordered_ids, vec!["t2", "t3", "t4", "t1"]);
    assert_eq!(summary.strategy, "revenue_first");
    assert_eq!(
        harness.pusher.pushed(),
        vec![(
            "acme".to_string(),
            "tees".to_string(),
            summary.ordered_ids.clone()
        )]
    );
    assert_eq!(harness.meter.count("acme"), 1);
    assert_eq!(
        harness.audit.history("acme", "tees"),
        vec![AuditStatus::Pending, AuditStatus::Running, AuditStatus::Done]
    );

    let last = harness.audit.latest("acme", "tees").unwrap();
    assert_eq!(last.started_at, fixed_now());
    assert_eq!(last.finished_at, Some(fixed_now()));
}

#[tokio::test]
async fn test_collection_settings_reach_the_pipeline() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", tees()),
        true,
        DriverConfig::default(),
    );
    let mut collection = CollectionConfig::new("tees", "revenue_first");
    collection.pinned_products = vec!["t4".to_string()];
    collection.out_of_stock_down = true;

    let summary = harness.driver.run_collection("acme", &collection).await.unwrap();
    assert_eq!(summary.ordered_ids, vec!["t4", "t3", "t1", "t2"]);
    assert_eq!(summary.report.pinned, 1);
    assert_eq!(summary.report.out_of_stock, 1);
}

#[tokio::test]
async fn test_fetch_failure_never_pushes() {
    let harness = build_harness(
        MockProvider::default().failing_on("tees"),
        true,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let err = harness.driver.run_collection("acme", &collection).await.unwrap_err();
    assert!(matches!(err, DriverError::ProviderFailure { .. }));
    assert!(err.to_string().contains("503"));
    assert!(harness.pusher.pushed().is_empty());
    assert_eq!(harness.meter.count("acme"), 0);

    let last = harness.audit.latest("acme", "tees").unwrap();
    assert_eq!(last.status, AuditStatus::Failed);
    assert!(last.detail.unwrap().contains("503"));
}

#[tokio::test]
async fn test_empty_catalog_never_pushes() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", vec![]),
        true,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let err = harness.driver.run_collection("acme", &collection).await.unwrap_err();
    assert!(matches!(err, DriverError::EmptyCatalog { .. }));
    assert!(harness.pusher.pushed().is_empty());
    assert_eq!(
        harness.audit.history("acme", "tees"),
        vec![AuditStatus::Pending, AuditStatus::Running, AuditStatus::Failed]
    );
}

#[tokio::test]
async fn test_all_records_rejected_never_pushes() {
    let products = vec![
        Product::new("r1").with_created_at("2024-03-01T00:00:00Z"),
        Product::new("r2").with_created_at("2024-03-02T00:00:00Z"),
    ];
    let harness = build_harness(
        MockProvider::default().with_collection("tees", products),
        true,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let err = harness.driver.run_collection("acme", &collection).await.unwrap_err();
    assert!(matches!(err, DriverError::EmptyCatalog { .. }));
    assert!(harness.pusher.pushed().is_empty());
    assert_eq!(harness.meter.count("acme"), 0);
    assert_eq!(
        harness.audit.latest("acme", "tees").map(|e| e.status),
        Some(AuditStatus::Failed)
    );
}

#[tokio::test]
async fn test_rejected_push_is_not_metered() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", tees()),
        false,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let err = harness.driver.run_collection("acme", &collection).await.unwrap_err();
    assert!(matches!(err, DriverError::PushRejected { .. }));
    assert_eq!(harness.pusher.pushed().len(), 1);
    assert_eq!(harness.meter.count("acme"), 0);
    assert_eq!(
        harness.audit.latest("acme", "tees").map(|e| e.status),
        Some(AuditStatus::Failed)
    );
}

#[tokio::test]
async fn test_bad_strategy_fails_with_configuration_error() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", tees()),
        true,
        DriverConfig::default(),
    );

    let broken = CollectionConfig::new("tees", "broken");
    let err = harness.driver.run_collection("acme", &broken).await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Configuration(ConfigurationError::PromotionRuleInBucket { .. })
    ));

    let missing = CollectionConfig::new("tees", "no_such_strategy");
    let err = harness.driver.run_collection("acme", &missing).await.unwrap_err();
    assert!(matches!(
        err,
        DriverError::Configuration(ConfigurationError::UnknownStrategy(_))
    ));
    assert!(harness.pusher.pushed().is_empty());
}

#[tokio::test]
async fn test_slow_fetch_times_out() {
    let settings = DriverConfig {
        fetch_timeout_secs: 0,
        ..DriverConfig::default()
    };
    let harness = build_harness(
        MockProvider::default()
            .with_collection("tees", tees())
            .with_delay(Duration::from_millis(200)),
        true,
        settings,
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let err = harness.driver.run_collection("acme", &collection).await.unwrap_err();
    assert!(matches!(err, DriverError::Timeout { stage: "fetch", .. }));
    assert!(harness.pusher.pushed().is_empty());
}

#[tokio::test]
async fn test_concurrent_run_of_same_collection_is_refused() {
    let harness = build_harness(
        MockProvider::default()
            .with_collection("tees", tees())
            .with_delay(Duration::from_millis(50)),
        true,
        DriverConfig::default(),
    );
    let collection = CollectionConfig::new("tees", "revenue_first");

    let (first, second) = tokio::join!(
        harness.driver.run_collection("acme", &collection),
        harness.driver.run_collection("acme", &collection)
    );
    assert!(first.is_ok());
    assert!(matches!(second, Err(DriverError::AlreadyRunning { .. })));
    assert_eq!(harness.pusher.pushed().len(), 1);

    // the guard is released once the first run ends
    assert!(harness.driver.run_collection("acme", &collection).await.is_ok());
}

#[tokio::test]
async fn test_order_lines_drive_bestsellers() {
    let products = vec![
        Product::new("slow").with_created_at("2024-01-01T00:00:00Z"),
        Product::new("hot").with_created_at("2024-01-01T00:00:00Z"),
        Product::new("none").with_created_at("2024-01-01T00:00:00Z"),
    ];
    let order = |id: &str, quantity: u64| OrderLine {
        product_id: id.to_string(),
        quantity,
        price: 10.0,
        created_at: "2024-03-05T12:00:00Z".to_string(),
    };
    let harness = build_harness(
        MockProvider::default()
            .with_collection("mugs", products)
            .with_orders("mugs", vec![order("slow", 1), order("hot", 6), order("hot", 2)]),
        true,
        DriverConfig::default(),
    );

    let summary = harness
        .driver
        .run_collection("acme", &CollectionConfig::new("mugs", "bestsellers"))
        .await
        .unwrap();
    assert_eq!(summary.ordered_ids, vec!["hot", "slow", "none"]);
}

#[tokio::test]
async fn test_lookback_beyond_calendar_range_completes() {
    let products = vec![
        Product::new("slow").with_created_at("2024-01-01T00:00:00Z"),
        Product::new("hot").with_created_at("2024-01-01T00:00:00Z"),
    ];
    let order = |id: &str, quantity: u64| OrderLine {
        product_id: id.to_string(),
        quantity,
        price: 10.0,
        created_at: "1990-06-01T00:00:00Z".to_string(),
    };
    let harness = build_harness(
        MockProvider::default()
            .with_collection("mugs", products)
            .with_orders("mugs", vec![order("slow", 1), order("hot", 4)]),
        true,
        DriverConfig::default(),
    );
    let mut collection = CollectionConfig::new("mugs", "bestsellers");
    collection.lookback_days = u32::MAX;

    let summary = harness.driver.run_collection("acme", &collection).await.unwrap();
    assert_eq!(summary.ordered_ids, vec!["hot", "slow"]);
    assert_eq!(
        harness.audit.history("acme", "mugs"),
        vec![AuditStatus::Pending, AuditStatus::Running, AuditStatus::Done]
    );
}

// ============================================================================
// Shop fan-out
// ============================================================================

#[tokio::test]
async fn test_shop_run_isolates_failures_and_rolls_up_once() {
    let provider = MockProvider::default()
        .with_collection("tees", tees())
        .with_collection("hats", tees())
        .with_collection("caps", tees())
        .failing_on("socks");
    let harness = build_harness(
        provider,
        true,
        DriverConfig {
            max_concurrent_collections: 2,
            ..DriverConfig::default()
        },
    );

    let shop = ShopConfig {
        shop_id: "acme".to_string(),
        collections: vec![
            CollectionConfig::new("tees", "revenue_first"),
            CollectionConfig::new("socks", "revenue_first"),
            CollectionConfig::new("hats", "broken"),
            CollectionConfig::new("caps", "balanced"),
        ],
    };

    let report = harness.driver.run_shop(&shop).await;

    let order: Vec<&str> = report.runs.iter().map(|(c, _)| c.as_str()).collect();
    assert_eq!(order, vec!["tees", "socks", "hats", "caps"]);
    assert!(report.runs[0].1.is_ok());
    assert!(matches!(report.runs[1].1, Err(DriverError::ProviderFailure { .. })));
    assert!(matches!(report.runs[2].1, Err(DriverError::Configuration(_))));
    assert!(report.runs[3].1.is_ok());
    assert!(report.rollup_ok);
    assert_eq!(harness.rollup.recomputed(), vec!["acme".to_string()]);
    assert_eq!(harness.meter.count("acme") as usize, report.succeeded());
    assert_eq!(
        harness.audit.history("acme", "socks"),
        vec![AuditStatus::Pending, AuditStatus::Running, AuditStatus::Failed]
    );
}

#[tokio::test]
async fn test_run_all_reports_every_shop() {
    let harness = build_harness(
        MockProvider::default().with_collection("tees", tees()),
        true,
        DriverConfig::default(),
    );
    let shops = vec![
        ShopConfig {
            shop_id: "north".to_string(),
            collections: vec![CollectionConfig::new("tees", "revenue_first")],
        },
        ShopConfig {
            shop_id: "south".to_string(),
            collections: vec![CollectionConfig::new("tees", "inventory")],
        },
    ];

    let reports = harness.driver.run_all(&shops).await;
    let names: Vec<&str> = reports.iter().map(|r| r.shop.as_str()).collect();
    assert_eq!(names, vec!["north", "south"]);
    assert!(reports.iter().all(|r| r.failed() == 0));
    assert_eq!(harness.meter.total(), 2);

    let mut rolled = harness.rollup.recomputed();
    rolled.sort();
    assert_eq!(rolled, vec!["north".to_string(), "south".to_string()]);
}
