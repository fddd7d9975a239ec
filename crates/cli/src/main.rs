mod files;

use anyhow::{Context, Result, anyhow};
use catalog::{Product, SalesLedger, load_products_file};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use files::{FilePusher, FileProvider, read_orders, snapshot_path};
use rand::Rng;
use ranking::{
    BatchJob, OrderingPipeline, PinnedSet, RandomPicker, RankingRule, RuleContext, RuleRegistry,
    RunResult, StockPolicy, rank_all,
};
use scheduler::{
    Collaborators, CollectionConfig, CountingUsageMeter, MemoryAuditLog,
    RecordingRollup, SchedulerConfig, SortDriver, StrategyBook,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// merch-sort - Collection Sort Engine
#[derive(Parser)]
#[command(name = "merch-sort")]
#[command(about = "Rule-based merchandising order for storefront collections", long_about = None)]
struct Cli {
    /// Scheduler configuration file (strategies, shops, driver settings)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank one collection snapshot and print the resulting order
    Rank(RankArgs),

    /// List available strategies
    Strategies,

    /// Rank every configured collection from files without pushing
    DryRun {
        /// Directory holding <shop>/<collection>.json snapshots
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Seed for the feeling-lucky rule
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run the configured schedule against file-backed collaborators
    Schedule {
        /// Directory holding <shop>/<collection>.json snapshots
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Directory the pushed orders are written to
        #[arg(short, long, default_value = "out")]
        output_dir: PathBuf,

        /// Seed for the feeling-lucky rule
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Run benchmark on a synthetic collection
    Benchmark {
        /// Products in the synthetic collection
        #[arg(long, default_value = "5000")]
        products: usize,

        /// Number of ranking runs
        #[arg(long, default_value = "100")]
        runs: usize,

        /// Strategy to rank with
        #[arg(long, default_value = "balanced")]
        strategy: String,
    },
}

#[derive(Args)]
struct RankArgs {
    /// Product snapshot (JSON array)
    #[arg(long)]
    snapshot: PathBuf,

    /// Strategy name
    #[arg(long, default_value = "balanced")]
    strategy: String,

    /// Pinned product ids, comma separated
    #[arg(long, value_delimiter = ',')]
    pinned: Vec<String>,

    /// Move out-of-stock products to the end
    #[arg(long)]
    out_of_stock_down: bool,

    /// Move out-of-stock pinned products to the end
    #[arg(long)]
    pinned_out_of_stock_down: bool,

    /// Order lines to derive sales fields from
    #[arg(long)]
    orders: Option<PathBuf>,

    /// Sales window for order lines, in days
    #[arg(long, default_value = "30")]
    lookback_days: u32,

    /// Seed for the feeling-lucky rule
    #[arg(long)]
    seed: Option<u64>,

    /// Show the run report (buckets, rejections)
    #[arg(long)]
    explain: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };
    let registry = RuleRegistry::standard();
    let strategies = config
        .resolve_strategies(&registry)
        .context("Failed to build strategy catalog")?;

    match cli.command {
        Commands::Rank(args) => handle_rank(&strategies, args)?,
        Commands::Strategies => handle_strategies(&strategies),
        Commands::DryRun { data_dir, seed } => handle_dry_run(&config, &strategies, &data_dir, seed)?,
        Commands::Schedule {
            data_dir,
            output_dir,
            seed,
        } => handle_schedule(&config, strategies, data_dir, output_dir, seed).await?,
        Commands::Benchmark {
            products,
            runs,
            strategy,
        } => handle_benchmark(&strategies, products, runs, &strategy).await?,
    }

    Ok(())
}

fn picker(seed: Option<u64>) -> RandomPicker {
    match seed {
        Some(seed) => RandomPicker::seeded(seed),
        None => RandomPicker::from_entropy(),
    }
}

/// Handle the 'rank' command
fn handle_rank(strategies: &StrategyBook, args: RankArgs) -> Result<()> {
    let strategy = strategies.get(&args.strategy)?;

    let start = Instant::now();
    let loaded = load_products_file(&args.snapshot)
        .with_context(|| format!("Failed to load snapshot {}", args.snapshot.display()))?;
    println!(
        "{} Loaded {} products in {:?}",
        "✓".green(),
        loaded.products.len(),
        start.elapsed()
    );
    if loaded.rejected > 0 {
        println!(
            "{} {} records could not be read",
            "!".yellow(),
            loaded.rejected
        );
    }

    let now = Utc::now();
    let mut products = loaded.products;
    if let Some(path) = &args.orders {
        let orders = read_orders(path)?;
        SalesLedger::from_orders(&orders, now, args.lookback_days).enrich(&mut products);
        println!("{} Applied {} order lines", "✓".green(), orders.len());
    }

    let pipeline = OrderingPipeline::new(strategy)
        .with_pinned(PinnedSet::new(args.pinned))
        .with_stock_policy(StockPolicy {
            out_of_stock_down: args.out_of_stock_down,
            pinned_out_of_stock_down: args.pinned_out_of_stock_down,
        });

    let mut picker = picker(args.seed);
    let mut ctx = RuleContext::new(now, &mut picker);
    let result = pipeline.rank(products, &mut ctx);

    print_ranking(&result, args.explain);
    Ok(())
}

/// Handle the 'strategies' command
fn handle_strategies(strategies: &StrategyBook) {
    println!("{}", "Strategies:".bold().blue());
    let catalog = strategies.catalog();
    for name in catalog.names() {
        let Ok(strategy) = catalog.get(name) else {
            continue;
        };
        let buckets = strategy
            .buckets
            .iter()
            .map(|bucket| match bucket.cap {
                Some(cap) => format!("{}[{}]", bucket.rule.name(), cap),
                None => bucket.rule.name().to_string(),
            })
            .collect::<Vec<_>>()
            .join(" → ");
        println!("{} {}: {}", "•".green(), name.bold(), buckets);
        if let Some(promotion) = &strategy.promotion {
            println!(
                "    promotion: {} ({}%)",
                promotion.name(),
                promotion.params.percentile
            );
        }
        if !strategy.boost_tags.is_empty() {
            println!("    boost: {}", strategy.boost_tags.sorted().join(", "));
        }
        if !strategy.bury_tags.is_empty() {
            println!("    bury: {}", strategy.bury_tags.sorted().join(", "));
        }
    }
    for name in strategies.broken() {
        if let Err(e) = strategies.get(name) {
            println!("{} {}: {}", "✗".red(), name.bold(), e);
        }
    }
}

/// Handle the 'dry-run' command
fn handle_dry_run(
    config: &SchedulerConfig,
    strategies: &StrategyBook,
    data_dir: &Path,
    seed: Option<u64>,
) -> Result<()> {
    let mut jobs = Vec::new();
    for shop in &config.shops {
        for (index, collection) in shop.collections.iter().enumerate() {
            let key = format!("{}/{}", shop.shop_id, collection.collection_id);
            match build_job(strategies, data_dir, &shop.shop_id, collection) {
                Ok((pipeline, products)) => {
                    jobs.push(BatchJob {
                        key,
                        pipeline,
                        products,
                        seed: seed.unwrap_or(0).wrapping_add(index as u64),
                    });
                }
                Err(e) => println!("{} {}: {:#}", "✗".red(), key, e),
            }
        }
    }

    if jobs.is_empty() {
        return Err(anyhow!("No collections to rank"));
    }

    let start = Instant::now();
    let results = rank_all(jobs, Utc::now());
    println!(
        "{}",
        format!("Ranked {} collections in {:?}", results.len(), start.elapsed())
            .bold()
            .blue()
    );
    for (key, result) in &results {
        let preview = result
            .ordered_ids()
            .into_iter()
            .take(5)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{} {} ({}): {} products, {} dropped [{}{}]",
            "✓".green(),
            key,
            result.report.strategy,
            result.ordered.len(),
            result.report.dropped(),
            preview,
            if result.ordered.len() > 5 { ", …" } else { "" }
        );
    }
    Ok(())
}

fn build_job(
    strategies: &StrategyBook,
    data_dir: &Path,
    shop: &str,
    collection: &CollectionConfig,
) -> Result<(OrderingPipeline, Vec<Product>)> {
    let strategy = strategies.get(&collection.strategy)?;
    let path = snapshot_path(data_dir, shop, &collection.collection_id);
    let loaded = load_products_file(&path)
        .with_context(|| format!("Failed to load {}", path.display()))?;
    let pipeline = OrderingPipeline::new(strategy)
        .with_pinned(collection.pinned())
        .with_stock_policy(collection.stock_policy());
    Ok((pipeline, loaded.products))
}

/// Handle the 'schedule' command
async fn handle_schedule(
    config: &SchedulerConfig,
    strategies: StrategyBook,
    data_dir: PathBuf,
    output_dir: PathBuf,
    seed: Option<u64>,
) -> Result<()> {
    if config.shops.is_empty() {
        return Err(anyhow!("Configuration lists no shops; pass --config"));
    }

    let meter = Arc::new(CountingUsageMeter::new());
    let audit = Arc::new(MemoryAuditLog::new());
    let rollup = Arc::new(RecordingRollup::new());
    let mut driver = SortDriver::new(
        Collaborators {
            provider: Arc::new(FileProvider::new(data_dir)),
            pusher: Arc::new(FilePusher::new(&output_dir)),
            meter: meter.clone(),
            rollup: rollup.clone(),
            audit: audit.clone(),
        },
        strategies,
        config.driver.clone(),
    );
    if let Some(seed) = seed {
        driver = driver.with_seed(seed);
    }

    let start = Instant::now();
    let reports = driver.run_all(&config.shops).await;

    println!("{}", "Schedule results:".bold().blue());
    for report in &reports {
        println!(
            "{} {} ({} sorted, {} failed{})",
            "•".green(),
            report.shop.bold(),
            report.succeeded(),
            report.failed(),
            if report.rollup_ok { "" } else { ", rollup failed" }
        );
        for (collection, run) in &report.runs {
            match run {
                Ok(summary) => println!(
                    "    {} {}: {} products with {}",
                    "✓".green(),
                    collection,
                    summary.ordered_ids.len(),
                    summary.strategy
                ),
                Err(e) => println!("    {} {}: {}", "✗".red(), collection, e),
            }
        }
        println!("    sorts metered: {}", meter.count(&report.shop));
    }
    println!(
        "Wrote orders to {} in {:?} ({} audit entries)",
        output_dir.display(),
        start.elapsed(),
        audit.entries().len()
    );
    Ok(())
}

/// Handle the 'benchmark' command
async fn handle_benchmark(
    strategies: &StrategyBook,
    products: usize,
    runs: usize,
    strategy: &str,
) -> Result<()> {
    if runs == 0 {
        return Err(anyhow!("--runs must be at least 1"));
    }
    let pipeline = Arc::new(OrderingPipeline::new(strategies.get(strategy)?));
    let snapshot = Arc::new(synthetic_products(products));
    let now = Utc::now();

    // Use tokio::spawn_blocking to run the ranking passes concurrently
    let mut handles = Vec::with_capacity(runs);
    for run in 0..runs {
        let pipeline = Arc::clone(&pipeline);
        let snapshot = Arc::clone(&snapshot);
        handles.push(tokio::task::spawn_blocking(move || {
            let start = Instant::now();
            let mut picker = RandomPicker::seeded(run as u64);
            let mut ctx = RuleContext::new(now, &mut picker);
            let result = pipeline.rank(snapshot.as_ref().clone(), &mut ctx);
            (start.elapsed(), result.ordered.len())
        }));
    }

    let wall = Instant::now();
    let mut timings = Vec::with_capacity(runs);
    for handle in handles {
        let (elapsed, _) = handle.await?;
        timings.push(elapsed);
    }
    let wall = wall.elapsed();

    timings.sort();
    let total: Duration = timings.iter().sum();
    let percentile = |p: f64| timings[((timings.len() as f64 * p) as usize).min(timings.len() - 1)];

    println!("{}", "Benchmark results:".bold().blue());
    println!("Products per run: {}", products);
    println!("Wall time: {:?}", wall);
    println!("Average latency: {:?}", total / runs as u32);
    println!("P50 latency: {:?}", percentile(0.50));
    println!("P95 latency: {:?}", percentile(0.95));
    println!("P99 latency: {:?}", percentile(0.99));
    println!(
        "Throughput: {:.2} runs/second",
        runs as f64 / wall.as_secs_f64().max(f64::EPSILON)
    );
    Ok(())
}

fn synthetic_products(count: usize) -> Vec<Product> {
    let mut rng = rand::rng();
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let created = now - ChronoDuration::hours(rng.random_range(0..24 * 120));
            let variants = rng.random_range(1..8u32);
            Product::new(i.to_string())
                .with_created_at(created.to_rfc3339())
                .with_revenue(rng.random_range(0.0..5_000.0))
                .with_sold_units(rng.random_range(0..400))
                .with_inventory(rng.random_range(-3..60))
                .with_variants(variants, f64::from(rng.random_range(0..=variants)))
                .with_discount(rng.random_range(0.0..70.0), rng.random_range(0.0..40.0))
                .with_tags(if rng.random_bool(0.05) {
                    vec!["featured"]
                } else {
                    vec!["regular"]
                })
        })
        .collect()
}

/// Print a ranked collection
fn print_ranking(result: &RunResult, explain: bool) {
    println!(
        "{}",
        format!("Order for strategy {}:", result.report.strategy)
            .bold()
            .blue()
    );
    for placement in result.placements() {
        println!(
            "{}. {}",
            placement.position.to_string().green(),
            placement.product_id
        );
    }

    if !explain {
        return;
    }

    let report = &result.report;
    println!("{}", "Run report:".bold().blue());
    println!(
        "  input {} | pinned {} | boosted {} | buried {} | out of stock {}",
        report.input, report.pinned, report.boosted, report.buried, report.out_of_stock
    );
    for bucket in &report.buckets {
        let mut label = match &bucket.resolved_as {
            Some(resolved) => format!("{} → {}", bucket.rule_name, resolved),
            None => bucket.rule_name.clone(),
        };
        if let Some(cap) = bucket.cap {
            label.push_str(&format!("[{}]", cap));
        }
        println!(
            "  {} {}: {} in, {} claimed, {} rejected",
            "•".green(),
            label,
            bucket.input,
            bucket.claimed,
            bucket.rejected
        );
    }
    for skipped in &report.skipped_buckets {
        println!("  {} {}: unknown rule, skipped", "!".yellow(), skipped);
    }
    if !report.duplicates.is_empty() {
        println!(
            "  {} duplicate ids discarded: {}",
            "!".yellow(),
            report.duplicates.join(", ")
        );
    }
    for rejection in &report.rejections {
        println!(
            "  {} {} dropped by {}: {}",
            "✗".red(),
            rejection.product_id,
            rejection.rule,
            rejection.reason
        );
    }
    for miss in &report.promotion_misses {
        println!(
            "  {} {} not scored by {}: {}",
            "!".yellow(),
            miss.product_id,
            miss.rule,
            miss.reason
        );
    }
}
