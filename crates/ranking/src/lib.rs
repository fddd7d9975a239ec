//! Ranking engine for collection merchandising.
//!
//! This crate provides:
//! - Capped ranking rules (recency, revenue, bestsellers, inventory,
//!   variant availability, discount, tags, inventory threshold, RFM,
//!   feeling lucky) behind the `RankingRule` trait
//! - Percentile promotion rules that reorder a whole list
//! - A `RuleRegistry` and `StrategyCatalog` resolving declarative bucket
//!   configurations into typed rules
//! - Segregation of pinned and out-of-stock products
//! - The `OrderingPipeline` combining all of the above into a final order
//!
//! ## Architecture
//! A run processes one collection snapshot in stages:
//! 1. Segregation splits off pinned and out-of-stock products
//! 2. Boost and bury tags pull matching products out of the working set
//! 3. Buckets claim products in order, each seeing only what earlier
//!    buckets left behind
//! 4. The pieces are concatenated in fixed precedence
//!
//! The engine is synchronous and side-effect free; the clock and random
//! source come in through `RuleContext`.
//!
//! ## Example Usage
//! ```ignore
//! use ranking::{OrderingPipeline, RandomPicker, RuleContext, RuleRegistry, StrategyCatalog};
//!
//! let registry = RuleRegistry::standard();
//! let catalog = StrategyCatalog::builtin(&registry)?;
//! let pipeline = OrderingPipeline::new(catalog.get("balanced")?);
//!
//! let mut picker = RandomPicker::from_entropy();
//! let mut ctx = RuleContext::new(Utc::now(), &mut picker);
//! let result = pipeline.rank(products, &mut ctx);
//! ```

pub mod batch;
pub mod context;
pub mod error;
pub mod ordering;
pub mod outcome;
pub mod promotion;
pub mod registry;
pub mod rules;
pub mod segregation;
pub mod strategy;
pub mod traits;

// Re-export main types
pub use batch::{BatchJob, rank_all};
pub use context::{FixedPicker, LuckyPicker, RandomPicker, RuleContext};
pub use error::{ConfigurationError, Result};
pub use ordering::{BucketReport, OrderingPipeline, Placement, RunReport, RunResult};
pub use outcome::{Rejection, RejectionReason, RuleOutcome};
pub use promotion::{PromotionKey, PromotionOutcome, PromotionParams, PromotionRule};
pub use registry::{RuleKind, RuleRegistry};
pub use rules::{LUCKY_MENU, LuckyChoice, Rule};
pub use segregation::{PinnedSet, Segregated, StockPolicy, segregate};
pub use strategy::{Bucket, BucketConfig, BucketList, Strategy, StrategyCatalog, StrategyConfig, parse_strategies};
pub use traits::RankingRule;
