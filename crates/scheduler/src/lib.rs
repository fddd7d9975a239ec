//! Scheduling layer for the collection sort engine.
//!
//! The driver owns everything around a ranking run that touches the
//! outside world: fetching snapshots, pushing orders, metering, auditing
//! and per-shop fan-out. Ranking itself stays synchronous in the
//! `ranking` crate and runs on a blocking thread.

pub mod audit;
pub mod config;
pub mod driver;
pub mod error;
pub mod memory;
pub mod traits;

pub use audit::{AuditEntry, AuditStatus};
pub use config::{CollectionConfig, DriverConfig, SchedulerConfig, ShopConfig, StrategyBook};
pub use driver::{Clock, Collaborators, RunSummary, ShopReport, SortDriver};
pub use error::{DriverError, Result};
pub use memory::{CountingUsageMeter, MemoryAuditLog, RecordingRollup};
pub use traits::{AuditSink, CatalogOrderPusher, ProductProvider, RevenueRollup, UsageMeter};
