//! In-memory collaborators, for tests and local runs.

use crate::audit::{AuditEntry, AuditStatus};
use crate::traits::{AuditSink, RevenueRollup, UsageMeter};
use async_trait::async_trait;
use catalog::ShopId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Audit sink that keeps every entry in memory
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    entries: Mutex<Vec<AuditEntry>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        lock(&self.entries).clone()
    }

    /// Status transitions recorded for one collection, oldest first
    pub fn history(&self, shop: &str, collection: &str) -> Vec<AuditStatus> {
        lock(&self.entries)
            .iter()
            .filter(|e| e.shop == shop && e.collection == collection)
            .map(|e| e.status)
            .collect()
    }

    /// Latest entry for one collection
    pub fn latest(&self, shop: &str, collection: &str) -> Option<AuditEntry> {
        lock(&self.entries)
            .iter()
            .rev()
            .find(|e| e.shop == shop && e.collection == collection)
            .cloned()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditLog {
    async fn record(&self, entry: AuditEntry) {
        debug!(
            "Audit {}/{}: {}",
            entry.shop, entry.collection, entry.status
        );
        lock(&self.entries).push(entry);
    }
}

/// Usage meter that counts sorts per shop
#[derive(Debug, Default)]
pub struct CountingUsageMeter {
    counts: Mutex<HashMap<ShopId, u64>>,
}

impl CountingUsageMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, shop: &str) -> u64 {
        lock(&self.counts).get(shop).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        lock(&self.counts).values().sum()
    }
}

#[async_trait]
impl UsageMeter for CountingUsageMeter {
    async fn record_sort(&self, shop: &str) {
        *lock(&self.counts).entry(shop.to_string()).or_insert(0) += 1;
    }
}

/// Revenue rollup that only remembers which shops it was asked to recompute
#[derive(Debug, Default)]
pub struct RecordingRollup {
    shops: Mutex<Vec<ShopId>>,
}

impl RecordingRollup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recomputed(&self) -> Vec<ShopId> {
        lock(&self.shops).clone()
    }
}

#[async_trait]
impl RevenueRollup for RecordingRollup {
    async fn recompute(&self, shop: &str) -> anyhow::Result<()> {
        lock(&self.shops).push(shop.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_meter_counts_per_shop() {
        let meter = CountingUsageMeter::new();
        meter.record_sort("a").await;
        meter.record_sort("a").await;
        meter.record_sort("b").await;
        assert_eq!(meter.count("a"), 2);
        assert_eq!(meter.count("c"), 0);
        assert_eq!(meter.total(), 3);
    }

    #[tokio::test]
    async fn test_audit_history_filters_by_collection() {
        let log = MemoryAuditLog::new();
        let entry = AuditEntry::pending("shop", "one", Utc::now());
        log.record(entry.clone()).await;
        log.record(entry.advance(AuditStatus::Running)).await;
        log.record(AuditEntry::pending("shop", "two", Utc::now())).await;

        assert_eq!(
            log.history("shop", "one"),
            vec![AuditStatus::Pending, AuditStatus::Running]
        );
        assert_eq!(
            log.latest("shop", "two").map(|e| e.status),
            Some(AuditStatus::Pending)
        );
    }
}
