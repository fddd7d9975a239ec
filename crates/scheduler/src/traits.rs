//! Collaborators the driver talks to.
//!
//! Everything outside the ranking engine (the storefront API, the usage
//! counter, the audit store) sits behind one of these traits so the
//! driver can be exercised against in-memory or file-backed versions.

use crate::audit::AuditEntry;
use async_trait::async_trait;
use catalog::{OrderLine, Product, ProductId};

/// Source of collection snapshots
#[async_trait]
pub trait ProductProvider: Send + Sync {
    /// Products of one collection, in the storefront's current order.
    async fn fetch(
        &self,
        shop: &str,
        collection: &str,
        lookback_days: u32,
    ) -> anyhow::Result<Vec<Product>>;

    /// Order lines for the collection's products, when the provider has them.
    ///
    /// `None` means the snapshot already carries its sales fields.
    async fn fetch_orders(
        &self,
        _shop: &str,
        _collection: &str,
        _lookback_days: u32,
    ) -> anyhow::Result<Option<Vec<OrderLine>>> {
        Ok(None)
    }
}

/// Writes a computed order back to the storefront
#[async_trait]
pub trait CatalogOrderPusher: Send + Sync {
    /// Returns whether the storefront accepted the order.
    async fn push(&self, shop: &str, collection: &str, ordered_ids: &[ProductId]) -> bool;
}

/// Per-shop sort counter
#[async_trait]
pub trait UsageMeter: Send + Sync {
    async fn record_sort(&self, shop: &str);
}

/// Per-shop aggregate recomputed once all of a shop's collections finish
#[async_trait]
pub trait RevenueRollup: Send + Sync {
    async fn recompute(&self, shop: &str) -> anyhow::Result<()>;
}

/// Destination for run audit entries
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry);
}
