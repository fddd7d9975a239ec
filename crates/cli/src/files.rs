//! File-backed collaborators for local schedule runs.
//!
//! Layout under the data directory:
//! ```text
//! <data_dir>/<shop>/<collection>.json          product snapshot (JSON array)
//! <data_dir>/<shop>/<collection>.orders.json   optional order lines
//! ```
//! Pushed orders are written to `<output_dir>/<shop>/<collection>.json`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use catalog::{OrderLine, Product, ProductId, parse_products};
use ranking::Placement;
use scheduler::{CatalogOrderPusher, ProductProvider};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub fn snapshot_path(data_dir: &Path, shop: &str, collection: &str) -> PathBuf {
    data_dir.join(shop).join(format!("{}.json", collection))
}

pub fn orders_path(data_dir: &Path, shop: &str, collection: &str) -> PathBuf {
    data_dir.join(shop).join(format!("{}.orders.json", collection))
}

/// Read an order-lines file.
pub fn read_orders(path: &Path) -> Result<Vec<OrderLine>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read orders from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Malformed orders in {}", path.display()))
}

/// Reads collection snapshots from disk
pub struct FileProvider {
    data_dir: PathBuf,
}

impl FileProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

#[async_trait]
impl ProductProvider for FileProvider {
    async fn fetch(
        &self,
        shop: &str,
        collection: &str,
        _lookback_days: u32,
    ) -> Result<Vec<Product>> {
        let path = snapshot_path(&self.data_dir, shop, collection);
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read snapshot {}", path.display()))?;
        let loaded = parse_products(&json)
            .with_context(|| format!("Malformed snapshot {}", path.display()))?;
        if loaded.rejected > 0 {
            warn!(
                "Skipped {} unreadable records in {}",
                loaded.rejected,
                path.display()
            );
        }
        Ok(loaded.products)
    }

    async fn fetch_orders(
        &self,
        shop: &str,
        collection: &str,
        _lookback_days: u32,
    ) -> Result<Option<Vec<OrderLine>>> {
        let path = orders_path(&self.data_dir, shop, collection);
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        let json = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read orders {}", path.display()))?;
        let orders: Vec<OrderLine> = serde_json::from_str(&json)
            .with_context(|| format!("Malformed orders in {}", path.display()))?;
        debug!("Read {} order lines from {}", orders.len(), path.display());
        Ok(Some(orders))
    }
}

/// Writes pushed orders to disk as placement lists
pub struct FilePusher {
    output_dir: PathBuf,
}

impl FilePusher {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    async fn write(&self, shop: &str, collection: &str, ordered_ids: &[ProductId]) -> Result<()> {
        let dir = self.output_dir.join(shop);
        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create {}", dir.display()))?;

        let placements: Vec<Placement> = ordered_ids
            .iter()
            .enumerate()
            .map(|(index, id)| Placement {
                product_id: id.clone(),
                position: index + 1,
            })
            .collect();
        let path = dir.join(format!("{}.json", collection));
        let json = serde_json::to_string_pretty(&placements)?;
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))
    }
}

#[async_trait]
impl CatalogOrderPusher for FilePusher {
    async fn push(&self, shop: &str, collection: &str, ordered_ids: &[ProductId]) -> bool {
        match self.write(shop, collection, ordered_ids).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Push for {}/{} failed: {:#}", shop, collection, e);
                false
            }
        }
    }
}
