//! Loading product snapshots from JSON.
//!
//! A snapshot is a JSON array of product mappings. Individual records that
//! cannot be interpreted (not an object, no usable `id`) are skipped and
//! counted; only a document that is not an array at all is an error.

use crate::error::{CatalogError, Result};
use crate::types::Product;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

/// Result of parsing a snapshot
#[derive(Debug, Clone, Default)]
pub struct LoadedProducts {
    pub products: Vec<Product>,
    /// Number of records that were skipped
    pub rejected: usize,
}

/// Parse a JSON array of product records.
pub fn parse_products(json: &str) -> Result<LoadedProducts> {
    let document: Value =
        serde_json::from_str(json).map_err(|e| CatalogError::MalformedDocument(e.to_string()))?;

    let Value::Array(records) = document else {
        return Err(CatalogError::MalformedDocument(
            "expected a JSON array of products".to_string(),
        ));
    };

    let mut loaded = LoadedProducts::default();
    for (index, record) in records.into_iter().enumerate() {
        match serde_json::from_value::<Product>(record) {
            Ok(product) => loaded.products.push(product),
            Err(e) => {
                warn!("Skipping product record #{}: {}", index, e);
                loaded.rejected += 1;
            }
        }
    }

    debug!(
        "Parsed {} products ({} rejected)",
        loaded.products.len(),
        loaded.rejected
    );
    Ok(loaded)
}

/// Read and parse a snapshot file.
pub fn load_products_file(path: &Path) -> Result<LoadedProducts> {
    let contents = fs::read_to_string(path)?;
    parse_products(&contents)
}
