//! Sales ledger built from the "orders" collection.
//!
//! Revenue, unit counts, sales velocity and a recency score are derived
//! from order lines inside a lookback window and written onto products
//! before ranking.

use crate::timestamp::{lookback_start, parse_timestamp};
use crate::types::{Product, ProductId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

/// One line item of an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub quantity: u64,
    /// Unit price
    pub price: f64,
    pub created_at: String,
}

/// Aggregated sales for one product
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SalesTotals {
    pub units: u64,
    pub revenue: f64,
    pub last_order_at: Option<DateTime<Utc>>,
}

/// Per-product sales aggregated over a window
#[derive(Debug, Clone)]
pub struct SalesLedger {
    totals: HashMap<ProductId, SalesTotals>,
    now: DateTime<Utc>,
    window_days: u32,
    skipped_lines: usize,
}

impl SalesLedger {
    /// Aggregate order lines placed within `window_days` of `now`.
    ///
    /// Lines with an unparsable timestamp are skipped and counted; lines
    /// older than the window are ignored.
    pub fn from_orders(lines: &[OrderLine], now: DateTime<Utc>, window_days: u32) -> Self {
        let start = lookback_start(now, window_days);
        let mut totals: HashMap<ProductId, SalesTotals> = HashMap::new();
        let mut skipped_lines = 0;

        for line in lines {
            let placed_at = match parse_timestamp(&line.created_at) {
                Ok(ts) => ts,
                Err(e) => {
                    warn!("Skipping order line for product {}: {}", line.product_id, e);
                    skipped_lines += 1;
                    continue;
                }
            };
            if placed_at < start {
                continue;
            }

            let entry = totals.entry(line.product_id.clone()).or_default();
            entry.units += line.quantity;
            entry.revenue += line.price * line.quantity as f64;
            entry.last_order_at = entry.last_order_at.max(Some(placed_at));
        }

        debug!(
            "Built sales ledger for {} products from {} order lines",
            totals.len(),
            lines.len()
        );

        Self {
            totals,
            now,
            window_days,
            skipped_lines,
        }
    }

    pub fn totals(&self, product_id: &str) -> Option<&SalesTotals> {
        self.totals.get(product_id)
    }

    pub fn skipped_lines(&self) -> usize {
        self.skipped_lines
    }

    /// Write sales figures onto every product.
    ///
    /// Products with no orders in the window get zero totals and a zero
    /// recency score.
    pub fn enrich(&self, products: &mut [Product]) {
        let window = f64::from(self.window_days.max(1));
        for product in products.iter_mut() {
            let totals = self.totals.get(&product.id).copied().unwrap_or_default();
            product.total_sold_units = Some(totals.units);
            product.total_revenue = Some(totals.revenue);
            product.sales_velocity = Some(totals.units as f64 / window);
            product.recency_score = Some(match totals.last_order_at {
                Some(last) => {
                    let days = (self.now - last).num_seconds().max(0) as f64 / 86_400.0;
                    1.0 / (1.0 + days)
                }
                None => 0.0,
            });
        }
    }
}
