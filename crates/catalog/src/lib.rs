//! # Catalog Crate
//!
//! Product records as the ranking engine sees them.
//!
//! ## Main Components
//!
//! - **types**: `Product`, identifiers, `DateType`, `TagSet`
//! - **timestamp**: parsing heterogeneous date strings into `DateTime<Utc>`
//! - **loader**: reading product snapshots from JSON
//! - **ledger**: aggregating the orders collection into sales figures
//! - **error**: error types for record interpretation
//!
//! ## Example Usage
//!
//! ```ignore
//! use catalog::{load_products_file, SalesLedger};
//!
//! let loaded = load_products_file(Path::new("snapshot.json"))?;
//! let mut products = loaded.products;
//!
//! let ledger = SalesLedger::from_orders(&orders, Utc::now(), 30);
//! ledger.enrich(&mut products);
//! ```

pub mod error;
pub mod ledger;
pub mod loader;
pub mod timestamp;
pub mod types;

// Re-export commonly used types for convenience
pub use error::{CatalogError, Result};
pub use ledger::{OrderLine, SalesLedger, SalesTotals};
pub use loader::{LoadedProducts, load_products_file, parse_products};
pub use timestamp::{UnrecognizedTimestamp, lookback_start, parse_timestamp};
pub use types::{CollectionId, DateType, Product, ProductId, ShopId, TagSet};
