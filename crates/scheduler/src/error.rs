//! Error types for the scheduler crate.

use ranking::ConfigurationError;
use std::time::Duration;
use thiserror::Error;

/// Why a collection run failed.
///
/// Every variant is fatal to one run only. The driver records a failed
/// audit entry and never retries within the same invocation.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The product or order fetch failed upstream
    #[error("Provider failure for {shop}/{collection}: {reason}")]
    ProviderFailure {
        shop: String,
        collection: String,
        reason: String,
    },

    /// No usable products: none fetched, or every record was rejected
    #[error("No usable products for {shop}/{collection}")]
    EmptyCatalog { shop: String, collection: String },

    /// The collection's strategy cannot be resolved
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    /// Fetch or push did not finish in time
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },

    /// The storefront did not accept the new order
    #[error("Push rejected for {shop}/{collection}")]
    PushRejected { shop: String, collection: String },

    /// Another run for the same collection is in progress
    #[error("A run for {shop}/{collection} is already in progress")]
    AlreadyRunning { shop: String, collection: String },

    /// The ranking task panicked or was cancelled
    #[error("Ranking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, DriverError>;
