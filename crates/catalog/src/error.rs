//! Error types for the catalog crate.
//!
//! Errors here describe a single product record (or a single input file).
//! Callers in the ranking engine recover from the per-record variants
//! locally: the record is dropped and counted, never fatal to a batch.

use thiserror::Error;

/// Errors that can occur while reading or interpreting catalog records.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Input file could not be opened or read
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The input document is not valid JSON or has the wrong top-level shape
    #[error("Malformed catalog document: {0}")]
    MalformedDocument(String),

    /// A timestamp field holds a value none of the accepted formats match
    #[error("Product {product_id}: cannot parse {field} value {value:?}")]
    TimestampParse {
        product_id: String,
        field: &'static str,
        value: String,
    },

    /// A field a rule depends on is absent from the record
    #[error("Product {product_id}: missing required field {field}")]
    MissingField {
        product_id: String,
        field: &'static str,
    },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, CatalogError>;
