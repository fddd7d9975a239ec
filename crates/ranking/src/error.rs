//! Error types for the ranking crate.
//!
//! Only configuration problems are errors here. Per-record problems
//! (missing fields, bad timestamps) and unknown rule names are recovered
//! inside a run and reported through `RunReport`.

use thiserror::Error;

/// A strategy or bucket configuration that cannot be turned into rules.
///
/// Fatal for the collection that uses it, never for other collections.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// Strategy document is not valid JSON or has the wrong shape
    #[error("Malformed strategy configuration: {0}")]
    Malformed(String),

    /// A collection names a strategy the catalog does not hold
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),

    /// Rule parameters do not match what the rule accepts
    #[error("Invalid parameters for rule {rule}: {reason}")]
    InvalidParameters { rule: String, reason: String },

    /// A percentile-family rule was placed in a capped bucket
    #[error("Rule {rule} is a percentile promotion rule and cannot be used as a capped bucket")]
    PromotionRuleInBucket { rule: String },

    /// A capped-family rule was placed in the promotion slot
    #[error("Rule {rule} is a capped rule and cannot be used as a promotion")]
    CappedRuleAsPromotion { rule: String },
}

/// Convenience type alias for Results in this crate
pub type Result<T> = std::result::Result<T, ConfigurationError>;
