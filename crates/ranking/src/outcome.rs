//! Results produced by a single rule invocation.

use catalog::{CatalogError, Product, ProductId};
use thiserror::Error;

/// Why a record was dropped by a rule.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// A field the rule depends on is absent
    #[error("missing required field {0}")]
    MissingField(&'static str),

    /// A timestamp field could not be parsed
    #[error("cannot parse {field} value {value:?}")]
    TimestampParse { field: &'static str, value: String },

    /// A field is present but holds an unusable value (e.g. NaN)
    #[error("invalid value for {0}")]
    InvalidValue(&'static str),
}

impl From<CatalogError> for RejectionReason {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::MissingField { field, .. } => RejectionReason::MissingField(field),
            CatalogError::TimestampParse { field, value, .. } => {
                RejectionReason::TimestampParse { field, value }
            }
            CatalogError::IoError(_) | CatalogError::MalformedDocument(_) => {
                RejectionReason::InvalidValue("record")
            }
        }
    }
}

/// One record a rule could not score
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub product_id: ProductId,
    pub rule: String,
    pub reason: RejectionReason,
}

/// Output of a capped-family rule.
///
/// `capped ++ remainder` is the filtered records in rule order.
/// `unmatched` holds valid records the rule did not select (outside the
/// lookback window or failing a filter predicate), in input order.
#[derive(Debug, Clone, Default)]
pub struct RuleOutcome {
    pub capped: Vec<Product>,
    pub remainder: Vec<Product>,
    pub unmatched: Vec<Product>,
    pub rejections: Vec<Rejection>,
    /// Concrete rule that ran when it differs from the configured one
    pub resolved_as: Option<&'static str>,
}

impl RuleOutcome {
    /// An outcome that claims nothing and hands every record back.
    pub fn passthrough(products: Vec<Product>) -> Self {
        Self {
            remainder: products,
            ..Self::default()
        }
    }

    /// Records this rule kept (capped and remainder)
    pub fn filtered_len(&self) -> usize {
        self.capped.len() + self.remainder.len()
    }
}
