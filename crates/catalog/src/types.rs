//! Core domain types for collection ranking.
//!
//! `Product` is the engine's view of one listing inside a collection. Every
//! field except the identifier is optional because upstream records are
//! loosely shaped: a rule that needs a field validates it per record and
//! drops the record when it is absent, instead of failing the whole run.

use crate::error::{CatalogError, Result};
use crate::timestamp::parse_timestamp;
use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier for a product within one collection
pub type ProductId = String;

/// Identifier of a storefront (shop)
pub type ShopId = String;

/// Identifier of a collection inside a shop
pub type CollectionId = String;

/// Accepts either a JSON string or a JSON integer for an identifier.
fn id_from_string_or_number<'de, D>(deserializer: D) -> std::result::Result<ProductId, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Int(i64),
        Unsigned(u64),
    }

    match RawId::deserialize(deserializer)? {
        RawId::Text(s) if !s.trim().is_empty() => Ok(s.trim().to_string()),
        RawId::Text(_) => Err(de::Error::custom("product id must not be empty")),
        RawId::Int(n) => Ok(n.to_string()),
        RawId::Unsigned(n) => Ok(n.to_string()),
    }
}

// =============================================================================
// Date selection
// =============================================================================

/// Which timestamp of a product a date-based rule compares.
///
/// Configurations name it either by code (`0`, `1`, `2`) or by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DateType {
    #[default]
    Created,
    Published,
    Updated,
}

impl DateType {
    /// Name of the product field this date type reads
    pub fn field_name(self) -> &'static str {
        match self {
            DateType::Created => "created_at",
            DateType::Published => "published_at",
            DateType::Updated => "updated_at",
        }
    }
}

impl<'de> Deserialize<'de> for DateType {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(0) => Ok(DateType::Created),
            Repr::Code(1) => Ok(DateType::Published),
            Repr::Code(2) => Ok(DateType::Updated),
            Repr::Code(other) => Err(de::Error::custom(format!("unknown date_type code {other}"))),
            Repr::Name(name) => match name.trim().to_lowercase().as_str() {
                "created" | "created_at" => Ok(DateType::Created),
                "published" | "published_at" => Ok(DateType::Published),
                "updated" | "updated_at" => Ok(DateType::Updated),
                other => Err(de::Error::custom(format!("unknown date_type {other:?}"))),
            },
        }
    }
}

// =============================================================================
// Tags
// =============================================================================

/// A normalized set of tags (trimmed, lowercased).
///
/// Storefront tags are matched case-insensitively.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagSet {
    tags: HashSet<String>,
}

impl TagSet {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tags = tags
            .into_iter()
            .map(|t| normalize_tag(t.as_ref()))
            .filter(|t| !t.is_empty())
            .collect();
        Self { tags }
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains(&normalize_tag(tag))
    }

    /// Tags in sorted order
    pub fn sorted(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.tags.iter().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

fn normalize_tag(tag: &str) -> String {
    tag.trim().to_lowercase()
}

// =============================================================================
// Product
// =============================================================================

/// One listing as seen by the ranking engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(deserialize_with = "id_from_string_or_number")]
    pub id: ProductId,

    // Raw timestamps, parsed on demand by the rules that need them
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub published_at: Option<String>,
    #[serde(default)]
    pub updated_at: Option<String>,

    // Stock
    #[serde(default)]
    pub total_inventory: Option<i64>,
    #[serde(default)]
    pub variant_count: Option<u32>,
    /// Sum of inventory across all variants
    #[serde(default)]
    pub variant_availability: Option<f64>,

    // Sales
    #[serde(default)]
    pub total_revenue: Option<f64>,
    #[serde(default)]
    pub total_sold_units: Option<u64>,

    #[serde(default)]
    pub tags: Option<Vec<String>>,

    // Computed fields, filled by the order ledger or by rules
    #[serde(default)]
    pub recency_score: Option<f64>,
    #[serde(default)]
    pub sales_velocity: Option<f64>,
    #[serde(default)]
    pub rfm_score: Option<f64>,
    #[serde(default)]
    pub discount_percentage: Option<f64>,
    #[serde(default)]
    pub discount_absolute: Option<f64>,
}

impl Product {
    /// Create a product with only an identifier; every other field is unset.
    pub fn new(id: impl Into<ProductId>) -> Self {
        Self {
            id: id.into(),
            created_at: None,
            published_at: None,
            updated_at: None,
            total_inventory: None,
            variant_count: None,
            variant_availability: None,
            total_revenue: None,
            total_sold_units: None,
            tags: None,
            recency_score: None,
            sales_velocity: None,
            rfm_score: None,
            discount_percentage: None,
            discount_absolute: None,
        }
    }

    pub fn with_created_at(mut self, ts: impl Into<String>) -> Self {
        self.created_at = Some(ts.into());
        self
    }

    pub fn with_published_at(mut self, ts: impl Into<String>) -> Self {
        self.published_at = Some(ts.into());
        self
    }

    pub fn with_updated_at(mut self, ts: impl Into<String>) -> Self {
        self.updated_at = Some(ts.into());
        self
    }

    pub fn with_inventory(mut self, inventory: i64) -> Self {
        self.total_inventory = Some(inventory);
        self
    }

    pub fn with_revenue(mut self, revenue: f64) -> Self {
        self.total_revenue = Some(revenue);
        self
    }

    pub fn with_sold_units(mut self, units: u64) -> Self {
        self.total_sold_units = Some(units);
        self
    }

    pub fn with_variants(mut self, count: u32, availability: f64) -> Self {
        self.variant_count = Some(count);
        self.variant_availability = Some(availability);
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_recency_score(mut self, score: f64) -> Self {
        self.recency_score = Some(score);
        self
    }

    pub fn with_sales_velocity(mut self, velocity: f64) -> Self {
        self.sales_velocity = Some(velocity);
        self
    }

    pub fn with_discount(mut self, percentage: f64, absolute: f64) -> Self {
        self.discount_percentage = Some(percentage);
        self.discount_absolute = Some(absolute);
        self
    }

    /// Raw timestamp string for the given date type, if present
    pub fn raw_timestamp(&self, date_type: DateType) -> Option<&str> {
        match date_type {
            DateType::Created => self.created_at.as_deref(),
            DateType::Published => self.published_at.as_deref(),
            DateType::Updated => self.updated_at.as_deref(),
        }
    }

    /// Parse the timestamp selected by `date_type`.
    ///
    /// Returns `MissingField` when the field is absent and `TimestampParse`
    /// when it holds an unrecognized value.
    pub fn timestamp(&self, date_type: DateType) -> Result<DateTime<Utc>> {
        let field = date_type.field_name();
        let raw = self
            .raw_timestamp(date_type)
            .ok_or_else(|| CatalogError::MissingField {
                product_id: self.id.clone(),
                field,
            })?;
        parse_timestamp(raw).map_err(|_| CatalogError::TimestampParse {
            product_id: self.id.clone(),
            field,
            value: raw.to_string(),
        })
    }

    /// Listing date used by the promotion rules: published, else created
    pub fn listed_at(&self) -> Result<DateTime<Utc>> {
        if self.published_at.is_some() {
            self.timestamp(DateType::Published)
        } else {
            self.timestamp(DateType::Created)
        }
    }

    /// A product without an inventory count is treated as in stock.
    pub fn is_in_stock(&self) -> bool {
        self.total_inventory.is_none_or(|inventory| inventory > 0)
    }

    /// Whether any of this product's tags is in `set`
    pub fn has_any_tag(&self, set: &TagSet) -> bool {
        if set.is_empty() {
            return false;
        }
        self.tags
            .as_ref()
            .is_some_and(|tags| tags.iter().any(|t| set.contains(t)))
    }

    /// In-stock share of variants: variant inventory sum per variant.
    ///
    /// `None` when either field is missing or there are no variants.
    pub fn variant_availability_ratio(&self) -> Option<f64> {
        match (self.variant_availability, self.variant_count) {
            (Some(available), Some(count)) if count > 0 => Some(available / f64::from(count)),
            _ => None,
        }
    }
}
