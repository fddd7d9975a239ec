//! Audit entries for collection runs.

use catalog::{CollectionId, ShopId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of one run: pending → running → done | failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl AuditStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, AuditStatus::Done | AuditStatus::Failed)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AuditStatus::Pending => "pending",
            AuditStatus::Running => "running",
            AuditStatus::Done => "done",
            AuditStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Snapshot of a run at one status transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub shop: ShopId,
    pub collection: CollectionId,
    pub status: AuditStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    /// Failure reason, or a short summary of a successful run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEntry {
    pub fn pending(shop: &str, collection: &str, started_at: DateTime<Utc>) -> Self {
        Self {
            shop: shop.to_string(),
            collection: collection.to_string(),
            status: AuditStatus::Pending,
            started_at,
            finished_at: None,
            detail: None,
        }
    }

    /// The same run moved to a non-terminal status
    pub fn advance(&self, status: AuditStatus) -> Self {
        Self {
            status,
            ..self.clone()
        }
    }

    /// The same run closed with a terminal status
    pub fn finish(&self, status: AuditStatus, at: DateTime<Utc>, detail: String) -> Self {
        Self {
            status,
            finished_at: Some(at),
            detail: Some(detail),
            ..self.clone()
        }
    }
}
