//! Notification model. Persisted first; live delivery is best effort.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A delivered-or-queued message. A null `employee_id` is a tenant broadcast.
/// Mutated only to flip `is_read`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub company_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub title: String,
    pub message: String,
    #[serde(rename = "type")]
    pub notification_type: String,
    pub category: String,
    pub is_read: bool,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
