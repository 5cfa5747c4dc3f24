//! Lead model and the request/response shapes of the assignment engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lead lifecycle status.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Proposal,
    Won,
    Lost,
    Junk,
}

impl LeadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadStatus::New => "NEW",
            LeadStatus::Contacted => "CONTACTED",
            LeadStatus::Qualified => "QUALIFIED",
            LeadStatus::Proposal => "PROPOSAL",
            LeadStatus::Won => "WON",
            LeadStatus::Lost => "LOST",
            LeadStatus::Junk => "JUNK",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "NEW" => Some(LeadStatus::New),
            "CONTACTED" => Some(LeadStatus::Contacted),
            "QUALIFIED" => Some(LeadStatus::Qualified),
            "PROPOSAL" => Some(LeadStatus::Proposal),
            "WON" => Some(LeadStatus::Won),
            "LOST" => Some(LeadStatus::Lost),
            "JUNK" => Some(LeadStatus::Junk),
            _ => None,
        }
    }

    /// Statuses eligible for load counting and auto-reassignment.
    pub fn is_active(&self) -> bool {
        matches!(self, LeadStatus::New | LeadStatus::Contacted)
    }
}

/// Typed optional fields on a lead, with unknown keys preserved on merge.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub follow_up_date: Option<String>,
    /// Forward-compatibility: keys this version does not model survive merges
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl LeadMetadata {
    /// Merge a partial update into this metadata. Fields present in the
    /// patch win; absent fields and unrecognized keys are kept.
    pub fn merge(&mut self, patch: LeadMetadata) {
        if patch.notes_status.is_some() {
            self.notes_status = patch.notes_status;
        }
        if patch.follow_up_date.is_some() {
            self.follow_up_date = patch.follow_up_date;
        }
        for (key, value) in patch.extra {
            self.extra.insert(key, value);
        }
    }
}

/// A prospect record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub company_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    pub status: LeadStatus,
    pub priority: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to_id: Option<String>,
    /// Refreshed on every (re)assignment, including same-assignee reassigns
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_at: Option<DateTime<Utc>>,
    /// Set exactly once, on first contact
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contacted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub metadata: LeadMetadata,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Audit action on a lead.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadHistoryAction {
    Assigned,
    BulkAssigned,
    AutoReassigned,
    Contacted,
}

impl LeadHistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LeadHistoryAction::Assigned => "ASSIGNED",
            LeadHistoryAction::BulkAssigned => "BULK_ASSIGNED",
            LeadHistoryAction::AutoReassigned => "AUTO_REASSIGNED",
            LeadHistoryAction::Contacted => "CONTACTED",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ASSIGNED" => Some(LeadHistoryAction::Assigned),
            "BULK_ASSIGNED" => Some(LeadHistoryAction::BulkAssigned),
            "AUTO_REASSIGNED" => Some(LeadHistoryAction::AutoReassigned),
            "CONTACTED" => Some(LeadHistoryAction::Contacted),
            _ => None,
        }
    }
}

/// Append-only audit entry. Never mutated or deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadHistoryEntry {
    pub id: String,
    pub lead_id: String,
    pub action: LeadHistoryAction,
    /// Null for system-initiated actions (the sweep)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub performed_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a lead.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLeadRequest {
    pub company_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub metadata: Option<LeadMetadata>,
}

/// Request body for a manual assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignLeadRequest {
    pub employee_id: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// Request body for a bulk assignment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignRequest {
    pub lead_ids: Vec<String>,
    pub employee_id: String,
    #[serde(default = "default_strategy")]
    pub strategy: String,
}

fn default_strategy() -> String {
    "round_robin".to_string()
}

/// Result of a bulk assignment.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkAssignOutcome {
    pub assigned_count: usize,
    pub employee_name: String,
}

/// Request body for triggering the reassignment sweep.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepRequest {
    #[serde(default)]
    pub threshold_hours: Option<i64>,
}

/// Per-lead outcome of one sweep pass.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SweepOutcome {
    Reassigned,
    NoAvailableEmployees,
    AlreadyLeastLoaded,
    Error,
}

/// One entry in the sweep report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepLeadResult {
    pub lead_id: String,
    pub outcome: SweepOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_assignee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Result of one sweep over all eligible leads.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepReport {
    pub reassigned_count: usize,
    pub results: Vec<SweepLeadResult>,
}
