//! Role and permission models for the RBAC layer.
//!
//! Role detection uses the closed `RoleKind` enum resolved at role-definition
//! time; nothing in the system matches on role name strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed set of role kinds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoleKind {
    Administrator,
    Manager,
    Employee,
}

impl RoleKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RoleKind::Administrator => "ADMINISTRATOR",
            RoleKind::Manager => "MANAGER",
            RoleKind::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ADMINISTRATOR" => Some(RoleKind::Administrator),
            "MANAGER" => Some(RoleKind::Manager),
            "EMPLOYEE" => Some(RoleKind::Employee),
            _ => None,
        }
    }

    /// Elevated roles may act on leads they do not hold.
    pub fn is_elevated(&self) -> bool {
        matches!(self, RoleKind::Administrator | RoleKind::Manager)
    }
}

/// A tenant-scoped role. Identity is immutable once referenced by employees;
/// the permission set can grow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Role {
    pub id: String,
    pub company_id: String,
    pub name: String,
    pub kind: RoleKind,
    pub created_at: DateTime<Utc>,
}

/// A (resource, action) grant. Unique per (tenant, resource, action).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Permission {
    pub id: String,
    pub company_id: String,
    pub resource: String,
    pub action: String,
    pub active: bool,
}

/// Request body for creating a role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoleRequest {
    pub company_id: String,
    pub name: String,
    pub kind: RoleKind,
}

/// Request body for creating a permission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatePermissionRequest {
    pub company_id: String,
    pub resource: String,
    pub action: String,
    #[serde(default = "default_true")]
    pub active: bool,
}

fn default_true() -> bool {
    true
}

/// Request body for attaching a permission to a role.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantPermissionRequest {
    pub permission_id: String,
}

/// Request body for an authorization check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzCheckRequest {
    pub resource: String,
    pub action: String,
}

/// Request body for a batch authorization check.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzBatchCheckRequest {
    pub checks: Vec<AuthzCheckRequest>,
}
