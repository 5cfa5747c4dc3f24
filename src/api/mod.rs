//! HTTP API handlers.
//!
//! Every handler returns the `{ "success": true, "data": ... }` envelope on
//! success; errors convert through `AppError` into the matching error
//! envelope. List reads go through the cache layer; every mutation
//! invalidates the affected resource prefix after the commit.

use std::time::Duration;

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;

pub mod attendance;
pub mod authz;
pub mod employees;
pub mod geofences;
pub mod leads;
pub mod notifications;
pub mod roles;

/// TTL for cached list reads.
pub(crate) const LIST_TTL: Duration = Duration::from_secs(30);

/// Standard success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, AppError>;

pub(crate) fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

/// Tenant selector for list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyQuery {
    pub company_id: String,
}

/// Tenant selector plus optional employee filter.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyEmployeeQuery {
    pub company_id: String,
    #[serde(default)]
    pub employee_id: Option<String>,
}
