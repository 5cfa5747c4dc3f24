//! Notification endpoints. Records are append-only apart from the read flag.

use axum::extract::{Path, Query, State};
use serde_json::Value;

use crate::cache::cache_key;
use crate::AppState;

use super::{success, ApiResult, CompanyEmployeeQuery, LIST_TTL};

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<CompanyEmployeeQuery>,
) -> ApiResult<Value> {
    let mut params = vec![("companyId", query.company_id.as_str())];
    if let Some(emp) = &query.employee_id {
        params.push(("employeeId", emp.as_str()));
    }
    let key = cache_key("notification:list", &params);
    if let Some(cached) = state.cache.get(&key) {
        return success(cached);
    }

    let notifications = state
        .repo
        .list_notifications(&query.company_id, query.employee_id.as_deref())
        .await?;
    let value = serde_json::to_value(&notifications)?;
    state.cache.set(&key, value.clone(), LIST_TTL);
    success(value)
}

pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Value> {
    state.repo.mark_notification_read(&id).await?;
    // Tenant unknown from the id alone; drop every cached notification list
    state.cache.invalidate_by_prefix("notification", None);
    success(serde_json::json!({ "read": true }))
}
