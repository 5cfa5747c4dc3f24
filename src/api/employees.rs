//! Employee endpoints. Deactivation is a status update, never a delete.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::cache::cache_key;
use crate::errors::AppError;
use crate::models::{CreateEmployeeRequest, Employee, UpdateEmployeeRequest};
use crate::AppState;

use super::{success, ApiResult, CompanyQuery, LIST_TTL};

pub async fn create_employee(
    State(state): State<AppState>,
    Json(request): Json<CreateEmployeeRequest>,
) -> ApiResult<Employee> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation(
            "Employee name must not be empty".to_string(),
        ));
    }
    if let Some(role_id) = &request.role_id {
        state
            .repo
            .get_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", role_id)))?;
    }

    let employee = state.repo.create_employee(&request).await?;
    state
        .cache
        .invalidate_by_prefix("employee", Some(&employee.company_id));
    success(employee)
}

pub async fn get_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Employee> {
    let employee = state
        .repo
        .get_employee(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Employee {} not found", id)))?;
    success(employee)
}

pub async fn list_employees(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> ApiResult<Value> {
    let key = cache_key("employee:list", &[("companyId", &query.company_id)]);
    if let Some(cached) = state.cache.get(&key) {
        return success(cached);
    }

    let employees = state.repo.list_employees(&query.company_id).await?;
    let value = serde_json::to_value(&employees)?;
    state.cache.set(&key, value.clone(), LIST_TTL);
    success(value)
}

pub async fn update_employee(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateEmployeeRequest>,
) -> ApiResult<Employee> {
    if let Some(role_id) = &request.role_id {
        state
            .repo
            .get_role(role_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Role {} not found", role_id)))?;
    }

    let role_changed = request.role_id.is_some();
    let employee = state.repo.update_employee(&id, &request).await?;
    state
        .cache
        .invalidate_by_prefix("employee", Some(&employee.company_id));
    // A role change alters the grant set this principal resolves to
    if role_changed {
        state.authz.evict_principal(&id);
    }
    success(employee)
}
