//! Role and permission endpoints.
//!
//! Mutations here change the grant set of an unbounded number of principals,
//! so each one evicts every cached grant set rather than guessing who is
//! affected.

use axum::extract::{Path, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::{
    CreatePermissionRequest, CreateRoleRequest, GrantPermissionRequest, Permission, Role,
};
use crate::AppState;

use super::{success, ApiResult};

pub async fn create_role(
    State(state): State<AppState>,
    Json(request): Json<CreateRoleRequest>,
) -> ApiResult<Role> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Role name must not be empty".to_string()));
    }

    let role = state.repo.create_role(&request).await?;
    state.authz.evict_all();
    success(role)
}

pub async fn get_role(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Role> {
    let role = state
        .repo
        .get_role(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Role {} not found", id)))?;
    success(role)
}

pub async fn create_permission(
    State(state): State<AppState>,
    Json(request): Json<CreatePermissionRequest>,
) -> ApiResult<Permission> {
    if request.resource.trim().is_empty() || request.action.trim().is_empty() {
        return Err(AppError::Validation(
            "Permission resource and action must not be empty".to_string(),
        ));
    }

    let permission = state.repo.create_permission(&request).await?;
    state.authz.evict_all();
    success(permission)
}

pub async fn grant_permission(
    State(state): State<AppState>,
    Path(role_id): Path<String>,
    Json(request): Json<GrantPermissionRequest>,
) -> ApiResult<serde_json::Value> {
    state
        .repo
        .grant_permission(&role_id, &request.permission_id)
        .await?;
    state.authz.evict_all();
    success(serde_json::json!({ "granted": true }))
}
