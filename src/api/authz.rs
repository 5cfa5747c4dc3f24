//! Authorization check endpoints. The acting principal comes from the
//! `x-employee-id` header; unknown principals resolve to denied, not to an
//! error.

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::auth::Principal;
use crate::models::{AuthzBatchCheckRequest, AuthzCheckRequest};
use crate::AppState;

use super::{success, ApiResult};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthzCheckResult {
    pub resource: String,
    pub action: String,
    pub allowed: bool,
}

pub async fn check(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<AuthzCheckRequest>,
) -> ApiResult<AuthzCheckResult> {
    let allowed = state
        .authz
        .authorize(&principal.employee_id, &request.resource, &request.action)
        .await?;
    success(AuthzCheckResult {
        resource: request.resource,
        action: request.action,
        allowed,
    })
}

pub async fn check_batch(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<AuthzBatchCheckRequest>,
) -> ApiResult<Vec<AuthzCheckResult>> {
    let pairs: Vec<(String, String)> = request
        .checks
        .iter()
        .map(|c| (c.resource.clone(), c.action.clone()))
        .collect();

    let allowed = state
        .authz
        .authorize_all(&principal.employee_id, &pairs)
        .await?;

    let results = request
        .checks
        .into_iter()
        .zip(allowed)
        .map(|(c, allowed)| AuthzCheckResult {
            resource: c.resource,
            action: c.action,
            allowed,
        })
        .collect();
    success(results)
}
