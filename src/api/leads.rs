//! Lead endpoints: CRUD, assignment, contact marking and the sweep trigger.

use axum::extract::{Path, Query, State};
use axum::Json;
use serde_json::Value;

use crate::auth::Principal;
use crate::cache::cache_key;
use crate::errors::AppError;
use crate::models::{
    AssignLeadRequest, BulkAssignOutcome, BulkAssignRequest, CreateLeadRequest, Lead,
    LeadHistoryEntry, LeadMetadata, SweepReport, SweepRequest,
};
use crate::AppState;

use super::{success, ApiResult, CompanyQuery, LIST_TTL};

pub async fn create_lead(
    State(state): State<AppState>,
    Json(request): Json<CreateLeadRequest>,
) -> ApiResult<Lead> {
    if request.name.trim().is_empty() {
        return Err(AppError::Validation("Lead name must not be empty".to_string()));
    }

    let lead = state.repo.create_lead(&request).await?;
    state
        .cache
        .invalidate_by_prefix("lead", Some(&lead.company_id));
    success(lead)
}

pub async fn get_lead(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Lead> {
    let lead = state
        .repo
        .get_lead(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;
    success(lead)
}

pub async fn list_leads(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> ApiResult<Value> {
    let key = cache_key("lead:list", &[("companyId", &query.company_id)]);
    if let Some(cached) = state.cache.get(&key) {
        return success(cached);
    }

    let leads = state.repo.list_leads(&query.company_id).await?;
    let value = serde_json::to_value(&leads)?;
    state.cache.set(&key, value.clone(), LIST_TTL);
    success(value)
}

pub async fn lead_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<LeadHistoryEntry>> {
    state
        .repo
        .get_lead(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;
    let history = state.repo.list_history(&id).await?;
    success(history)
}

/// Merge a metadata patch into a lead. Unrecognized keys in the stored
/// metadata survive; the patch wins on fields it carries. Assignment and
/// contact timestamps are never touched by this path.
pub async fn update_metadata(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(patch): Json<LeadMetadata>,
) -> ApiResult<Lead> {
    if !state
        .authz
        .authorize(&principal.employee_id, "lead", "UPDATE")
        .await?
    {
        return Err(AppError::Forbidden(
            "Missing UPDATE permission on lead".to_string(),
        ));
    }

    let mut lead = state
        .repo
        .get_lead(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;

    lead.metadata.merge(patch);
    state.repo.update_lead_metadata(&id, &lead.metadata).await?;
    state
        .cache
        .invalidate_by_prefix("lead", Some(&lead.company_id));

    let lead = state
        .repo
        .get_lead(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Lead {} not found", id)))?;
    success(lead)
}

pub async fn assign_lead(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
    Json(request): Json<AssignLeadRequest>,
) -> ApiResult<Lead> {
    let lead = state
        .engine
        .assign_lead(
            &principal.employee_id,
            &id,
            &request.employee_id,
            request.note.as_deref(),
        )
        .await?;
    success(lead)
}

pub async fn bulk_assign(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<BulkAssignRequest>,
) -> ApiResult<BulkAssignOutcome> {
    // Accepted for API compatibility; every strategy currently resolves to
    // direct assignment of the whole batch to one employee.
    tracing::debug!(strategy = %request.strategy, "Bulk assign requested");

    let outcome = state
        .engine
        .bulk_assign(&principal.employee_id, &request.lead_ids, &request.employee_id)
        .await?;
    success(outcome)
}

pub async fn mark_contacted(
    State(state): State<AppState>,
    principal: Principal,
    Path(id): Path<String>,
) -> ApiResult<Lead> {
    let lead = state.engine.mark_contacted(&principal.employee_id, &id).await?;
    success(lead)
}

/// Manual sweep trigger. Elevated roles only; the in-process worker runs the
/// same pass on its interval.
pub async fn run_sweep(
    State(state): State<AppState>,
    principal: Principal,
    Json(request): Json<SweepRequest>,
) -> ApiResult<SweepReport> {
    if !state.authz.is_elevated(&principal.employee_id).await? {
        return Err(AppError::Forbidden(
            "Only elevated roles may trigger the sweep".to_string(),
        ));
    }

    let threshold = request
        .threshold_hours
        .unwrap_or(state.config.reassign_threshold_hours);
    if threshold <= 0 {
        return Err(AppError::Validation(
            "thresholdHours must be positive".to_string(),
        ));
    }

    let report = state.engine.run_reassignment_sweep(threshold).await;
    success(report)
}
