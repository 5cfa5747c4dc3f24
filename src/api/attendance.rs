//! Attendance endpoints: check-in, check-out and listing.
//!
//! The "today" boundary and punctuality both use the configured office
//! offset. The UNIQUE (employee_id, day) index in the store is the real
//! guard against concurrent double check-in; the pre-read only produces a
//! friendlier error for the common case.

use axum::extract::{Query, State};
use axum::Json;
use chrono::{FixedOffset, Utc};
use serde_json::Value;

use crate::cache::cache_key;
use crate::errors::AppError;
use crate::geofence;
use crate::models::{Attendance, AttendancePunchRequest};
use crate::AppState;

use super::{success, ApiResult, CompanyEmployeeQuery, LIST_TTL};

fn office_offset(minutes: i32) -> Result<FixedOffset, AppError> {
    FixedOffset::east_opt(minutes * 60)
        .ok_or_else(|| AppError::Internal("Invalid office UTC offset".to_string()))
}

pub async fn check_in(
    State(state): State<AppState>,
    Json(request): Json<AttendancePunchRequest>,
) -> ApiResult<Attendance> {
    let employee = state
        .repo
        .get_employee(&request.employee_id)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("Employee {} not found", request.employee_id))
        })?;

    let offset = office_offset(state.config.office_utc_offset_minutes)?;
    let now = Utc::now();
    let day = geofence::office_local_day(now, offset);

    if state
        .repo
        .attendance_for_day(&employee.id, day)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(
            "Already checked in for today".to_string(),
        ));
    }

    let geofences = state.repo.list_geofences(&request.company_id).await?;
    let is_verified = match (request.lat, request.lng) {
        (Some(lat), Some(lng)) => geofence::verify_location(lat, lng, &geofences),
        // No coordinates: verified only when no active geofence demands them
        _ => !geofences.iter().any(|g| g.active),
    };

    let status = geofence::classify_punctuality(
        now,
        state.config.office_start_hour,
        state.config.office_start_minute,
        state.config.grace_minutes,
        offset,
    );

    let record = Attendance {
        id: uuid::Uuid::new_v4().to_string(),
        company_id: request.company_id.clone(),
        employee_id: employee.id.clone(),
        day,
        check_in_at: now,
        check_out_at: None,
        check_in_lat: request.lat,
        check_in_lng: request.lng,
        check_out_lat: None,
        check_out_lng: None,
        address: request.address.clone(),
        notes: request.notes.clone(),
        status,
        total_hours: None,
        break_minutes: 0,
        is_verified,
    };

    // A concurrent check-in loses here with Conflict via the unique index
    state.repo.insert_attendance(&record).await?;
    state
        .cache
        .invalidate_by_prefix("attendance", Some(&request.company_id));
    success(record)
}

pub async fn check_out(
    State(state): State<AppState>,
    Json(request): Json<AttendancePunchRequest>,
) -> ApiResult<Attendance> {
    let offset = office_offset(state.config.office_utc_offset_minutes)?;
    let now = Utc::now();
    let day = geofence::office_local_day(now, offset);

    let record = state
        .repo
        .attendance_for_day(&request.employee_id, day)
        .await?
        .ok_or_else(|| AppError::NotFound("No check-in recorded for today".to_string()))?;

    if record.check_out_at.is_some() {
        return Err(AppError::Conflict("Already checked out".to_string()));
    }

    let total = geofence::total_hours(record.check_in_at, now, record.break_minutes);
    state
        .repo
        .complete_attendance(
            &record.id,
            now,
            request.lat,
            request.lng,
            total,
            request.notes.as_deref(),
        )
        .await?;
    state
        .cache
        .invalidate_by_prefix("attendance", Some(&request.company_id));

    let record = state
        .repo
        .attendance_for_day(&request.employee_id, day)
        .await?
        .ok_or_else(|| AppError::Internal("Attendance vanished after check-out".to_string()))?;
    success(record)
}

pub async fn list_attendance(
    State(state): State<AppState>,
    Query(query): Query<CompanyEmployeeQuery>,
) -> ApiResult<Value> {
    let mut params = vec![("companyId", query.company_id.as_str())];
    if let Some(emp) = &query.employee_id {
        params.push(("employeeId", emp.as_str()));
    }
    let key = cache_key("attendance:list", &params);
    if let Some(cached) = state.cache.get(&key) {
        return success(cached);
    }

    let records = state
        .repo
        .list_attendance(&query.company_id, query.employee_id.as_deref())
        .await?;
    let value = serde_json::to_value(&records)?;
    state.cache.set(&key, value.clone(), LIST_TTL);
    success(value)
}
