//! Geofence endpoints.

use axum::extract::{Query, State};
use axum::Json;

use crate::errors::AppError;
use crate::models::{CreateGeofenceRequest, GeofenceLocation};
use crate::AppState;

use super::{success, ApiResult, CompanyQuery};

pub async fn create_geofence(
    State(state): State<AppState>,
    Json(request): Json<CreateGeofenceRequest>,
) -> ApiResult<GeofenceLocation> {
    if !(-90.0..=90.0).contains(&request.latitude)
        || !(-180.0..=180.0).contains(&request.longitude)
    {
        return Err(AppError::Validation(
            "Latitude or longitude out of range".to_string(),
        ));
    }
    if request.radius_meters <= 0.0 {
        return Err(AppError::Validation(
            "Geofence radius must be positive".to_string(),
        ));
    }

    let geofence = state.repo.create_geofence(&request).await?;
    success(geofence)
}

pub async fn list_geofences(
    State(state): State<AppState>,
    Query(query): Query<CompanyQuery>,
) -> ApiResult<Vec<GeofenceLocation>> {
    let geofences = state.repo.list_geofences(&query.company_id).await?;
    success(geofences)
}
