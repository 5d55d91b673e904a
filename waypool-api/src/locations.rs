use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use waypool_core::model::{LocationSample, TrackedRole};
use waypool_core::Error;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportLocationRequest {
    pub ride_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn report_location(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<ReportLocationRequest>,
) -> Result<Json<LocationSample>, AppError> {
    let sample = state
        .locations
        .report(req.ride_id, user.id, req.latitude, req.longitude)
        .await?;
    Ok(Json(sample))
}

pub async fn latest_location(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path((ride_id, role)): Path<(Uuid, String)>,
) -> Result<Json<LocationSample>, AppError> {
    let counterpart = TrackedRole::parse(&role)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown role: {}", role)))?;
    let sample = state.locations.latest(ride_id, user.id, counterpart).await?;
    Ok(Json(sample))
}
