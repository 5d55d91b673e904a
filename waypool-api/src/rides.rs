use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;

use waypool_core::geo::GeoPoint;
use waypool_core::model::{Ride, RideStatus};
use waypool_core::Error;
use waypool_ride::NewRide;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateRideRequest {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub departure_time: DateTime<Utc>,
    pub price_amount: i64,
    pub price_currency: String,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub start_latitude: f64,
    pub start_longitude: f64,
    pub end_latitude: f64,
    pub end_longitude: f64,
    pub radius_km: f64,
}

#[derive(Debug, Deserialize)]
pub struct MineParams {
    pub status: Option<String>,
}

pub async fn create_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateRideRequest>,
) -> Result<(StatusCode, Json<Ride>), AppError> {
    let ride = state
        .rides
        .create(
            user.id,
            NewRide {
                start: GeoPoint::new(req.start_latitude, req.start_longitude),
                end: GeoPoint::new(req.end_latitude, req.end_longitude),
                departure_time: req.departure_time,
                price_amount: req.price_amount,
                price_currency: req.price_currency,
            },
        )
        .await?;
    Ok((StatusCode::CREATED, Json(ride)))
}

pub async fn search_rides(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let rides = state
        .matcher
        .search(
            GeoPoint::new(params.start_latitude, params.start_longitude),
            GeoPoint::new(params.end_latitude, params.end_longitude),
            params.radius_km,
        )
        .await?;
    Ok(Json(rides))
}

pub async fn get_ride(
    State(state): State<AppState>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.get(ride_id).await?))
}

pub async fn my_rides(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<MineParams>,
) -> Result<Json<Vec<Ride>>, AppError> {
    let rides = match params.status {
        Some(raw) => {
            let status = RideStatus::parse(&raw)
                .ok_or_else(|| Error::InvalidArgument(format!("unknown ride status: {}", raw)))?;
            state.rides.rides_for_by_status(user.id, status).await?
        }
        None => state.rides.rides_for(user.id).await?,
    };
    Ok(Json(rides))
}

pub async fn start_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.start(ride_id, user.id).await?))
}

pub async fn complete_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.complete(ride_id, user.id).await?))
}

pub async fn cancel_ride(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Ride>, AppError> {
    Ok(Json(state.rides.cancel(ride_id, user.id).await?))
}
