use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;
use uuid::Uuid;

use waypool_core::model::{Booking, BookingStatus};
use waypool_core::Error;

use crate::error::AppError;
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub ride_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
}

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(req): Json<CreateBookingRequest>,
) -> Result<(StatusCode, Json<Booking>), AppError> {
    let booking = state.bookings.create(req.ride_id, user.id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn update_booking_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(booking_id): Path<Uuid>,
    Json(req): Json<UpdateStatusRequest>,
) -> Result<Json<Booking>, AppError> {
    let status = BookingStatus::parse(&req.status)
        .ok_or_else(|| Error::InvalidArgument(format!("unknown booking status: {}", req.status)))?;
    let booking = state
        .bookings
        .update_status(booking_id, status, user.id)
        .await?;
    Ok(Json(booking))
}

pub async fn my_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.bookings_for_passenger(user.id).await?))
}

pub async fn ride_bookings(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(ride_id): Path<Uuid>,
) -> Result<Json<Vec<Booking>>, AppError> {
    Ok(Json(state.bookings.bookings_for_ride(ride_id, user.id).await?))
}
