//! Usage reservation handlers
//!
//! Reservations are addressed by their operation code, scoped to the calling
//! user, so retrying clients never need to persist a reservation id.

use axum::{
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use chrono::Duration;
use validator::Validate;

use crate::dto::{ExpireReservationsResponse, ReservationRequest, ReservationResponse};
use crate::error::ApiError;
use crate::{user_from_headers, AppState};

/// `POST /payments/reservations`
pub async fn create(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<ReservationRequest>,
) -> Result<Json<ReservationResponse>, ApiError> {
    request.validate()?;
    let user = user_from_headers(&headers)?;
    let ttl = request.ttl_seconds.map(Duration::seconds);
    let reservation = state
        .reservations
        .create(&user, request.credits, &request.operation_code, ttl)
        .await?;
    Ok(Json(ReservationResponse::from(&reservation)))
}

/// `POST /payments/reservations/:operation_code/consume`
pub async fn consume(
    State(state): State<AppState>,
    Path(operation_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ReservationResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    let reservation = state.reservations.consume(&user, &operation_code).await?;
    Ok(Json(ReservationResponse::from(&reservation)))
}

/// `POST /payments/reservations/:operation_code/cancel`
pub async fn cancel(
    State(state): State<AppState>,
    Path(operation_code): Path<String>,
    headers: HeaderMap,
) -> Result<Json<ReservationResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    let reservation = state.reservations.cancel(&user, &operation_code).await?;
    Ok(Json(ReservationResponse::from(&reservation)))
}

/// `POST /payments/reservations/expire`
///
/// Internal maintenance endpoint; expected to be driven by a scheduler.
pub async fn expire_batch(
    State(state): State<AppState>,
) -> Result<Json<ExpireReservationsResponse>, ApiError> {
    let expired = state.reservations.expire_batch().await?;
    Ok(Json(ExpireReservationsResponse { expired }))
}
