//! Refund handler

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};
use validator::Validate;

use core_kernel::PaymentId;

use crate::dto::{RefundRequest, RefundResponse};
use crate::error::ApiError;
use crate::AppState;

/// `POST /payments/:id/refunds`
///
/// Omitting `amount_cents` refunds everything still refundable. Replays with
/// the same idempotency key return the original refund.
pub async fn create(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    request.validate()?;
    let id = PaymentId::from_str(&id)
        .map_err(|_| ApiError::NotFound(format!("payment not found: {id}")))?;

    let outcome = state
        .refunds
        .refund(&id, request.amount_cents, &request.idempotency_key)
        .await?;
    Ok(Json(RefundResponse::new(
        &outcome.refund,
        &outcome.payment,
        outcome.reversal_failure,
    )))
}
