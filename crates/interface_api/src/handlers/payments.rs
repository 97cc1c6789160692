//! Payment status polling

use std::str::FromStr;

use axum::{
    extract::{Path, State},
    Json,
};

use core_kernel::PaymentId;

use crate::dto::PaymentStatusResponse;
use crate::error::ApiError;
use crate::AppState;

/// `GET /payments/:id/status`
///
/// Clients poll this after checkout until `is_final`; open payments carry a
/// `retry_after_seconds` hint.
pub async fn status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<PaymentStatusResponse>, ApiError> {
    let id = PaymentId::from_str(&id)
        .map_err(|_| ApiError::NotFound(format!("payment not found: {id}")))?;
    let payment = state.payments.get(&id).await?;
    Ok(Json(PaymentStatusResponse::from_payment(&payment)))
}
