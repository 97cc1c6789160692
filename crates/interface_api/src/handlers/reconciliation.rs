//! Reconciliation handlers
//!
//! Both endpoints are read-only: they report discrepancies and never mutate
//! payments or the ledger.

use std::str::FromStr;

use axum::{extract::State, Json};
use chrono::Utc;

use domain_payments::Provider;
use domain_reconciliation::{InternalAuditReport, ReconciliationReport};

use crate::dto::ReconciliationRunRequest;
use crate::error::ApiError;
use crate::AppState;

/// `POST /payments/reconciliation/run`
///
/// Compares a provider's settlement records against internal payments.
pub async fn run(
    State(state): State<AppState>,
    Json(request): Json<ReconciliationRunRequest>,
) -> Result<Json<ReconciliationReport>, ApiError> {
    let provider = Provider::from_str(&request.provider)
        .map_err(|_| ApiError::Validation(format!("unknown provider: {}", request.provider)))?;
    let report = state.reconciliation.run(provider, &request.records).await?;
    Ok(Json(report))
}

/// `POST /payments/reconciliation/audit`
///
/// Sweeps internal records for inconsistencies that need no provider data.
pub async fn audit(
    State(state): State<AppState>,
) -> Result<Json<InternalAuditReport>, ApiError> {
    let report = state.audit.find_discrepancies(Utc::now()).await?;
    Ok(Json(report))
}
