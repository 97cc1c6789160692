//! Checkout start handler
//!
//! The catalog is the price authority: a client may name a package id or, for
//! custom top-ups, an explicit amount/credits pair, never both. Creation is
//! idempotent per `(user, idempotency_key)`; a replay returns the original
//! payment without opening a second provider session.

use std::str::FromStr;

use axum::{extract::State, http::HeaderMap, Json};
use tracing::info;
use validator::Validate;

use domain_payments::Provider;

use crate::dto::{CheckoutStartRequest, CheckoutStartResponse};
use crate::error::ApiError;
use crate::{user_from_headers, AppState};

/// `POST /payments/checkout/start`
pub async fn start(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<CheckoutStartRequest>,
) -> Result<Json<CheckoutStartResponse>, ApiError> {
    request.validate()?;
    let user = user_from_headers(&headers)?;
    let provider = Provider::from_str(&request.provider)
        .map_err(|_| ApiError::Validation(format!("unknown provider: {}", request.provider)))?;

    let custom = request.amount_cents.zip(request.credits);
    if request.amount_cents.is_some() != request.credits.is_some() {
        return Err(ApiError::Validation(
            "amount_cents and credits must be provided together".to_string(),
        ));
    }
    let (amount_cents, credits, currency) = match (&request.package_id, custom) {
        (Some(package_id), None) => {
            let package = state.catalog.get(package_id).ok_or_else(|| {
                ApiError::Validation(format!("unknown package: {package_id}"))
            })?;
            (package.amount_cents, package.credits, package.currency)
        }
        (None, Some((amount_cents, credits))) => {
            (amount_cents, credits, state.catalog.currency())
        }
        _ => {
            return Err(ApiError::Validation(
                "provide either package_id or a custom amount_cents/credits pair".to_string(),
            ))
        }
    };

    let (payment, created) = state
        .payments
        .create_payment(
            &user,
            provider,
            amount_cents,
            currency,
            credits,
            &request.idempotency_key,
        )
        .await?;

    if !created {
        // Replay: hand back what we know; the provider session from the
        // first call is not re-issued.
        return Ok(Json(CheckoutStartResponse {
            payment_id: payment.id.to_string(),
            status: payment.status,
            amount_cents: payment.amount_cents,
            credits: payment.credits_purchased,
            created: false,
            provider_session_id: payment.provider_session_id,
            client_secret: None,
            approval_url: None,
        }));
    }

    let adapter = state.checkout_adapters.get(&provider).ok_or_else(|| {
        ApiError::Validation(format!("checkout is not configured for {provider}"))
    })?;
    let session = adapter
        .create_checkout_session(&payment)
        .await
        .map_err(ApiError::from)?;
    let payment = state
        .payments
        .attach_checkout_session(&payment.id, &session)
        .await?;

    info!(
        payment = %payment.id,
        user = %user,
        provider = %provider,
        amount_cents,
        credits,
        "Checkout started"
    );
    Ok(Json(CheckoutStartResponse {
        payment_id: payment.id.to_string(),
        status: payment.status,
        amount_cents: payment.amount_cents,
        credits: payment.credits_purchased,
        created: true,
        provider_session_id: payment.provider_session_id,
        client_secret: session.client_secret,
        approval_url: session.approval_url,
    }))
}
