//! HTTP API Layer
//!
//! This crate provides the REST facade for the prepaid credits system using
//! Axum.
//!
//! # Architecture
//!
//! - **Handlers**: webhook intake, checkout, status polling, refunds,
//!   reservations, reconciliation
//! - **Providers**: outbound Stripe/PayPal adapters for checkout and refunds
//! - **DTOs**: request/response data transfer objects
//! - **Error Handling**: consistent status mapping (401 signature, 422
//!   validation, 409 conflict; business rejections never 5xx)
//!
//! The facade performs no authentication itself: callers arrive through an
//! upstream gateway that injects the authenticated subject as the
//! `x-user-id` header.
//!
//! # Example
//!
//! ```rust,ignore
//! use interface_api::{create_router, AppState};
//!
//! let app = create_router(state);
//! axum::serve(listener, app).await?;
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod dto;
pub mod providers;
pub mod wiring;

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    http::HeaderMap,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use core_kernel::UserId;
use domain_ledger::{CreditService, WalletService};
use domain_payments::{
    PackageCatalog, PaymentService, Provider, ProviderCheckoutAdapter, RefundOrchestrator,
    ReservationService,
};
use domain_reconciliation::{InternalAudit, ReconciliationService};
use domain_webhooks::WebhookDispatcher;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::handlers::{
    checkout, credits, health, payments, reconciliation, refunds, reservations, webhooks,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub credits: CreditService,
    pub wallet: WalletService,
    pub payments: PaymentService,
    pub refunds: RefundOrchestrator,
    pub reservations: ReservationService,
    pub dispatcher: WebhookDispatcher,
    pub reconciliation: ReconciliationService,
    pub audit: InternalAudit,
    pub catalog: PackageCatalog,
    pub checkout_adapters: HashMap<Provider, Arc<dyn ProviderCheckoutAdapter>>,
}

/// Extracts the authenticated subject injected by the upstream gateway
pub(crate) fn user_from_headers(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(UserId::new)
        .ok_or_else(|| ApiError::Unauthorized("missing x-user-id header".to_string()))
}

/// Creates the main API router
pub fn create_router(state: AppState) -> Router {
    let payment_routes = Router::new()
        .route("/webhooks/:provider", post(webhooks::receive))
        .route("/checkout/start", post(checkout::start))
        .route("/:id/status", get(payments::status))
        .route("/:id/refunds", post(refunds::create))
        .route("/reservations", post(reservations::create))
        .route("/reservations/expire", post(reservations::expire_batch))
        .route(
            "/reservations/:operation_code/consume",
            post(reservations::consume),
        )
        .route(
            "/reservations/:operation_code/cancel",
            post(reservations::cancel),
        )
        .route("/reconciliation/run", post(reconciliation::run))
        .route("/reconciliation/audit", post(reconciliation::audit))
        .route("/credits/balance", get(credits::balance))
        .route("/credits/history", get(credits::history))
        .route("/credits/welcome", post(credits::welcome));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/payments", payment_routes)
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
