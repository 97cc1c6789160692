//! Application wiring
//!
//! Builds every service over a shared [`MemoryBackend`] and assembles the
//! provider adapters and webhook verifiers from configuration. Providers
//! without credentials are simply absent: their checkout is unconfigured and
//! their webhook endpoint rejects everything.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};

use core_kernel::{AdapterConfig, Currency};
use domain_ledger::{CreditService, WalletService};
use domain_payments::{
    PackageCatalog, PaymentService, Provider, ProviderCheckoutAdapter, ProviderRefundAdapter,
    RefundOrchestrator, ReservationService,
};
use domain_reconciliation::{InternalAudit, ReconciliationService};
use domain_webhooks::{PayPalHttpClient, WebhookDispatcher, WebhookVerifier};
use infra_memory::MemoryBackend;

use crate::config::ApiConfig;
use crate::providers::{paypal::PayPalAdapter, stripe::StripeAdapter};
use crate::AppState;

/// Builds the application state over the in-memory backend
pub fn build_state(config: ApiConfig, backend: MemoryBackend) -> anyhow::Result<AppState> {
    let ledger_store = Arc::new(backend.ledger_store());
    let wallet_store = Arc::new(backend.wallet_store());
    let payment_store = Arc::new(backend.payment_store());
    let refund_store = Arc::new(backend.refund_store());
    let reservation_store = Arc::new(backend.reservation_store());
    let event_store = Arc::new(backend.event_store());

    let credits = CreditService::new(ledger_store.clone());
    let wallet = WalletService::new(wallet_store, ledger_store);
    let payments = PaymentService::new(payment_store.clone(), credits.clone());

    let mut checkout_adapters: HashMap<Provider, Arc<dyn ProviderCheckoutAdapter>> =
        HashMap::new();
    let mut refund_adapters: HashMap<Provider, Arc<dyn ProviderRefundAdapter>> = HashMap::new();

    if let Some(secret_key) = &config.stripe.secret_key {
        let adapter = Arc::new(
            StripeAdapter::new(&config.stripe.base_url, secret_key, AdapterConfig::default())
                .context("failed to build Stripe adapter")?,
        );
        checkout_adapters.insert(Provider::Stripe, adapter.clone());
        refund_adapters.insert(Provider::Stripe, adapter);
        info!("Stripe adapter configured");
    }
    if let (Some(client_id), Some(client_secret)) =
        (&config.paypal.client_id, &config.paypal.client_secret)
    {
        let adapter = Arc::new(
            PayPalAdapter::new(
                &config.paypal.base_url,
                client_id,
                client_secret,
                AdapterConfig::default(),
            )
            .context("failed to build PayPal adapter")?,
        );
        checkout_adapters.insert(Provider::PayPal, adapter.clone());
        refund_adapters.insert(Provider::PayPal, adapter);
        info!("PayPal adapter configured");
    }

    let refunds = RefundOrchestrator::new(
        payment_store.clone(),
        refund_store,
        credits.clone(),
        refund_adapters,
    );
    let reservations = ReservationService::new(reservation_store, wallet.clone(), credits.clone());

    let verifiers = build_verifiers(&config)?;
    let dispatcher = WebhookDispatcher::new(
        verifiers,
        payments.clone(),
        refunds.clone(),
        event_store.clone(),
    );

    let reconciliation = ReconciliationService::new(payment_store.clone());
    let audit = InternalAudit::new(payment_store, event_store);

    Ok(AppState {
        config,
        credits,
        wallet,
        payments,
        refunds,
        reservations,
        dispatcher,
        reconciliation,
        audit,
        catalog: PackageCatalog::default_catalog(Currency::USD),
        checkout_adapters,
    })
}

/// Assembles one verifier per configured provider.
///
/// The insecure bypass replaces all verifiers, but only when the environment
/// permits it; elsewhere the request is logged and ignored.
fn build_verifiers(
    config: &ApiConfig,
) -> anyhow::Result<HashMap<Provider, WebhookVerifier>> {
    let mut verifiers = HashMap::new();

    if config.allow_insecure_webhooks {
        if let Some(bypass) = WebhookVerifier::insecure(config.environment) {
            verifiers.insert(Provider::Stripe, bypass.clone());
            verifiers.insert(Provider::PayPal, bypass);
            return Ok(verifiers);
        }
    }

    match &config.stripe.webhook_secret {
        Some(secret) => {
            verifiers.insert(Provider::Stripe, WebhookVerifier::stripe(secret));
        }
        None => warn!("No Stripe webhook secret configured; Stripe webhooks will be rejected"),
    }

    match (
        &config.paypal.client_id,
        &config.paypal.client_secret,
        &config.paypal.webhook_id,
    ) {
        (Some(client_id), Some(client_secret), Some(webhook_id)) => {
            let api = PayPalHttpClient::new(
                &config.paypal.base_url,
                client_id,
                client_secret,
                AdapterConfig::default(),
            )
            .context("failed to build PayPal verification client")?;
            verifiers.insert(
                Provider::PayPal,
                WebhookVerifier::paypal(Arc::new(api), webhook_id),
            );
        }
        _ => warn!("PayPal webhook verification not configured; PayPal webhooks will be rejected"),
    }

    Ok(verifiers)
}
