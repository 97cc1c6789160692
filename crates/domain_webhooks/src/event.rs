//! Normalized webhook events and the event audit store
//!
//! Each provider has its own event vocabulary; the normalizer flattens both
//! into [`NormalizedWebhookEvent`] so the dispatcher has a single code path.
//! Verified events are also recorded as [`StoredWebhookEvent`] rows for
//! audit and replay deduplication, with sanitized payload copies only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use core_kernel::{Currency, DomainPort, PaymentId, PortError, WebhookEventId};
use domain_payments::Provider;

/// Provider-agnostic view of one webhook event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizedWebhookEvent {
    pub provider: Provider,
    /// Provider event identifier, unique per provider
    pub event_id: String,
    /// Provider event type string, kept verbatim for audit
    pub event_type: String,
    /// Internal payment id carried in checkout metadata, when present
    pub payment_id: Option<PaymentId>,
    /// Provider-side payment/capture/intent identifier
    pub provider_payment_id: Option<String>,
    /// Provider-side checkout session identifier
    pub provider_session_id: Option<String>,
    /// Provider-reported status string
    pub status: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<Currency>,
    /// For refund events: refunded amount in cents
    pub refund_amount_cents: Option<i64>,
    pub provider_refund_id: Option<String>,
    pub failure_reason: Option<String>,
    pub customer_id: Option<String>,
    /// User id we wrote into checkout metadata, when echoed back
    pub metadata_user_id: Option<String>,
    pub is_success: bool,
    pub is_failure: bool,
    pub is_refund: bool,
}

impl NormalizedWebhookEvent {
    /// Events that should change payment state
    pub fn is_actionable(&self) -> bool {
        self.is_success || self.is_failure || self.is_refund
    }
}

/// Processing status of a stored event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Processed,
    Ignored,
}

/// Audit record of a verified webhook event.
///
/// `payload` is the sanitized copy, never the raw body. Events that could
/// not be attributed to a payment are not stored at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredWebhookEvent {
    pub id: WebhookEventId,
    pub provider: Provider,
    /// Provider event identifier; `(provider, provider_event_id)` is unique
    pub provider_event_id: String,
    pub event_type: String,
    pub payment_id: PaymentId,
    pub status: EventStatus,
    pub payload: Value,
    pub received_at: DateTime<Utc>,
}

impl StoredWebhookEvent {
    pub fn new(
        provider: Provider,
        provider_event_id: impl Into<String>,
        event_type: impl Into<String>,
        payment_id: PaymentId,
        status: EventStatus,
        payload: Value,
    ) -> Self {
        Self {
            id: WebhookEventId::new_v7(),
            provider,
            provider_event_id: provider_event_id.into(),
            event_type: event_type.into(),
            payment_id,
            status,
            payload,
            received_at: Utc::now(),
        }
    }
}

/// Result of an idempotent event insert
#[derive(Debug, Clone)]
pub enum EventInsert {
    Inserted(StoredWebhookEvent),
    /// An event with the same `(provider, provider_event_id)` already existed
    Existing(StoredWebhookEvent),
}

impl EventInsert {
    pub fn was_inserted(&self) -> bool {
        matches!(self, EventInsert::Inserted(_))
    }

    pub fn into_event(self) -> StoredWebhookEvent {
        match self {
            EventInsert::Inserted(e) | EventInsert::Existing(e) => e,
        }
    }
}

/// Port for the webhook event audit log
#[async_trait]
pub trait WebhookEventStore: DomainPort {
    /// Records an event, or returns the existing row for the same
    /// `(provider, provider_event_id)`.
    async fn insert_or_get(&self, event: StoredWebhookEvent) -> Result<EventInsert, PortError>;

    async fn list_for_payment(
        &self,
        payment_id: &PaymentId,
    ) -> Result<Vec<StoredWebhookEvent>, PortError>;
}
