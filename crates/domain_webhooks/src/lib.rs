//! Webhooks Domain - Verified Provider Event Intake
//!
//! Payment providers notify us of payment outcomes through webhooks. Nothing
//! in this crate trusts a webhook until its signature is verified; after
//! that, provider-specific payloads are normalized into one internal event
//! shape and dispatched idempotently against the payment domain.
//!
//! Pipeline:
//!
//! ```text
//! raw body + headers
//!   -> verify   (Stripe HMAC / PayPal verification API; fail-closed)
//!   -> normalize (provider payload -> NormalizedWebhookEvent)
//!   -> dispatch  (resolve payment, dedupe by event id, apply effects)
//! ```
//!
//! Stored copies of webhook payloads are sanitized first: only whitelisted
//! audit fields survive, the rest is replaced by a payload hash.

pub mod error;
pub mod event;
pub mod verify;
pub mod paypal_api;
pub mod normalize;
pub mod sanitize;
pub mod dispatch;

pub use error::WebhookError;
pub use event::{NormalizedWebhookEvent, StoredWebhookEvent, WebhookEventStore, EventStatus, EventInsert};
pub use verify::{WebhookVerifier, StripeVerifier, PayPalVerifier, Headers, STRIPE_TOLERANCE_SECS};
pub use paypal_api::{PayPalVerificationApi, PayPalHttpClient, PayPalVerifyRequest};
pub use normalize::{normalize_stripe, normalize_paypal};
pub use sanitize::sanitize_payload;
pub use dispatch::{WebhookDispatcher, DispatchOutcome};
