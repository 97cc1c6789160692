//! Event normalization
//!
//! Maps raw provider payloads into [`NormalizedWebhookEvent`]. Unrecognized
//! event types normalize to `None` and are acknowledged without effect, so
//! new provider events never break the endpoint.
//!
//! Amount handling differs per provider: Stripe reports integer minor units,
//! PayPal reports decimal strings (`"10.00"`); both normalize to cents.

use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use core_kernel::{Currency, Money, PaymentId};
use domain_payments::Provider;

use crate::error::WebhookError;
use crate::event::NormalizedWebhookEvent;

/// Internal payment id from provider metadata, trying both key spellings
fn payment_id_from_metadata(metadata: &Value) -> Option<PaymentId> {
    ["payment_id", "internal_payment_id"]
        .iter()
        .filter_map(|key| metadata.get(key).and_then(Value::as_str))
        .find_map(|s| PaymentId::from_str(s).ok())
}

fn currency_of(value: Option<&str>) -> Option<Currency> {
    value.and_then(|s| Currency::from_str(s).ok())
}

fn str_field<'a>(object: &'a Value, key: &str) -> Option<&'a str> {
    object.get(key).and_then(Value::as_str)
}

fn i64_field(object: &Value, key: &str) -> Option<i64> {
    object.get(key).and_then(Value::as_i64)
}

/// Normalizes a verified Stripe event payload.
///
/// Returns `Ok(None)` for event types this system does not act on.
pub fn normalize_stripe(payload: &Value) -> Result<Option<NormalizedWebhookEvent>, WebhookError> {
    let event_id = str_field(payload, "id")
        .ok_or_else(|| WebhookError::Malformed("missing event id".to_string()))?
        .to_string();
    let event_type = str_field(payload, "type")
        .ok_or_else(|| WebhookError::Malformed("missing event type".to_string()))?
        .to_string();
    let object = payload
        .get("data")
        .and_then(|d| d.get("object"))
        .ok_or_else(|| WebhookError::Malformed("missing data.object".to_string()))?;

    let metadata = object.get("metadata").cloned().unwrap_or(Value::Null);
    let payment_id = payment_id_from_metadata(&metadata);
    let customer_id = str_field(object, "customer").map(str::to_string);
    let currency = currency_of(str_field(object, "currency"));

    let mut event = NormalizedWebhookEvent {
        provider: Provider::Stripe,
        event_id,
        event_type: event_type.clone(),
        payment_id,
        provider_payment_id: None,
        provider_session_id: None,
        status: str_field(object, "status").map(str::to_string),
        amount_cents: None,
        currency,
        refund_amount_cents: None,
        provider_refund_id: None,
        failure_reason: None,
        customer_id,
        metadata_user_id: str_field(&metadata, "user_id").map(str::to_string),
        is_success: false,
        is_failure: false,
        is_refund: false,
    };

    match event_type.as_str() {
        "checkout.session.completed" => {
            event.provider_session_id = str_field(object, "id").map(str::to_string);
            event.provider_payment_id = str_field(object, "payment_intent").map(str::to_string);
            event.amount_cents = i64_field(object, "amount_total");
            event.status = str_field(object, "payment_status").map(str::to_string);
            // Async payment methods complete the session before the money
            // clears; only a paid session is a success.
            event.is_success = event.status.as_deref() != Some("unpaid");
        }
        "payment_intent.succeeded" => {
            event.provider_payment_id = str_field(object, "id").map(str::to_string);
            event.amount_cents = i64_field(object, "amount");
            event.is_success = true;
        }
        "payment_intent.payment_failed" => {
            event.provider_payment_id = str_field(object, "id").map(str::to_string);
            event.amount_cents = i64_field(object, "amount");
            event.failure_reason = object
                .get("last_payment_error")
                .and_then(|e| e.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string);
            event.is_failure = true;
        }
        "charge.succeeded" => {
            event.provider_payment_id = str_field(object, "payment_intent")
                .or_else(|| str_field(object, "id"))
                .map(str::to_string);
            event.amount_cents = i64_field(object, "amount");
            event.is_success = true;
        }
        "charge.failed" => {
            event.provider_payment_id = str_field(object, "payment_intent")
                .or_else(|| str_field(object, "id"))
                .map(str::to_string);
            event.failure_reason = str_field(object, "failure_message").map(str::to_string);
            event.is_failure = true;
        }
        "charge.refunded" => {
            event.provider_payment_id = str_field(object, "payment_intent")
                .or_else(|| str_field(object, "id"))
                .map(str::to_string);
            event.amount_cents = i64_field(object, "amount");
            event.refund_amount_cents = i64_field(object, "amount_refunded");
            // Stripe lists refunds most-recent-first; the event is about
            // the newest one.
            event.provider_refund_id = object
                .get("refunds")
                .and_then(|r| r.get("data"))
                .and_then(Value::as_array)
                .and_then(|data| data.first())
                .and_then(|refund| str_field(refund, "id"))
                .map(str::to_string);
            event.is_refund = true;
        }
        t if t.starts_with("refund.") => {
            event.provider_refund_id = str_field(object, "id").map(str::to_string);
            event.provider_payment_id = str_field(object, "payment_intent")
                .or_else(|| str_field(object, "charge"))
                .map(str::to_string);
            event.refund_amount_cents = i64_field(object, "amount");
            // refund.created arrives while the refund is still pending;
            // only a settled refund reverses credits.
            event.is_refund = event.status.as_deref() == Some("succeeded");
        }
        other => {
            debug!(event_type = other, "Unhandled Stripe event type");
            return Ok(None);
        }
    }

    Ok(Some(event))
}

/// Parses a PayPal decimal amount string (e.g. `"10.00"`) into cents
fn paypal_amount_cents(amount: &Value) -> Option<i64> {
    let value = str_field(amount, "value")?;
    let currency = str_field(amount, "currency_code")
        .and_then(|code| Currency::from_str(code).ok())
        .unwrap_or(Currency::USD);
    let decimal = Decimal::from_str(value).ok()?;
    Money::new(decimal, currency).as_minor().ok()
}

/// The `custom_id` we set at order creation: either a bare payment id or a
/// JSON object carrying one.
fn payment_id_from_custom_id(custom_id: &str) -> Option<PaymentId> {
    if let Ok(parsed) = serde_json::from_str::<Value>(custom_id) {
        if let Some(id) = parsed.get("payment_id").and_then(Value::as_str) {
            return PaymentId::from_str(id).ok();
        }
    }
    PaymentId::from_str(custom_id).ok()
}

/// User id embedded in a JSON-shaped `custom_id`, when present
fn user_id_from_custom_id(custom_id: &str) -> Option<String> {
    let parsed = serde_json::from_str::<Value>(custom_id).ok()?;
    parsed
        .get("user_id")
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Capture id a PayPal refund points back to, via its `up` link
fn capture_id_from_links(resource: &Value) -> Option<String> {
    resource
        .get("links")
        .and_then(Value::as_array)?
        .iter()
        .find(|link| str_field(link, "rel") == Some("up"))
        .and_then(|link| str_field(link, "href"))
        .and_then(|href| href.rsplit('/').next())
        .map(str::to_string)
}

/// Normalizes a verified PayPal event payload.
///
/// Returns `Ok(None)` for event types this system does not act on.
pub fn normalize_paypal(payload: &Value) -> Result<Option<NormalizedWebhookEvent>, WebhookError> {
    let event_id = str_field(payload, "id")
        .ok_or_else(|| WebhookError::Malformed("missing event id".to_string()))?
        .to_string();
    let event_type = str_field(payload, "event_type")
        .ok_or_else(|| WebhookError::Malformed("missing event_type".to_string()))?
        .to_string();
    let resource = payload
        .get("resource")
        .ok_or_else(|| WebhookError::Malformed("missing resource".to_string()))?;

    let payment_id = str_field(resource, "custom_id").and_then(payment_id_from_custom_id);
    let amount = resource.get("amount");
    let amount_cents = amount.and_then(paypal_amount_cents);
    let currency = amount
        .and_then(|a| str_field(a, "currency_code"))
        .and_then(|c| Currency::from_str(c).ok());

    let mut event = NormalizedWebhookEvent {
        provider: Provider::PayPal,
        event_id,
        event_type: event_type.clone(),
        payment_id,
        provider_payment_id: None,
        provider_session_id: None,
        status: str_field(resource, "status").map(str::to_string),
        amount_cents,
        currency,
        refund_amount_cents: None,
        provider_refund_id: None,
        failure_reason: None,
        customer_id: None,
        metadata_user_id: str_field(resource, "custom_id")
            .and_then(user_id_from_custom_id),
        is_success: false,
        is_failure: false,
        is_refund: false,
    };

    match event_type.as_str() {
        "PAYMENT.CAPTURE.COMPLETED" => {
            event.provider_payment_id = str_field(resource, "id").map(str::to_string);
            event.is_success = true;
        }
        "PAYMENT.CAPTURE.DENIED" => {
            event.provider_payment_id = str_field(resource, "id").map(str::to_string);
            event.failure_reason = resource
                .get("status_details")
                .and_then(|d| d.get("reason"))
                .and_then(Value::as_str)
                .map(str::to_string);
            event.is_failure = true;
        }
        "PAYMENT.CAPTURE.REFUNDED" => {
            // resource is the refund object; the capture hangs off its links
            event.provider_refund_id = str_field(resource, "id").map(str::to_string);
            event.provider_payment_id = capture_id_from_links(resource);
            event.refund_amount_cents = amount_cents;
            event.amount_cents = None;
            event.is_refund = true;
        }
        "CHECKOUT.ORDER.APPROVED" | "CHECKOUT.ORDER.COMPLETED" => {
            // Order milestones; the capture event is what grants credits.
            event.provider_session_id = str_field(resource, "id").map(str::to_string);
        }
        other => {
            debug!(event_type = other, "Unhandled PayPal event type");
            return Ok(None);
        }
    }

    Ok(Some(event))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pay_id() -> PaymentId {
        PaymentId::new()
    }

    #[test]
    fn stripe_checkout_session_completed() {
        let id = pay_id();
        let payload = json!({
            "id": "evt_1",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_123",
                "payment_intent": "pi_456",
                "amount_total": 2999,
                "currency": "usd",
                "payment_status": "paid",
                "customer": "cus_789",
                "metadata": { "payment_id": id.to_string() }
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert!(event.is_success);
        assert_eq!(event.payment_id, Some(id));
        assert_eq!(event.provider_payment_id.as_deref(), Some("pi_456"));
        assert_eq!(event.provider_session_id.as_deref(), Some("cs_123"));
        assert_eq!(event.amount_cents, Some(2999));
        assert_eq!(event.currency, Some(Currency::USD));
        assert_eq!(event.customer_id.as_deref(), Some("cus_789"));
    }

    #[test]
    fn stripe_unpaid_session_is_not_success() {
        let payload = json!({
            "id": "evt_2",
            "type": "checkout.session.completed",
            "data": { "object": {
                "id": "cs_123",
                "payment_status": "unpaid"
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert!(!event.is_success);
    }

    #[test]
    fn stripe_payment_failed_carries_reason() {
        let payload = json!({
            "id": "evt_3",
            "type": "payment_intent.payment_failed",
            "data": { "object": {
                "id": "pi_456",
                "amount": 2999,
                "last_payment_error": { "message": "card_declined" }
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert!(event.is_failure);
        assert_eq!(event.failure_reason.as_deref(), Some("card_declined"));
    }

    #[test]
    fn stripe_charge_refunded() {
        let payload = json!({
            "id": "evt_4",
            "type": "charge.refunded",
            "data": { "object": {
                "id": "ch_1",
                "payment_intent": "pi_456",
                "amount": 2999,
                "amount_refunded": 1000,
                "refunds": { "data": [ { "id": "re_1" } ] }
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert!(event.is_refund);
        assert_eq!(event.refund_amount_cents, Some(1000));
        assert_eq!(event.provider_refund_id.as_deref(), Some("re_1"));
        assert_eq!(event.provider_payment_id.as_deref(), Some("pi_456"));
    }

    #[test]
    fn stripe_charge_refunded_takes_the_newest_refund() {
        // Second partial refund on the same charge: the refund list is
        // most-recent-first and the event must carry the new refund's id,
        // not the already-recorded first one.
        let payload = json!({
            "id": "evt_4b",
            "type": "charge.refunded",
            "data": { "object": {
                "id": "ch_1",
                "payment_intent": "pi_456",
                "amount": 2999,
                "amount_refunded": 1500,
                "refunds": { "data": [ { "id": "re_new" }, { "id": "re_old" } ] }
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert_eq!(event.provider_refund_id.as_deref(), Some("re_new"));
    }

    #[test]
    fn stripe_pending_refund_event_is_not_actionable() {
        let payload = json!({
            "id": "evt_5",
            "type": "refund.created",
            "data": { "object": {
                "id": "re_2",
                "charge": "ch_1",
                "amount": 500,
                "status": "pending"
            }}
        });
        let event = normalize_stripe(&payload).unwrap().unwrap();
        assert!(!event.is_refund);
        assert!(!event.is_actionable());
    }

    #[test]
    fn stripe_unknown_type_normalizes_to_none() {
        let payload = json!({
            "id": "evt_6",
            "type": "customer.created",
            "data": { "object": {} }
        });
        assert!(normalize_stripe(&payload).unwrap().is_none());
    }

    #[test]
    fn stripe_missing_object_is_malformed() {
        let payload = json!({ "id": "evt_7", "type": "charge.succeeded" });
        assert!(matches!(
            normalize_stripe(&payload),
            Err(WebhookError::Malformed(_))
        ));
    }

    #[test]
    fn paypal_capture_completed() {
        let id = pay_id();
        let payload = json!({
            "id": "WH-1",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "CAP-1",
                "status": "COMPLETED",
                "custom_id": id.to_string(),
                "amount": { "value": "29.99", "currency_code": "USD" }
            }
        });
        let event = normalize_paypal(&payload).unwrap().unwrap();
        assert!(event.is_success);
        assert_eq!(event.payment_id, Some(id));
        assert_eq!(event.provider_payment_id.as_deref(), Some("CAP-1"));
        assert_eq!(event.amount_cents, Some(2999));
        assert_eq!(event.currency, Some(Currency::USD));
    }

    #[test]
    fn paypal_custom_id_as_json_object() {
        let id = pay_id();
        let payload = json!({
            "id": "WH-2",
            "event_type": "PAYMENT.CAPTURE.COMPLETED",
            "resource": {
                "id": "CAP-2",
                "custom_id": json!({ "payment_id": id.to_string() }).to_string(),
                "amount": { "value": "5.00", "currency_code": "MXN" }
            }
        });
        let event = normalize_paypal(&payload).unwrap().unwrap();
        assert_eq!(event.payment_id, Some(id));
        assert_eq!(event.amount_cents, Some(500));
    }

    #[test]
    fn paypal_refund_uses_up_link_for_capture() {
        let payload = json!({
            "id": "WH-3",
            "event_type": "PAYMENT.CAPTURE.REFUNDED",
            "resource": {
                "id": "REF-1",
                "amount": { "value": "10.00", "currency_code": "USD" },
                "links": [
                    { "rel": "self", "href": "https://api.paypal.com/v2/payments/refunds/REF-1" },
                    { "rel": "up", "href": "https://api.paypal.com/v2/payments/captures/CAP-1" }
                ]
            }
        });
        let event = normalize_paypal(&payload).unwrap().unwrap();
        assert!(event.is_refund);
        assert_eq!(event.provider_refund_id.as_deref(), Some("REF-1"));
        assert_eq!(event.provider_payment_id.as_deref(), Some("CAP-1"));
        assert_eq!(event.refund_amount_cents, Some(1000));
    }

    #[test]
    fn paypal_order_approved_is_not_actionable() {
        let payload = json!({
            "id": "WH-4",
            "event_type": "CHECKOUT.ORDER.APPROVED",
            "resource": { "id": "ORD-1", "status": "APPROVED" }
        });
        let event = normalize_paypal(&payload).unwrap().unwrap();
        assert!(!event.is_actionable());
        assert_eq!(event.provider_session_id.as_deref(), Some("ORD-1"));
    }

    #[test]
    fn paypal_unknown_type_normalizes_to_none() {
        let payload = json!({
            "id": "WH-5",
            "event_type": "BILLING.SUBSCRIPTION.CREATED",
            "resource": {}
        });
        assert!(normalize_paypal(&payload).unwrap().is_none());
    }
}
