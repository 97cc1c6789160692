//! Payload sanitization
//!
//! Webhook payloads carry PII (names, emails, billing addresses) that has no
//! business in our audit log. Stored copies are rebuilt from a whitelist of
//! audit-relevant fields; everything else is dropped and the original body
//! is represented only by its SHA-256 hash.

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use domain_payments::Provider;

/// Top-level fields preserved from any provider payload
const COMMON_FIELDS: [&str; 6] = ["id", "type", "event_type", "created", "create_time", "livemode"];

/// Fields preserved from the event's inner object/resource
const OBJECT_FIELDS: [&str; 14] = [
    "id",
    "object",
    "status",
    "payment_status",
    "amount",
    "amount_total",
    "amount_refunded",
    "currency",
    "payment_intent",
    "charge",
    "custom_id",
    "invoice_id",
    "created",
    "update_time",
];

/// Metadata keys that identify our own records (never PII)
const METADATA_FIELDS: [&str; 3] = ["payment_id", "internal_payment_id", "user_id"];

fn copy_fields(source: &Value, fields: &[&str]) -> Map<String, Value> {
    let mut out = Map::new();
    if let Some(obj) = source.as_object() {
        for field in fields {
            if let Some(value) = obj.get(*field) {
                // amount objects are nested for PayPal; keep value/currency only
                if *field == "amount" && value.is_object() {
                    let mut amount = Map::new();
                    for key in ["value", "currency_code"] {
                        if let Some(v) = value.get(key) {
                            amount.insert(key.to_string(), v.clone());
                        }
                    }
                    out.insert((*field).to_string(), Value::Object(amount));
                } else if value.is_object() || value.is_array() {
                    // nested structures other than amount are not whitelisted
                    continue;
                } else {
                    out.insert((*field).to_string(), value.clone());
                }
            }
        }
    }
    out
}

/// Builds the sanitized audit copy of a webhook payload.
///
/// `raw_body` is the exact bytes received; its hash lets an operator match
/// the audit row against provider dashboard logs without storing the body.
pub fn sanitize_payload(provider: Provider, payload: &Value, raw_body: &[u8]) -> Value {
    let mut hasher = Sha256::new();
    hasher.update(raw_body);
    let hash = hex::encode(hasher.finalize());

    let object = match provider {
        Provider::Stripe => payload.get("data").and_then(|d| d.get("object")),
        Provider::PayPal => payload.get("resource"),
    }
    .unwrap_or(&Value::Null);

    let mut sanitized = copy_fields(payload, &COMMON_FIELDS);
    sanitized.insert(
        "object".to_string(),
        Value::Object(copy_fields(object, &OBJECT_FIELDS)),
    );

    let metadata = copy_fields(
        object.get("metadata").unwrap_or(&Value::Null),
        &METADATA_FIELDS,
    );
    if !metadata.is_empty() {
        sanitized.insert("metadata".to_string(), Value::Object(metadata));
    }

    sanitized.insert("sanitized".to_string(), json!(true));
    sanitized.insert("payload_sha256".to_string(), json!(hash));
    Value::Object(sanitized)
}
