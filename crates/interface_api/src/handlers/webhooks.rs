//! Webhook intake handler
//!
//! The handler is a thin shim over the dispatcher: it needs the raw body
//! bytes (signatures are computed over the exact bytes on the wire, not a
//! re-serialization) and the headers as plain strings.

use std::str::FromStr;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    Json,
};
use tracing::info;

use domain_payments::Provider;
use domain_webhooks::{DispatchOutcome, Headers};

use crate::dto::WebhookAck;
use crate::error::ApiError;
use crate::AppState;

fn to_header_map(headers: &HeaderMap) -> Headers {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
        })
        .collect()
}

/// `POST /payments/webhooks/:provider`
pub async fn receive(
    State(state): State<AppState>,
    Path(provider): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookAck>, ApiError> {
    let provider = Provider::from_str(&provider)
        .map_err(|_| ApiError::NotFound(format!("unknown webhook provider: {provider}")))?;

    let headers = to_header_map(&headers);
    let outcome = state.dispatcher.handle(provider, &headers, &body).await?;

    let ack = match outcome {
        DispatchOutcome::Processed => WebhookAck {
            status: "processed".to_string(),
            reason: None,
        },
        DispatchOutcome::Duplicate => WebhookAck {
            status: "duplicate".to_string(),
            reason: None,
        },
        DispatchOutcome::Ignored { reason } => {
            info!(provider = %provider, reason = %reason, "Webhook ignored");
            WebhookAck {
                status: "ignored".to_string(),
                reason: Some(reason),
            }
        }
    };
    Ok(Json(ack))
}
