//! Credit balance and history handlers

use axum::{extract::State, http::HeaderMap, Json};

use crate::dto::{BalanceResponse, HistoryResponse, TransactionResponse, WelcomeCreditsResponse};
use crate::error::ApiError;
use crate::{user_from_headers, AppState};

/// `GET /payments/credits/balance`
pub async fn balance(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    let balance = state.credits.balance(&user).await?;
    let wallet = state.wallet.get_or_create(&user).await?;
    Ok(Json(BalanceResponse {
        user_id: user.as_str().to_string(),
        balance,
        reserved: wallet.balance_reserved,
        spendable: wallet.spendable(balance),
    }))
}

/// `GET /payments/credits/history`
pub async fn history(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<HistoryResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    let transactions = state.credits.history(&user).await?;
    Ok(Json(HistoryResponse {
        user_id: user.as_str().to_string(),
        transactions: transactions.iter().map(TransactionResponse::from).collect(),
    }))
}

/// `POST /payments/credits/welcome`
///
/// One-shot signup grant; replays report `granted: false`.
pub async fn welcome(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<WelcomeCreditsResponse>, ApiError> {
    let user = user_from_headers(&headers)?;
    let amount = state.config.welcome_credits;
    if amount <= 0 {
        return Err(ApiError::Validation(
            "welcome credits are disabled".to_string(),
        ));
    }
    let outcome = state.credits.grant_welcome_credits(&user, amount).await?;
    let balance = state.credits.balance(&user).await?;
    Ok(Json(WelcomeCreditsResponse {
        granted: outcome.applied,
        credits: outcome.transaction.credits_abs(),
        balance,
    }))
}
