//! Withdrawal handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{LedgerError, LinkedAccountId, UserId, WithdrawalRequest};
use z_ledger_store::WithdrawalLedger;

use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::AuthUser;
use crate::dispatch;
use crate::error::ApiError;
use crate::rate_limit::Operation;
use crate::state::AppState;

/// Number of requests returned by the history endpoint.
const HISTORY_LIMIT: usize = 50;

/// A withdrawal request as returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalView {
    /// Request ID.
    pub id: String,
    /// Requested dollars.
    pub amount_usd: f64,
    /// Requested cents.
    pub amount_usd_cents: i64,
    /// Coins reserved.
    pub amount_coins: i64,
    /// Fee in coins.
    pub fee_coins: i64,
    /// Coins paid out after the fee.
    pub net_amount: i64,
    /// Lifecycle status.
    pub status: String,
    /// Has the reservation been returned?
    pub refunded: bool,
    /// Provider payout id.
    pub payout_id: Option<String>,
    /// Last provider status.
    pub payout_status: Option<String>,
    /// Needs an operator's attention.
    pub needs_reconciliation: bool,
    /// Notes.
    pub notes: Option<String>,
    /// Linked account used.
    pub linked_account_id: String,
    /// Bank or e-wallet.
    pub account_type: String,
    /// Provider code.
    pub provider: String,
    /// Destination number.
    pub account_number: String,
    /// Created.
    pub created_at: String,
    /// Reached a terminal state.
    pub processed_at: Option<String>,
}

impl From<&WithdrawalRequest> for WithdrawalView {
    fn from(w: &WithdrawalRequest) -> Self {
        Self {
            id: w.id.to_string(),
            amount_usd: w.amount_usd(),
            amount_usd_cents: w.amount_usd_cents,
            amount_coins: w.amount_coins,
            fee_coins: w.fee_coins,
            net_amount: w.net_amount,
            status: w.status.to_string(),
            refunded: w.refunded,
            payout_id: w.payout_id.clone(),
            payout_status: w.payout_status.clone(),
            needs_reconciliation: w.needs_reconciliation,
            notes: w.notes.clone(),
            linked_account_id: w.linked_account_id.to_string(),
            account_type: w.destination.account_type.to_string(),
            provider: w.destination.provider.clone(),
            account_number: w.destination.account_number.clone(),
            created_at: w.created_at.to_rfc3339(),
            processed_at: w.processed_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// Exchange rate response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeRateResponse {
    /// Coins per dollar.
    pub coins_per_usd: i64,
    /// Minimum withdrawal in coins.
    pub min_withdraw_coins: i64,
    /// Minimum withdrawal in dollars.
    pub min_withdraw_usd: f64,
    /// Fee in basis points.
    pub fee_bps: i64,
}

/// Current conversion rules.
pub async fn exchange_rate(State(state): State<Arc<AppState>>) -> Json<ExchangeRateResponse> {
    let policy = state.config.withdrawal_policy;
    Json(ExchangeRateResponse {
        coins_per_usd: policy.coins_per_usd,
        min_withdraw_coins: policy.min_coins(),
        min_withdraw_usd: policy.min_usd_cents as f64 / 100.0,
        fee_bps: policy.fee_bps,
    })
}

/// Withdrawal request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWithdrawalRequest {
    /// Dollars to withdraw.
    pub amount: f64,
    /// Linked account to pay out to.
    pub account_id: String,
}

/// Withdrawal response.
#[derive(Debug, Serialize)]
pub struct WithdrawalResponse {
    /// The request.
    pub withdrawal: WithdrawalView,
}

/// Request a withdrawal of earnings.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CreateWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({ "amount": body.amount, "accountId": body.account_id });

    let result = execute_withdrawal(&state, &auth.user_id, &body).await;
    let resource_id = match &result {
        Ok(w) => Some(w.id.to_string()),
        Err(ApiError::PayoutFailed { withdrawal, .. }) => Some(withdrawal.id.to_string()),
        Err(_) => None,
    };
    let withdrawal = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "withdrawals.create",
            resource: "withdrawal",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(WithdrawalResponse {
        withdrawal: WithdrawalView::from(&withdrawal),
    }))
}

async fn execute_withdrawal(
    state: &AppState,
    user_id: &UserId,
    body: &CreateWithdrawalRequest,
) -> Result<WithdrawalRequest, ApiError> {
    state.rate_limiter.check(
        &user_id.to_string(),
        Operation::Withdrawal,
        state.config.rate_limits.withdrawal,
    )?;

    let cents = usd_to_cents(body.amount)?;
    let account_id: LinkedAccountId = parse_id(&body.account_id)?;
    dispatch::request_withdrawal(state, user_id, &account_id, cents).await
}

#[allow(clippy::cast_possible_truncation)]
fn usd_to_cents(amount: f64) -> Result<i64, LedgerError> {
    if !amount.is_finite() || amount <= 0.0 || amount > 1e12 {
        return Err(LedgerError::InvalidAmount(format!(
            "withdrawal amount must be a positive dollar value, got {amount}"
        )));
    }
    Ok((amount * 100.0).round() as i64)
}

/// Withdrawal history response.
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    /// Requests, newest first.
    pub withdrawals: Vec<WithdrawalView>,
}

/// The caller's withdrawal history.
pub async fn history(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<HistoryResponse>, ApiError> {
    let withdrawals = state
        .store
        .list_withdrawals_by_user(&auth.user_id, HISTORY_LIMIT)?;

    Ok(Json(HistoryResponse {
        withdrawals: withdrawals.iter().map(WithdrawalView::from).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn usd_amounts_round_to_cents() {
        assert_eq!(usd_to_cents(10.0).unwrap(), 1_000);
        assert_eq!(usd_to_cents(12.345).unwrap(), 1_235);
        assert!(usd_to_cents(0.0).is_err());
        assert!(usd_to_cents(-5.0).is_err());
        assert!(usd_to_cents(f64::NAN).is_err());
    }
}
