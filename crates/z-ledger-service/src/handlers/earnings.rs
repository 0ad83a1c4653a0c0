//! Earnings handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use z_ledger_store::EarningsLedger;

use super::gifts::GiftEarningView;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Earnings balance response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsResponse {
    /// Withdrawable coins.
    pub balance: i64,
    /// Coins earned over all time.
    pub total_earned: i64,
    /// Coins paid out.
    pub total_withdrawn: i64,
    /// Balance converted to dollars.
    pub balance_usd: f64,
    /// Does the balance reach the minimum withdrawal?
    pub can_withdraw: bool,
    /// Minimum withdrawal in coins.
    pub min_withdraw_coins: i64,
}

/// Get the caller's earnings.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<EarningsResponse>, ApiError> {
    let earnings = state.store.get_earnings(&auth.user_id)?;
    let policy = state.config.withdrawal_policy;

    Ok(Json(EarningsResponse {
        balance: earnings.balance,
        total_earned: earnings.total_earned,
        total_withdrawn: earnings.total_withdrawn,
        balance_usd: policy.coins_to_usd(earnings.balance),
        can_withdraw: earnings.can_withdraw(policy.min_coins()),
        min_withdraw_coins: policy.min_coins(),
    }))
}

/// Gift earnings query parameters.
#[derive(Debug, Deserialize)]
pub struct GiftEarningsQuery {
    /// Maximum number of records (default: 50, max 100).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Gift earnings response.
#[derive(Debug, Serialize)]
pub struct GiftEarningsResponse {
    /// Records, newest first.
    pub earnings: Vec<GiftEarningView>,
}

/// Gifts the caller has received.
pub async fn list_gift_earnings(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<GiftEarningsQuery>,
) -> Result<Json<GiftEarningsResponse>, ApiError> {
    let earnings = state
        .store
        .list_gift_earnings(&auth.user_id, query.limit.min(100))?;

    Ok(Json(GiftEarningsResponse {
        earnings: earnings.iter().map(GiftEarningView::from).collect(),
    }))
}
