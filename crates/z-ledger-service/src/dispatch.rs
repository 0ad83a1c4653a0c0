//! Withdrawal dispatch.
//!
//! The reservation commits first. The payout channel is then called with no
//! store transaction open, bounded by `payout_timeout_ms`. A failed or timed
//! out submission is compensated by refunding the reservation exactly once.

use std::sync::Arc;
use std::time::Duration;

use z_ledger_core::{
    LedgerError, LinkedAccountId, UserId, WithdrawalId, WithdrawalRequest, WithdrawalStatus,
};
use z_ledger_store::{PayoutUpdate, WithdrawalLedger};

use crate::config::PayoutMode;
use crate::error::ApiError;
use crate::payout::{PayoutChannel, PayoutRequest};
use crate::state::AppState;

/// Reserve earnings for a withdrawal and, in auto mode, dispatch it.
///
/// # Errors
///
/// - Ledger errors from quoting and reservation.
/// - `PayoutFailed` if the channel failed; the reservation is refunded.
pub async fn request_withdrawal(
    state: &AppState,
    user_id: &UserId,
    account_id: &LinkedAccountId,
    amount_usd_cents: i64,
) -> Result<WithdrawalRequest, ApiError> {
    let quote = state.config.withdrawal_policy.quote(amount_usd_cents)?;
    let withdrawal = state.store.reserve_withdrawal(user_id, account_id, quote)?;

    tracing::info!(
        withdrawal_id = %withdrawal.id,
        user_id = %user_id,
        amount_coins = withdrawal.amount_coins,
        net_amount = withdrawal.net_amount,
        "Withdrawal reserved"
    );

    match (state.config.payout_mode, state.payout.as_ref()) {
        (PayoutMode::Auto, Some(channel)) => dispatch(state, channel.as_ref(), withdrawal).await,
        _ => Ok(withdrawal),
    }
}

/// Dispatch a pending withdrawal approved by an admin.
///
/// # Errors
///
/// - `WithdrawalNotFound`, `InvalidStateTransition` if it is not pending.
/// - `PayoutChannelFailure` if no channel is configured; the request stays pending.
/// - `PayoutFailed` if the channel failed; the reservation is refunded.
pub async fn approve_withdrawal(
    state: &AppState,
    withdrawal_id: &WithdrawalId,
) -> Result<WithdrawalRequest, ApiError> {
    let withdrawal = state
        .store
        .get_withdrawal(withdrawal_id)?
        .ok_or_else(|| LedgerError::WithdrawalNotFound {
            withdrawal_id: withdrawal_id.to_string(),
        })?;

    if withdrawal.status != WithdrawalStatus::Pending || withdrawal.payout_id.is_some() {
        return Err(LedgerError::InvalidStateTransition {
            from: withdrawal.status.to_string(),
            to: WithdrawalStatus::Processing.to_string(),
        }
        .into());
    }

    let channel: Arc<dyn PayoutChannel> = state.payout.clone().ok_or_else(|| {
        LedgerError::PayoutChannelFailure("no payout channel configured".into())
    })?;

    dispatch(state, channel.as_ref(), withdrawal).await
}

async fn dispatch(
    state: &AppState,
    channel: &dyn PayoutChannel,
    withdrawal: WithdrawalRequest,
) -> Result<WithdrawalRequest, ApiError> {
    let currency = state
        .config
        .payout
        .as_ref()
        .map_or("IDR", |p| p.currency.as_str());
    let request = PayoutRequest::for_withdrawal(&withdrawal, currency);
    let limit = Duration::from_millis(state.config.payout_timeout_ms);

    match tokio::time::timeout(limit, channel.submit(&request)).await {
        Ok(Ok(receipt)) => {
            let update = state.store.apply_payout_update(
                &withdrawal.id,
                Some(&receipt.payout_id),
                &receipt.status,
            )?;
            match update {
                PayoutUpdate::Refunded(rejected) => Err(ApiError::PayoutFailed {
                    reason: format!("payout {}", receipt.status),
                    withdrawal: Box::new(rejected),
                }),
                other => Ok(other.into_withdrawal()),
            }
        }
        Ok(Err(e)) => compensate(state, &withdrawal, e.to_string()),
        Err(_) => compensate(
            state,
            &withdrawal,
            format!("payout timed out after {}ms", state.config.payout_timeout_ms),
        ),
    }
}

fn compensate(
    state: &AppState,
    withdrawal: &WithdrawalRequest,
    reason: String,
) -> Result<WithdrawalRequest, ApiError> {
    tracing::warn!(
        withdrawal_id = %withdrawal.id,
        reason = %reason,
        "Payout dispatch failed, refunding reservation"
    );
    let refunded = state.store.refund_withdrawal(&withdrawal.id, &reason)?;
    Err(ApiError::PayoutFailed {
        reason,
        withdrawal: Box::new(refunded.into_withdrawal()),
    })
}
