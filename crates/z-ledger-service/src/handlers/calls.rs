//! Paid call billing handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::UserId;
use z_ledger_store::Settlement;

use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Interval charge request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    /// The user being called.
    pub receiver_id: String,
    /// Client-side interval price. Ignored; the tariff price is charged.
    #[serde(default)]
    pub amount: Option<i64>,
}

/// Session state after a charge.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    /// Call ID.
    pub call_id: String,
    /// Coins charged for this interval.
    pub charged: i64,
    /// Coins charged so far.
    pub charged_total: i64,
    /// Intervals charged so far.
    pub intervals: u32,
    /// Payer's spendable balance.
    pub balance: i64,
    /// The `call_charge` record.
    pub transaction_id: String,
}

/// Charge the caller for one interval of a paid call.
pub async fn charge(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(call_id): Path<String>,
    Json(body): Json<ChargeRequest>,
) -> Result<Json<ChargeResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({
        "callId": call_id,
        "receiverId": body.receiver_id,
        "amount": body.amount,
    });

    let result = parse_id::<UserId>(&body.receiver_id).and_then(|receiver| {
        state
            .store
            .charge_call_interval(&call_id, &auth.user_id, &receiver, &state.config.call_tariff)
            .map_err(ApiError::from)
    });
    let charge = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "calls.charge",
            resource: "call_session",
        },
        Some(call_id.clone()),
        &payload,
        result,
    )?;

    if let Some(claimed) = body.amount.filter(|a| *a != charge.transaction.amount) {
        tracing::debug!(
            call_id = %call_id,
            claimed,
            price = charge.transaction.amount,
            "Client interval price ignored"
        );
    }

    Ok(Json(ChargeResponse {
        call_id: charge.session.call_id,
        charged: charge.transaction.amount,
        charged_total: charge.session.charged_total,
        intervals: charge.session.intervals,
        balance: charge.payer_balance,
        transaction_id: charge.transaction.id.to_string(),
    }))
}

/// Finalize request. Either participant may settle the call.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeRequest {
    /// Client's view of the total. Compared and logged only.
    #[serde(default)]
    pub total_amount: i64,
    /// Call duration.
    #[serde(default)]
    pub duration_seconds: u64,
}

/// Settlement of a call.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeResponse {
    /// Call ID.
    pub call_id: String,
    /// Accumulated charges.
    pub gross_amount: i64,
    /// Receiver's share.
    pub user_share: i64,
    /// Platform's share.
    pub system_share: i64,
    /// Receiver's earnings balance.
    pub receiver_earnings: i64,
    /// Duration recorded on the session.
    pub duration_seconds: Option<u64>,
    /// The call had been settled by an earlier request.
    pub already_finalized: bool,
}

/// Settle a paid call.
pub async fn finalize(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(call_id): Path<String>,
    Json(body): Json<FinalizeRequest>,
) -> Result<Json<FinalizeResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({
        "callId": call_id,
        "totalAmount": body.total_amount,
        "durationSeconds": body.duration_seconds,
    });

    let result = state
        .store
        .finalize_call(
            &call_id,
            &auth.user_id,
            body.total_amount,
            body.duration_seconds,
        )
        .map_err(ApiError::from);
    let settlement = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "calls.finalize",
            resource: "call_session",
        },
        Some(call_id.clone()),
        &payload,
        result,
    )?;

    Ok(Json(FinalizeResponse {
        call_id: settlement.session.call_id,
        gross_amount: settlement.split.gross,
        user_share: settlement.split.user_share,
        system_share: settlement.split.system_share,
        receiver_earnings: settlement.receiver_earnings,
        duration_seconds: settlement.session.duration_seconds,
        already_finalized: settlement.already_finalized,
    }))
}
