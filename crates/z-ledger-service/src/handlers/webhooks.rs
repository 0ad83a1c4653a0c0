//! Payout provider callbacks.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::parse_reference_id;
use z_ledger_store::{PayoutUpdate, WithdrawalLedger};

use crate::audit::AuditAction;
use crate::crypto::constant_time_eq;
use crate::error::ApiError;
use crate::state::AppState;

/// Payout status callback.
#[derive(Debug, Deserialize)]
pub struct PayoutCallback {
    /// Provider payout id.
    pub id: String,
    /// `WD-{withdrawal id}`.
    #[serde(alias = "referenceId")]
    pub reference_id: String,
    /// Provider status.
    pub status: String,
    /// Provider failure code.
    #[serde(default, alias = "failureCode")]
    pub failure_code: Option<String>,
}

/// Callback acknowledgement.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CallbackResponse {
    /// Always true.
    pub received: bool,
    /// Withdrawal status after the callback.
    pub status: String,
    /// Flagged for manual reconciliation.
    pub needs_reconciliation: bool,
}

/// Handle a payout status callback.
pub async fn payout_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(callback): Json<PayoutCallback>,
) -> Result<Json<CallbackResponse>, ApiError> {
    verify_callback_token(&state, &headers)?;

    tracing::info!(
        payout_id = %callback.id,
        reference_id = %callback.reference_id,
        status = %callback.status,
        failure_code = ?callback.failure_code,
        "Received payout callback"
    );

    let payload = json!({
        "id": callback.id,
        "referenceId": callback.reference_id,
        "status": callback.status,
        "failureCode": callback.failure_code,
    });

    let result = parse_reference_id(&callback.reference_id)
        .ok_or_else(|| {
            ApiError::BadRequest(format!("unknown reference id: {}", callback.reference_id))
        })
        .and_then(|withdrawal_id| {
            state
                .store
                .apply_payout_update(&withdrawal_id, Some(&callback.id), &callback.status)
                .map_err(ApiError::from)
        });
    let update = state.auditor.record(
        AuditAction {
            actor: "payout-provider",
            action: "webhooks.payout",
            resource: "withdrawal",
        },
        Some(callback.reference_id.clone()),
        &payload,
        result,
    )?;

    if let PayoutUpdate::Reconciliation(w) = &update {
        tracing::error!(withdrawal_id = %w.id, "Payout callback needs manual reconciliation");
    }

    let withdrawal = update.withdrawal();
    Ok(Json(CallbackResponse {
        received: true,
        status: withdrawal.status.to_string(),
        needs_reconciliation: withdrawal.needs_reconciliation,
    }))
}

fn verify_callback_token(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let Some(expected) = state
        .config
        .payout
        .as_ref()
        .and_then(|p| p.callback_token.as_deref())
    else {
        tracing::warn!("Payout callback token not configured - rejecting callback");
        return Err(ApiError::Unauthorized);
    };

    let provided = headers
        .get("x-callback-token")
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Unauthorized)?;

    if constant_time_eq(provided, expected) {
        Ok(())
    } else {
        tracing::warn!("Payout callback token mismatch");
        Err(ApiError::Unauthorized)
    }
}
