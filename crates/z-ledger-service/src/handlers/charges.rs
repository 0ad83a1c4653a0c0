//! Direct spendable charges by other platform services.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{LedgerError, TransactionKind, UserId};
use z_ledger_store::{AccountLedger, LedgerEntry};

use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Charge request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    /// User being charged.
    pub user_id: String,
    /// Coins to debit.
    pub amount: i64,
    /// `frame_purchase` or `gift_purchase`.
    pub kind: String,
    /// Description.
    #[serde(default)]
    pub description: String,
}

/// Charge response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeResponse {
    /// The debit record.
    pub transaction_id: String,
    /// Balance after the charge.
    pub balance: i64,
}

/// Debit a user's spendable balance on behalf of another service.
pub async fn create_charge(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ChargeRequest>,
) -> Result<Json<ChargeResponse>, ApiError> {
    tracing::debug!(
        service = %auth.service_name,
        user_id = %body.user_id,
        amount = body.amount,
        kind = %body.kind,
        "Processing service charge"
    );
    let payload = json!({
        "userId": body.user_id,
        "amount": body.amount,
        "kind": body.kind,
        "description": body.description,
    });

    let result = execute_charge(&state, &body);
    let resource_id = result.as_ref().ok().map(|e| e.transaction.id.to_string());
    let entry = state.auditor.record(
        AuditAction {
            actor: &auth.service_name,
            action: "charges.create",
            resource: "transaction",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(ChargeResponse {
        transaction_id: entry.transaction.id.to_string(),
        balance: entry.balance,
    }))
}

fn execute_charge(state: &AppState, body: &ChargeRequest) -> Result<LedgerEntry, ApiError> {
    let user_id: UserId = parse_id(&body.user_id)?;
    let kind: TransactionKind = body.kind.parse()?;
    if !kind.is_service_charge() {
        return Err(LedgerError::InvalidInput(format!(
            "{kind} cannot be charged by a service"
        ))
        .into());
    }

    let description = if body.description.trim().is_empty() {
        kind.to_string()
    } else {
        body.description.clone()
    };
    Ok(state.store.debit(&user_id, body.amount, kind, &description)?)
}
