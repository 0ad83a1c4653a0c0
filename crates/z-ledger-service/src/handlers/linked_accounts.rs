//! Linked payout account handlers.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{AccountType, LinkedAccount, LinkedAccountId, NewLinkedAccount};
use z_ledger_store::Registry;

use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// A linked account as returned by the API.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedAccountView {
    /// Account ID.
    pub id: String,
    /// Bank or e-wallet.
    #[serde(rename = "type")]
    pub account_type: String,
    /// Provider code.
    pub provider: String,
    /// Display name.
    pub account_name: String,
    /// Account number.
    pub account_number: String,
    /// Holder name.
    pub holder_name: String,
    /// Linked at.
    pub created_at: String,
}

impl From<&LinkedAccount> for LinkedAccountView {
    fn from(account: &LinkedAccount) -> Self {
        Self {
            id: account.id.to_string(),
            account_type: account.account_type.to_string(),
            provider: account.provider.clone(),
            account_name: account.account_name.clone(),
            account_number: account.account_number.clone(),
            holder_name: account.holder_name.clone(),
            created_at: account.created_at.to_rfc3339(),
        }
    }
}

/// Linked accounts response.
#[derive(Debug, Serialize)]
pub struct ListAccountsResponse {
    /// Active accounts, newest first.
    pub accounts: Vec<LinkedAccountView>,
}

/// List the caller's active linked accounts.
pub async fn list(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<ListAccountsResponse>, ApiError> {
    let accounts = state.store.list_linked_accounts(&auth.user_id)?;
    Ok(Json(ListAccountsResponse {
        accounts: accounts.iter().map(LinkedAccountView::from).collect(),
    }))
}

/// Link account request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkAccountRequest {
    /// Provider code, e.g. `BCA` or `GOPAY`.
    pub account_id: String,
    /// Display name.
    pub account_name: String,
    /// Account number.
    pub account_number: String,
    /// Holder name.
    pub holder_name: String,
    /// `bank` or `ewallet`.
    #[serde(rename = "type")]
    pub account_type: String,
}

/// Link account response.
#[derive(Debug, Serialize)]
pub struct LinkAccountResponse {
    /// The linked account.
    pub account: LinkedAccountView,
}

/// Link a payout account.
pub async fn create(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<LinkAccountRequest>,
) -> Result<Json<LinkAccountResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({
        "accountId": body.account_id,
        "accountName": body.account_name,
        "accountNumber": body.account_number,
        "holderName": body.holder_name,
        "type": body.account_type,
    });

    let result = body
        .account_type
        .parse::<AccountType>()
        .map_err(ApiError::from)
        .and_then(|account_type| {
            let input = NewLinkedAccount {
                account_type,
                provider: body.account_id.trim().to_ascii_uppercase(),
                account_name: body.account_name.clone(),
                account_number: body.account_number.clone(),
                holder_name: body.holder_name.clone(),
            };
            state
                .store
                .link_account(&auth.user_id, input)
                .map_err(ApiError::from)
        });
    let resource_id = result.as_ref().ok().map(|a| a.id.to_string());
    let account = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "linked_accounts.create",
            resource: "linked_account",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(LinkAccountResponse {
        account: LinkedAccountView::from(&account),
    }))
}

/// Unlink response.
#[derive(Debug, Serialize)]
pub struct DeleteAccountResponse {
    /// Always true.
    pub deleted: bool,
}

/// Unlink a payout account.
pub async fn delete(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Path(account_id): Path<String>,
) -> Result<Json<DeleteAccountResponse>, ApiError> {
    let actor = auth.user_id.to_string();

    let result = parse_id::<LinkedAccountId>(&account_id).and_then(|id| {
        state
            .store
            .unlink_account(&auth.user_id, &id)
            .map_err(ApiError::from)
    });
    state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "linked_accounts.delete",
            resource: "linked_account",
        },
        Some(account_id.clone()),
        &json!({}),
        result,
    )?;

    Ok(Json(DeleteAccountResponse { deleted: true }))
}
