//! Spendable balance, transfer and PIN handlers.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{
    month_key, validate_pin_format, LedgerError, Role, TopupProgress, TransactionRecord, UserId,
    UserProfile,
};
use z_ledger_store::{AccountLedger, Directory, TopupLedger, TransferReceipt};

use crate::audit::AuditAction;
use crate::auth::AuthUser;
use crate::crypto::{hash_pin, verify_pin};
use crate::error::ApiError;
use crate::rate_limit::Operation;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// Spendable coins.
    pub balance: i64,
}

/// Get the caller's spendable balance.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.store.get_balance(&auth.user_id)?;
    Ok(Json(BalanceResponse { balance }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// One transaction record as seen by a participant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    /// Transaction ID.
    pub id: String,
    /// Debited user, absent for system credits.
    pub from_user_id: Option<String>,
    /// Credited user, absent for system debits.
    pub to_user_id: Option<String>,
    /// Coins moved.
    pub amount: i64,
    /// Transaction kind.
    pub kind: String,
    /// Description.
    pub description: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&TransactionRecord> for TransactionView {
    fn from(tx: &TransactionRecord) -> Self {
        Self {
            id: tx.id.to_string(),
            from_user_id: tx.from_user.map(|u| u.to_string()),
            to_user_id: tx.to_user.map(|u| u.to_string()),
            amount: tx.amount,
            kind: tx.kind.to_string(),
            description: tx.description.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionView>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the caller's transaction history.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let transactions = state
        .store
        .list_transactions(&auth.user_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions = transactions
        .iter()
        .take(limit)
        .map(TransactionView::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}

/// Transfer request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    /// Recipient username.
    pub to_username: String,
    /// Coins to send.
    pub amount: i64,
    /// Sender's transfer PIN.
    pub pin: String,
    /// Optional note.
    #[serde(default)]
    pub description: Option<String>,
}

/// Transfer response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    /// Always true.
    pub success: bool,
    /// Human readable summary.
    pub message: String,
    /// The `transfer` record.
    pub transaction_id: String,
    /// Sender balance after the transfer.
    pub balance: i64,
}

/// Send spendable coins to another user by username.
pub async fn transfer(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<TransferRequest>,
) -> Result<Json<TransferResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({
        "toUsername": body.to_username,
        "amount": body.amount,
        "pin": body.pin,
        "description": body.description,
    });

    let result = execute_transfer(&state, &auth.user_id, &body);
    let resource_id = result.as_ref().ok().map(|(r, _)| r.transaction.id.to_string());
    let (receipt, recipient) = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "credits.transfer",
            resource: "transaction",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(TransferResponse {
        success: true,
        message: format!(
            "Sent {} coins to {}",
            receipt.transaction.amount, recipient.username
        ),
        transaction_id: receipt.transaction.id.to_string(),
        balance: receipt.from_balance,
    }))
}

fn execute_transfer(
    state: &AppState,
    sender_id: &UserId,
    body: &TransferRequest,
) -> Result<(TransferReceipt, UserProfile), ApiError> {
    state.rate_limiter.check(
        &sender_id.to_string(),
        Operation::Transfer,
        state.config.rate_limits.transfer,
    )?;

    let sender = load_profile(state, sender_id)?;
    if !state.config.transfer_roles.contains(&sender.role) {
        return Err(LedgerError::UnauthorizedRole {
            role: sender.role.to_string(),
            action: "transfer".into(),
        }
        .into());
    }

    validate_pin_format(&body.pin)?;
    let pin_ok = sender
        .pin_hash
        .as_deref()
        .is_some_and(|stored| verify_pin(&state.config.pin_secret, sender_id, &body.pin, stored));
    if !pin_ok {
        tracing::warn!(user_id = %sender_id, "Transfer rejected: invalid PIN");
        return Err(LedgerError::InvalidPin.into());
    }

    let recipient = state
        .store
        .find_user_by_username(&body.to_username)?
        .ok_or_else(|| LedgerError::UserNotFound {
            user: body.to_username.clone(),
        })?;

    let description = body
        .description
        .clone()
        .unwrap_or_else(|| format!("Transfer to {}", recipient.username));
    let receipt = state
        .store
        .transfer(sender_id, &recipient.user_id, body.amount, &description)?;

    if sender.role == Role::Mentor && recipient.role == Role::Merchant {
        record_topup(state, sender_id, &recipient.user_id, body.amount);
    }

    Ok((receipt, recipient))
}

/// Bookkeeping only: the transfer has committed and stands regardless.
fn record_topup(state: &AppState, mentor: &UserId, merchant: &UserId, amount: i64) {
    if let Err(e) = state.store.record_topup(
        mentor,
        merchant,
        amount,
        state.config.monthly_topup_quota,
        chrono::Utc::now(),
    ) {
        tracing::error!(
            error = %e,
            mentor = %mentor,
            merchant = %merchant,
            amount,
            "Failed to record merchant topup"
        );
    }
}

/// Look up a directory profile or fail with `UserNotFound`.
pub(crate) fn load_profile(state: &AppState, user_id: &UserId) -> Result<UserProfile, ApiError> {
    state
        .store
        .get_user(user_id)?
        .ok_or_else(|| {
            LedgerError::UserNotFound {
                user: user_id.to_string(),
            }
            .into()
        })
}

/// Set PIN request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetPinRequest {
    /// New six digit PIN.
    pub pin: String,
    /// Current PIN, required when one is set.
    #[serde(default)]
    pub current_pin: Option<String>,
}

/// Set PIN response.
#[derive(Debug, Serialize)]
pub struct SetPinResponse {
    /// Always true.
    pub success: bool,
}

/// Set or change the caller's transfer PIN.
pub async fn set_pin(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<SetPinRequest>,
) -> Result<Json<SetPinResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({ "pin": body.pin, "currentPin": body.current_pin });

    let result = change_pin(&state, &auth.user_id, &body);
    state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "credits.set_pin",
            resource: "user",
        },
        Some(actor.clone()),
        &payload,
        result,
    )?;

    Ok(Json(SetPinResponse { success: true }))
}

fn change_pin(state: &AppState, user_id: &UserId, body: &SetPinRequest) -> Result<(), ApiError> {
    validate_pin_format(&body.pin)?;
    let profile = load_profile(state, user_id)?;

    if let Some(stored) = profile.pin_hash.as_deref() {
        let current = body.current_pin.as_deref().ok_or(LedgerError::InvalidPin)?;
        if !verify_pin(&state.config.pin_secret, user_id, current, stored) {
            return Err(LedgerError::InvalidPin.into());
        }
    }

    let hash = hash_pin(&state.config.pin_secret, user_id, &body.pin);
    state.store.set_pin_hash(user_id, &hash)?;
    tracing::info!(user_id = %user_id, "Transfer PIN updated");
    Ok(())
}

/// Monthly topup progress of a merchant.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopupProgressResponse {
    /// Month (`YYYY-MM`).
    pub month: String,
    /// Coins received from mentors this month.
    pub received: i64,
    /// Advisory quota.
    pub quota: i64,
    /// Coins left before the quota.
    pub remaining: i64,
    /// Number of topups this month.
    pub transfer_count: u32,
    /// Has the quota been reached?
    pub quota_reached: bool,
}

impl From<&TopupProgress> for TopupProgressResponse {
    fn from(progress: &TopupProgress) -> Self {
        Self {
            month: progress.month.clone(),
            received: progress.received,
            quota: progress.quota,
            remaining: progress.remaining(),
            transfer_count: progress.transfer_count,
            quota_reached: progress.quota_reached(),
        }
    }
}

/// Current month's topup progress for the calling merchant.
pub async fn topup_progress(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
) -> Result<Json<TopupProgressResponse>, ApiError> {
    let profile = load_profile(&state, &auth.user_id)?;
    if profile.role != Role::Merchant {
        return Err(LedgerError::UnauthorizedRole {
            role: profile.role.to_string(),
            action: "view topup progress".into(),
        }
        .into());
    }

    let month = month_key(chrono::Utc::now());
    let progress = state
        .store
        .get_topup_progress(&auth.user_id, &month)?
        .unwrap_or_else(|| {
            TopupProgress::new(auth.user_id, month, state.config.monthly_topup_quota)
        });

    Ok(Json(TopupProgressResponse::from(&progress)))
}
