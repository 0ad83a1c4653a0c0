//! Admin endpoints: grants, catalog, rooms and withdrawal operations.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{
    AuditEntry, Gift, GiftId, LedgerError, Room, TransactionKind, UserId, WithdrawalId,
    WithdrawalStatus,
};
use z_ledger_store::{AccountLedger, AuditLog, Directory, LedgerEntry, WithdrawalLedger};

use super::credits::TransactionView;
use super::parse_id;
use super::withdrawals::{WithdrawalResponse, WithdrawalView};
use crate::audit::AuditAction;
use crate::auth::AdminAuth;
use crate::dispatch;
use crate::error::ApiError;
use crate::rate_limit::Operation;
use crate::state::AppState;

/// Maximum number of records returned by list endpoints.
const MAX_LIST_LIMIT: usize = 200;

// ============================================================================
// Credits
// ============================================================================

/// Admin grant request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsRequest {
    /// User to credit.
    pub user_id: String,
    /// Coins to mint.
    pub amount: i64,
    /// Reason for the audit trail.
    pub reason: String,
    /// `admin_add` (default) or `admin_topup`.
    #[serde(default)]
    pub kind: Option<String>,
}

/// Admin grant response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrantCreditsResponse {
    /// Always true.
    pub success: bool,
    /// The credit record.
    pub transaction: TransactionView,
    /// Balance after the grant.
    pub balance: i64,
}

/// Mint spendable coins for a user.
pub async fn grant_credits(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(body): Json<GrantCreditsRequest>,
) -> Result<Json<GrantCreditsResponse>, ApiError> {
    let payload = json!({
        "userId": body.user_id,
        "amount": body.amount,
        "reason": body.reason,
        "kind": body.kind,
    });

    let result = execute_grant(&state, &auth.admin_id, &body);
    let resource_id = result.as_ref().ok().map(|e| e.transaction.id.to_string());
    let entry = state.auditor.record(
        AuditAction {
            actor: &auth.admin_id,
            action: "admin.credits",
            resource: "transaction",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(GrantCreditsResponse {
        success: true,
        transaction: TransactionView::from(&entry.transaction),
        balance: entry.balance,
    }))
}

fn execute_grant(
    state: &AppState,
    admin_id: &str,
    body: &GrantCreditsRequest,
) -> Result<LedgerEntry, ApiError> {
    state.rate_limiter.check(
        admin_id,
        Operation::AdminCredit,
        state.config.rate_limits.admin_credit,
    )?;

    let user_id: UserId = parse_id(&body.user_id)?;
    let kind = match body.kind.as_deref() {
        Some(kind) => kind.parse::<TransactionKind>()?,
        None => TransactionKind::AdminAdd,
    };
    if !kind.is_admin_grant() {
        return Err(LedgerError::InvalidInput(format!("{kind} is not an admin grant")).into());
    }
    if body.reason.trim().is_empty() {
        return Err(LedgerError::InvalidInput("reason must not be blank".into()).into());
    }

    let entry = state.store.credit(&user_id, body.amount, kind, &body.reason)?;
    tracing::info!(
        admin_id = %admin_id,
        user_id = %user_id,
        amount = body.amount,
        kind = %kind,
        "Admin granted credits"
    );
    Ok(entry)
}

// ============================================================================
// Catalog and rooms
// ============================================================================

/// Gift upsert request.
#[derive(Debug, Deserialize)]
pub struct UpsertGiftRequest {
    /// Existing gift to update; a new id is generated when absent.
    #[serde(default)]
    pub id: Option<String>,
    /// Display name.
    pub name: String,
    /// Price in coins.
    pub price: i64,
}

/// A catalog gift.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftView {
    /// Gift ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Price in coins.
    pub price: i64,
    /// Last update.
    pub updated_at: String,
}

/// Create or update a catalog gift.
pub async fn upsert_gift(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Json(body): Json<UpsertGiftRequest>,
) -> Result<Json<GiftView>, ApiError> {
    let payload = json!({ "id": body.id, "name": body.name, "price": body.price });

    let result = save_gift(&state, &body);
    let resource_id = result.as_ref().ok().map(|g| g.id.to_string());
    let gift = state.auditor.record(
        AuditAction {
            actor: &auth.admin_id,
            action: "admin.gifts.upsert",
            resource: "gift",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(GiftView {
        id: gift.id.to_string(),
        name: gift.name,
        price: gift.price,
        updated_at: gift.updated_at.to_rfc3339(),
    }))
}

fn save_gift(state: &AppState, body: &UpsertGiftRequest) -> Result<Gift, ApiError> {
    let id = match body.id.as_deref() {
        Some(id) => parse_id::<GiftId>(id)?,
        None => GiftId::generate(),
    };
    let gift = Gift::new(id, body.name.trim(), body.price)?;
    state.store.put_gift(&gift)?;
    Ok(gift)
}

/// Room registration request.
#[derive(Debug, Deserialize)]
pub struct RegisterRoomRequest {
    /// Display name.
    pub name: String,
}

/// A public room.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    /// Room ID.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Registered at.
    pub created_at: String,
}

/// Register a public room.
pub async fn register_room(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(room_id): Path<String>,
    Json(body): Json<RegisterRoomRequest>,
) -> Result<Json<RoomView>, ApiError> {
    let payload = json!({ "name": body.name });

    let result = Room::new(room_id.as_str(), body.name.as_str())
        .map_err(ApiError::from)
        .and_then(|room| {
            state.store.put_room(&room)?;
            Ok(room)
        });
    let room = state.auditor.record(
        AuditAction {
            actor: &auth.admin_id,
            action: "admin.rooms.register",
            resource: "room",
        },
        Some(room_id.clone()),
        &payload,
        result,
    )?;

    Ok(Json(RoomView {
        id: room.id,
        name: room.name,
        created_at: room.created_at.to_rfc3339(),
    }))
}

// ============================================================================
// Withdrawals
// ============================================================================

/// Withdrawal list query.
#[derive(Debug, Deserialize)]
pub struct ListWithdrawalsQuery {
    /// Status filter (default `pending`).
    #[serde(default)]
    pub status: Option<String>,
    /// Maximum number of records (default 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    50
}

/// Withdrawal list response.
#[derive(Debug, Serialize)]
pub struct ListWithdrawalsResponse {
    /// Requests, newest first.
    pub withdrawals: Vec<WithdrawalView>,
}

/// List withdrawals by status.
pub async fn list_withdrawals(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<ListWithdrawalsQuery>,
) -> Result<Json<ListWithdrawalsResponse>, ApiError> {
    let status = match query.status.as_deref() {
        Some(status) => status.parse::<WithdrawalStatus>()?,
        None => WithdrawalStatus::Pending,
    };
    let withdrawals = state
        .store
        .list_withdrawals_by_status(status, query.limit.min(MAX_LIST_LIMIT))?;

    Ok(Json(ListWithdrawalsResponse {
        withdrawals: withdrawals.iter().map(WithdrawalView::from).collect(),
    }))
}

/// Withdrawals flagged for manual reconciliation.
pub async fn list_reconciliation(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<ListWithdrawalsQuery>,
) -> Result<Json<ListWithdrawalsResponse>, ApiError> {
    let withdrawals = state
        .store
        .list_reconciliation(query.limit.min(MAX_LIST_LIMIT))?;

    Ok(Json(ListWithdrawalsResponse {
        withdrawals: withdrawals.iter().map(WithdrawalView::from).collect(),
    }))
}

/// Dispatch a pending withdrawal to the payout channel.
pub async fn approve_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(withdrawal_id): Path<String>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let result = match parse_id::<WithdrawalId>(&withdrawal_id) {
        Ok(id) => dispatch::approve_withdrawal(&state, &id).await,
        Err(e) => Err(e),
    };
    let withdrawal = state.auditor.record(
        AuditAction {
            actor: &auth.admin_id,
            action: "admin.withdrawals.approve",
            resource: "withdrawal",
        },
        Some(withdrawal_id.clone()),
        &json!({}),
        result,
    )?;

    Ok(Json(WithdrawalResponse {
        withdrawal: WithdrawalView::from(&withdrawal),
    }))
}

/// Reject request.
#[derive(Debug, Deserialize)]
pub struct RejectWithdrawalRequest {
    /// Reason shown to the user.
    pub reason: String,
}

/// Reject a withdrawal and refund the reservation.
pub async fn reject_withdrawal(
    State(state): State<Arc<AppState>>,
    auth: AdminAuth,
    Path(withdrawal_id): Path<String>,
    Json(body): Json<RejectWithdrawalRequest>,
) -> Result<Json<WithdrawalResponse>, ApiError> {
    let payload = json!({ "reason": body.reason });

    let result = parse_id::<WithdrawalId>(&withdrawal_id).and_then(|id| {
        let reason = format!("rejected by {}: {}", auth.admin_id, body.reason.trim());
        let outcome = state.store.reject_withdrawal(&id, &reason)?;
        Ok(outcome.into_withdrawal())
    });
    let withdrawal = state.auditor.record(
        AuditAction {
            actor: &auth.admin_id,
            action: "admin.withdrawals.reject",
            resource: "withdrawal",
        },
        Some(withdrawal_id.clone()),
        &payload,
        result,
    )?;

    Ok(Json(WithdrawalResponse {
        withdrawal: WithdrawalView::from(&withdrawal),
    }))
}

// ============================================================================
// Audit log
// ============================================================================

/// Audit query.
#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    /// Maximum number of entries (default 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
}

/// Audit list response.
#[derive(Debug, Serialize)]
pub struct AuditResponse {
    /// Entries, newest first.
    pub entries: Vec<AuditEntry>,
}

/// Latest audit entries.
pub async fn list_audit(
    State(state): State<Arc<AppState>>,
    _auth: AdminAuth,
    Query(query): Query<AuditQuery>,
) -> Result<Json<AuditResponse>, ApiError> {
    let entries = state.store.list_audit(query.limit.min(MAX_LIST_LIMIT))?;
    Ok(Json(AuditResponse { entries }))
}
