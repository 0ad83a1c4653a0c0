//! Gift handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use z_ledger_core::{GiftEarning, GiftId, RoomContext, UserId};
use z_ledger_store::{GiftReceipt, Settlement};

use super::credits::TransactionView;
use super::parse_id;
use crate::audit::AuditAction;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

/// Affordability check request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBalanceRequest {
    /// Catalog gift.
    pub gift_id: String,
}

/// Affordability check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckBalanceResponse {
    /// Catalog gift.
    pub gift_id: String,
    /// Gift name.
    pub name: String,
    /// Catalog price.
    pub price: i64,
    /// Caller's spendable balance.
    pub balance: i64,
    /// Does the balance cover the price?
    pub can_afford: bool,
    /// Coins the recipient would earn.
    pub user_share: i64,
    /// Coins the platform would keep.
    pub system_share: i64,
}

/// Preview a gift purchase.
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<CheckBalanceRequest>,
) -> Result<Json<CheckBalanceResponse>, ApiError> {
    let gift_id: GiftId = parse_id(&body.gift_id)?;
    let quote = state.store.quote_gift(&auth.user_id, &gift_id)?;

    Ok(Json(CheckBalanceResponse {
        gift_id: quote.gift.id.to_string(),
        name: quote.gift.name,
        price: quote.gift.price,
        balance: quote.balance,
        can_afford: quote.can_afford,
        user_share: quote.split.user_share,
        system_share: quote.split.system_share,
    }))
}

/// Gift purchase request.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseGiftRequest {
    /// Catalog gift.
    pub gift_id: String,
    /// Who receives the gift.
    pub recipient_user_id: String,
    /// Room the gift was sent in.
    #[serde(default)]
    pub room_id: Option<String>,
    /// Client-side price. Ignored; the catalog price is charged.
    #[serde(default)]
    pub price: Option<i64>,
}

/// Gift earning as returned to the sender.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftEarningView {
    /// Earning record ID.
    pub id: String,
    /// Recipient.
    pub recipient_user_id: String,
    /// Sender.
    pub sender_user_id: String,
    /// Sender username at the time of the gift.
    pub sender_username: String,
    /// Catalog gift.
    pub gift_id: String,
    /// Gift name.
    pub gift_name: String,
    /// Price paid.
    pub gift_price: i64,
    /// Recipient's share.
    pub user_share: i64,
    /// Platform's share.
    pub system_share: i64,
    /// Room id, if any.
    pub room_id: Option<String>,
    /// Sent in a private chat?
    pub is_private: bool,
    /// Timestamp.
    pub created_at: String,
}

impl From<&GiftEarning> for GiftEarningView {
    fn from(earning: &GiftEarning) -> Self {
        Self {
            id: earning.id.to_string(),
            recipient_user_id: earning.recipient.to_string(),
            sender_user_id: earning.sender.to_string(),
            sender_username: earning.sender_username.clone(),
            gift_id: earning.gift_id.to_string(),
            gift_name: earning.gift_name.clone(),
            gift_price: earning.gift_price,
            user_share: earning.user_share,
            system_share: earning.system_share,
            room_id: earning.room.as_ref().map(|r| r.id().to_string()),
            is_private: earning.is_private,
            created_at: earning.created_at.to_rfc3339(),
        }
    }
}

/// Balances after a gift.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GiftBalances {
    /// Sender's spendable balance.
    pub sender: i64,
    /// Recipient's earnings balance.
    pub recipient_earnings: i64,
}

/// Gift purchase response.
#[derive(Debug, Serialize)]
pub struct PurchaseGiftResponse {
    /// Always true.
    pub success: bool,
    /// The `gift` record.
    pub transaction: TransactionView,
    /// The earning record.
    pub earning: GiftEarningView,
    /// Balances after the gift.
    pub balances: GiftBalances,
}

/// Buy a catalog gift for another user.
pub async fn purchase(
    State(state): State<Arc<AppState>>,
    auth: AuthUser,
    Json(body): Json<PurchaseGiftRequest>,
) -> Result<Json<PurchaseGiftResponse>, ApiError> {
    let actor = auth.user_id.to_string();
    let payload = json!({
        "giftId": body.gift_id,
        "recipientUserId": body.recipient_user_id,
        "roomId": body.room_id,
        "price": body.price,
    });

    let result = execute_purchase(&state, &auth.user_id, &body);
    let resource_id = result.as_ref().ok().map(|r| r.transaction.id.to_string());
    let receipt = state.auditor.record(
        AuditAction {
            actor: &actor,
            action: "gifts.purchase",
            resource: "transaction",
        },
        resource_id,
        &payload,
        result,
    )?;

    Ok(Json(PurchaseGiftResponse {
        success: true,
        transaction: TransactionView::from(&receipt.transaction),
        earning: GiftEarningView::from(&receipt.earning),
        balances: GiftBalances {
            sender: receipt.sender_balance,
            recipient_earnings: receipt.recipient_earnings,
        },
    }))
}

fn execute_purchase(
    state: &AppState,
    sender: &UserId,
    body: &PurchaseGiftRequest,
) -> Result<GiftReceipt, ApiError> {
    let gift_id: GiftId = parse_id(&body.gift_id)?;
    let recipient: UserId = parse_id(&body.recipient_user_id)?;
    let room = body
        .room_id
        .as_deref()
        .map(RoomContext::parse)
        .transpose()?;

    let receipt = state
        .store
        .purchase_gift(sender, &recipient, &gift_id, room.as_ref())?;

    if let Some(claimed) = body.price.filter(|p| *p != receipt.earning.gift_price) {
        tracing::debug!(
            gift_id = %gift_id,
            claimed,
            charged = receipt.earning.gift_price,
            "Client price ignored in favour of catalog price"
        );
    }

    Ok(receipt)
}
