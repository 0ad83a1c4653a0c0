//! API error types and responses.

use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

use z_ledger_core::{LedgerError, WithdrawalRequest};
use z_ledger_store::StoreError;

use crate::handlers::withdrawals::WithdrawalView;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Bad request - malformed input not covered by a ledger rule.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A ledger rule rejected the operation.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// The payout channel failed; the withdrawal was rejected and refunded.
    #[error("payout channel failure: {reason}")]
    PayoutFailed {
        /// Why the channel failed.
        reason: String,
        /// The withdrawal after the compensating refund.
        withdrawal: Box<WithdrawalRequest>,
    },

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

/// Status, code and details of a ledger failure.
fn classify(err: &LedgerError) -> (StatusCode, &'static str, Option<serde_json::Value>) {
    match err {
        LedgerError::InsufficientBalance { balance, required } => (
            StatusCode::BAD_REQUEST,
            "insufficient_balance",
            Some(json!({ "balance": balance, "required": required })),
        ),
        LedgerError::InvalidRecipient(_) => (StatusCode::BAD_REQUEST, "invalid_recipient", None),
        LedgerError::UnauthorizedRole { role, .. } => (
            StatusCode::FORBIDDEN,
            "unauthorized_role",
            Some(json!({ "role": role })),
        ),
        LedgerError::InvalidPin => (StatusCode::BAD_REQUEST, "invalid_pin", None),
        LedgerError::DuplicateLinkedAccount => {
            (StatusCode::BAD_REQUEST, "duplicate_linked_account", None)
        }
        LedgerError::RoomMembershipMismatch { .. } => {
            (StatusCode::BAD_REQUEST, "room_membership_mismatch", None)
        }
        LedgerError::RateLimited { retry_after_secs } => (
            StatusCode::TOO_MANY_REQUESTS,
            "rate_limited",
            Some(json!({ "retryAfterSecs": retry_after_secs })),
        ),
        LedgerError::PayoutChannelFailure(_) => {
            (StatusCode::BAD_GATEWAY, "payout_channel_failure", None)
        }
        LedgerError::ConcurrentModification => {
            (StatusCode::CONFLICT, "concurrent_modification", None)
        }
        LedgerError::UserNotFound { .. } => (StatusCode::NOT_FOUND, "user_not_found", None),
        LedgerError::UsernameTaken { .. } => (StatusCode::CONFLICT, "username_taken", None),
        LedgerError::GiftNotFound { .. } => (StatusCode::NOT_FOUND, "gift_not_found", None),
        LedgerError::LinkedAccountNotFound { .. } => {
            (StatusCode::NOT_FOUND, "linked_account_not_found", None)
        }
        LedgerError::WithdrawalNotFound { .. } => {
            (StatusCode::NOT_FOUND, "withdrawal_not_found", None)
        }
        LedgerError::CallSessionNotFound { .. } => {
            (StatusCode::NOT_FOUND, "call_session_not_found", None)
        }
        LedgerError::CallSessionMismatch { .. } => {
            (StatusCode::CONFLICT, "call_session_mismatch", None)
        }
        LedgerError::CallAlreadyFinalized { .. } => {
            (StatusCode::CONFLICT, "call_already_finalized", None)
        }
        LedgerError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "invalid_amount", None),
        LedgerError::BelowMinimumWithdrawal {
            minimum_coins,
            requested_coins,
        } => (
            StatusCode::BAD_REQUEST,
            "below_minimum_withdrawal",
            Some(json!({ "minimumCoins": minimum_coins, "requestedCoins": requested_coins })),
        ),
        LedgerError::InvalidStateTransition { .. } => {
            (StatusCode::CONFLICT, "invalid_state_transition", None)
        }
        LedgerError::InvalidInput(_) | LedgerError::InvalidId(_) => {
            (StatusCode::BAD_REQUEST, "invalid_input", None)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut retry_after = None;
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::Ledger(err) => {
                if let LedgerError::RateLimited { retry_after_secs } = err {
                    retry_after = Some(*retry_after_secs);
                }
                let (status, code, details) = classify(err);
                (status, code, err.to_string(), details)
            }
            Self::PayoutFailed { reason, withdrawal } => (
                StatusCode::BAD_GATEWAY,
                "payout_channel_failure",
                format!("Payout failed: {reason}. The amount was returned to your earnings."),
                serde_json::to_value(WithdrawalView::from(withdrawal.as_ref()))
                    .ok()
                    .map(|w| json!({ "withdrawal": w })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if let Some(secs) = retry_after {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Ledger(e) => Self::Ledger(e),
            StoreError::Contention(msg) => {
                tracing::warn!(reason = %msg, "Store contention reached the API layer");
                Self::Ledger(LedgerError::ConcurrentModification)
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
