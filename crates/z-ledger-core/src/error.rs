//! Error types for z-ledger.

use crate::ids::IdError;

/// Result type for z-ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors that can occur in ledger, settlement and withdrawal operations.
///
/// Every variant except the storage faults is a caller-visible reason; the
/// service layer maps each one to a distinct HTTP status and error code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A debit would drive a balance below zero.
    #[error("insufficient balance: balance={balance}, required={required}")]
    InsufficientBalance {
        /// Balance observed under the row lock.
        balance: i64,
        /// Amount the operation needed.
        required: i64,
    },

    /// Self-transfer, self-gift, self-call or a recipient that cannot receive.
    #[error("invalid recipient: {0}")]
    InvalidRecipient(String),

    /// The caller's role may not perform this operation.
    #[error("role {role} is not allowed to {action}")]
    UnauthorizedRole {
        /// Role of the caller.
        role: String,
        /// What the caller attempted.
        action: String,
    },

    /// The transfer PIN is missing, malformed or wrong.
    #[error("invalid PIN")]
    InvalidPin,

    /// The account number is already linked (possibly by another user).
    #[error("account number is already linked")]
    DuplicateLinkedAccount,

    /// The claimed room context does not match the participants.
    #[error("room membership mismatch: {room}")]
    RoomMembershipMismatch {
        /// The room id the caller claimed.
        room: String,
    },

    /// Too many requests within the rate limit window.
    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited {
        /// Seconds until the oldest request leaves the window.
        retry_after_secs: u64,
    },

    /// The external payout channel failed; the reservation has been refunded.
    #[error("payout channel failure: {0}")]
    PayoutChannelFailure(String),

    /// Lock contention could not be resolved within the retry budget.
    #[error("concurrent modification, please retry")]
    ConcurrentModification,

    /// User not found in the directory and no balance row exists.
    #[error("user not found: {user}")]
    UserNotFound {
        /// User id or username that was looked up.
        user: String,
    },

    /// Username already belongs to another user.
    #[error("username already taken: {username}")]
    UsernameTaken {
        /// The conflicting username.
        username: String,
    },

    /// Gift is not in the catalog.
    #[error("gift not found: {gift_id}")]
    GiftNotFound {
        /// The gift id that was looked up.
        gift_id: String,
    },

    /// Linked account does not exist, is inactive, or belongs to someone else.
    #[error("linked account not found: {account_id}")]
    LinkedAccountNotFound {
        /// The linked account id that was looked up.
        account_id: String,
    },

    /// Withdrawal request does not exist.
    #[error("withdrawal not found: {withdrawal_id}")]
    WithdrawalNotFound {
        /// The withdrawal id that was looked up.
        withdrawal_id: String,
    },

    /// Call session does not exist.
    #[error("call session not found: {call_id}")]
    CallSessionNotFound {
        /// The call id that was looked up.
        call_id: String,
    },

    /// Call session exists but with different participants.
    #[error("call session {call_id} belongs to different participants")]
    CallSessionMismatch {
        /// The call id that was looked up.
        call_id: String,
    },

    /// Call session has already been settled.
    #[error("call session already finalized: {call_id}")]
    CallAlreadyFinalized {
        /// The call id.
        call_id: String,
    },

    /// Amount is zero, negative or overflows.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// Withdrawal amount is below the configured minimum.
    #[error("withdrawal below minimum: minimum={minimum_coins}, requested={requested_coins}")]
    BelowMinimumWithdrawal {
        /// Minimum withdrawal in coins.
        minimum_coins: i64,
        /// Requested withdrawal in coins.
        requested_coins: i64,
    },

    /// Withdrawal status transition is not allowed.
    #[error("invalid withdrawal transition from {from} to {to}")]
    InvalidStateTransition {
        /// Current status.
        from: String,
        /// Requested status.
        to: String,
    },

    /// Malformed request input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Invalid identifier.
    #[error("invalid identifier: {0}")]
    InvalidId(#[from] IdError),
}

impl LedgerError {
    /// Build an `InvalidAmount` error for a non-positive amount.
    #[must_use]
    pub fn non_positive(amount: i64) -> Self {
        Self::InvalidAmount(format!("amount must be positive, got {amount}"))
    }
}

/// Reject zero and negative amounts.
///
/// # Errors
///
/// Returns `LedgerError::InvalidAmount` when `amount <= 0`.
pub fn ensure_positive(amount: i64) -> Result<i64> {
    if amount <= 0 {
        return Err(LedgerError::non_positive(amount));
    }
    Ok(amount)
}
