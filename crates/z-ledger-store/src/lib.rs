//! Transactional `RocksDB` storage layer for z-ledger.
//!
//! This crate owns every balance mutation in the system. Each mutating
//! operation runs in one pessimistic `RocksDB` transaction: it locks the rows
//! it touches, re-checks the ledger rules under the lock, writes the new rows
//! and exactly one transaction record, and commits, or it rolls back and
//! leaves nothing behind.
//!
//! # Architecture
//!
//! The operations are grouped by concern, one trait each, all implemented by
//! [`RocksStore`]:
//!
//! - [`AccountLedger`]: spendable balances, transfers, transaction history
//! - [`EarningsLedger`]: withdrawable earnings and gift earning records
//! - [`Settlement`]: gift purchases and paid call billing
//! - [`WithdrawalLedger`]: reservation, payout outcomes, exactly-once refunds
//! - [`Registry`]: linked payout accounts with globally unique numbers
//! - [`Directory`]: users, gift catalog, public rooms
//! - [`TopupLedger`]: advisory monthly mentor to merchant topups
//! - [`AuditLog`]: append-only audit entries
//!
//! # Example
//!
//! ```no_run
//! use z_ledger_store::{AccountLedger, Directory, RocksStore};
//! use z_ledger_core::{Role, TransactionKind, UserId, UserProfile};
//!
//! let store = RocksStore::open("/tmp/z-ledger-db").unwrap();
//!
//! let alice = UserId::generate();
//! store.put_user(&UserProfile::new(alice, "alice", Role::User).unwrap()).unwrap();
//! store.credit(&alice, 1_000, TransactionKind::AdminAdd, "welcome bonus").unwrap();
//!
//! assert_eq!(store.get_balance(&alice).unwrap(), 1_000);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod keys;
pub mod rocks;
pub mod schema;

mod accounts;
mod audit;
mod directory;
mod registry;
mod settlement;
mod topup;
mod withdrawals;

pub use error::{Result, StoreError};
pub use rocks::{LedgerTx, RocksStore, StoreOptions, MAX_TXN_ATTEMPTS};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use z_ledger_core::{
    AuditEntry, CallSession, CallTariff, EarningsBalance, Gift, GiftEarning, GiftId, LinkedAccount,
    LinkedAccountId, NewLinkedAccount, RevenueSplit, Role, Room, RoomContext, TopupProgress,
    TransactionId, TransactionKind, TransactionRecord, UserId, UserProfile, WithdrawalId,
    WithdrawalQuote, WithdrawalRequest, WithdrawalStatus,
};

// =============================================================================
// Operation results
// =============================================================================

/// Result of a single-sided spendable balance change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    /// The appended record.
    pub transaction: TransactionRecord,
    /// Balance after the change.
    pub balance: i64,
}

/// Result of a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferReceipt {
    /// The appended `transfer` record.
    pub transaction: TransactionRecord,
    /// Sender balance after the transfer.
    pub from_balance: i64,
    /// Recipient balance after the transfer.
    pub to_balance: i64,
}

/// Result of a gift purchase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftReceipt {
    /// The appended `gift` record.
    pub transaction: TransactionRecord,
    /// The gift earning record.
    pub earning: GiftEarning,
    /// Sender's spendable balance after the gift.
    pub sender_balance: i64,
    /// Recipient's earnings balance after the gift.
    pub recipient_earnings: i64,
}

/// Affordability preview of a gift.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GiftQuote {
    /// The catalog entry.
    pub gift: Gift,
    /// Sender's spendable balance.
    pub balance: i64,
    /// Does the balance cover the price?
    pub can_afford: bool,
    /// Split the recipient would receive.
    pub split: RevenueSplit,
}

/// Result of one call interval charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallCharge {
    /// Session after the charge.
    pub session: CallSession,
    /// The appended `call_charge` record.
    pub transaction: TransactionRecord,
    /// Payer's spendable balance after the charge.
    pub payer_balance: i64,
}

/// Result of a call finalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSettlement {
    /// Session after finalization.
    pub session: CallSession,
    /// Split of the accumulated charges.
    pub split: RevenueSplit,
    /// Receiver's earnings balance after settlement.
    pub receiver_earnings: i64,
    /// The session had already been finalized; nothing was posted.
    pub already_finalized: bool,
}

/// Result of a refund attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefundOutcome {
    /// The reservation was credited back by this call.
    Refunded(WithdrawalRequest),
    /// A previous call already refunded it; nothing changed.
    AlreadyRefunded(WithdrawalRequest),
}

impl RefundOutcome {
    /// The withdrawal after the attempt.
    #[must_use]
    pub fn withdrawal(&self) -> &WithdrawalRequest {
        match self {
            Self::Refunded(w) | Self::AlreadyRefunded(w) => w,
        }
    }

    /// Consume into the withdrawal.
    #[must_use]
    pub fn into_withdrawal(self) -> WithdrawalRequest {
        match self {
            Self::Refunded(w) | Self::AlreadyRefunded(w) => w,
        }
    }
}

/// What applying a payout channel status did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PayoutUpdate {
    /// The request moved to `completed`.
    Completed(WithdrawalRequest),
    /// The request moved to `processing`.
    Processing(WithdrawalRequest),
    /// The request moved to `rejected` and was refunded.
    Refunded(WithdrawalRequest),
    /// The status contradicts a terminal state; flagged for reconciliation.
    Reconciliation(WithdrawalRequest),
    /// Only the external status was recorded.
    Recorded(WithdrawalRequest),
}

impl PayoutUpdate {
    /// The withdrawal after the update.
    #[must_use]
    pub fn withdrawal(&self) -> &WithdrawalRequest {
        match self {
            Self::Completed(w)
            | Self::Processing(w)
            | Self::Refunded(w)
            | Self::Reconciliation(w)
            | Self::Recorded(w) => w,
        }
    }

    /// Consume into the withdrawal.
    #[must_use]
    pub fn into_withdrawal(self) -> WithdrawalRequest {
        match self {
            Self::Completed(w)
            | Self::Processing(w)
            | Self::Refunded(w)
            | Self::Reconciliation(w)
            | Self::Recorded(w) => w,
        }
    }
}

/// Owner of a normalized account number in the unique index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountNumberClaim {
    /// User who first linked the number.
    pub user_id: UserId,
    /// The linked account holding the number.
    pub account_id: LinkedAccountId,
}

// =============================================================================
// Store traits
// =============================================================================

/// Spendable balances.
pub trait AccountLedger: Send + Sync {
    /// Current spendable balance. Zero for known users without a row.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user is unknown and has no balance row.
    fn get_balance(&self, user_id: &UserId) -> Result<i64>;

    /// Add coins from the system.
    ///
    /// # Errors
    ///
    /// - `InvalidAmount` for non-positive amounts or earnings-ledger kinds.
    /// - `UserNotFound` if the user is unknown.
    fn credit(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerEntry>;

    /// Remove coins to the system, re-checking the balance under the row lock.
    ///
    /// # Errors
    ///
    /// - `InsufficientBalance` if the debit would go negative.
    /// - `UserNotFound` if the user is unknown.
    fn debit(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerEntry>;

    /// Move coins between two users atomically, locking both rows in id order.
    ///
    /// # Errors
    ///
    /// - `InvalidRecipient` when `from == to`.
    /// - `InsufficientBalance`, `UserNotFound`, `InvalidAmount`.
    fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: i64,
        description: &str,
    ) -> Result<TransferReceipt>;

    /// Get a transaction by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TransactionRecord>>;

    /// List transactions a user took part in, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>>;
}

/// Withdrawable earnings.
pub trait EarningsLedger: Send + Sync {
    /// Earnings of a user. Empty for known users without a row.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user is unknown and has no earnings row.
    fn get_earnings(&self, user_id: &UserId) -> Result<EarningsBalance>;

    /// Gift earning records of a recipient, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_gift_earnings(&self, user_id: &UserId, limit: usize) -> Result<Vec<GiftEarning>>;
}

/// Gift and call settlement.
pub trait Settlement: Send + Sync {
    /// Read-only preview of a gift purchase. Nothing is locked or written.
    ///
    /// # Errors
    ///
    /// - `GiftNotFound`, `UserNotFound`.
    fn quote_gift(&self, sender: &UserId, gift_id: &GiftId) -> Result<GiftQuote>;

    /// Buy a catalog gift for `recipient`.
    ///
    /// The price is read from the catalog inside the transaction. Debits the
    /// sender, credits 30% to the recipient's earnings, and writes the gift
    /// earning and transaction records, all atomically.
    ///
    /// # Errors
    ///
    /// - `InvalidRecipient` for self-gifts.
    /// - `GiftNotFound`, `UserNotFound`.
    /// - `RoomMembershipMismatch` if the room context does not fit.
    /// - `InsufficientBalance`.
    fn purchase_gift(
        &self,
        sender: &UserId,
        recipient: &UserId,
        gift_id: &GiftId,
        room: Option<&RoomContext>,
    ) -> Result<GiftReceipt>;

    /// Charge the next interval of a paid call to the payer, priced by
    /// `tariff` from the number of intervals already charged.
    ///
    /// # Errors
    ///
    /// - `InvalidRecipient` for self-calls, `CallSessionMismatch`, `CallAlreadyFinalized`.
    /// - `InsufficientBalance`, `UserNotFound`.
    fn charge_call_interval(
        &self,
        call_id: &str,
        payer: &UserId,
        receiver: &UserId,
        tariff: &CallTariff,
    ) -> Result<CallCharge>;

    /// Settle a call: split the accumulated charges and credit the receiver.
    /// Either participant may settle; the pair is read from the session.
    ///
    /// `claimed_total` is only compared against the accumulated charges.
    /// Finalizing twice returns the stored settlement without posting again.
    ///
    /// # Errors
    ///
    /// - `CallSessionNotFound`, `CallSessionMismatch`.
    fn finalize_call(
        &self,
        call_id: &str,
        caller: &UserId,
        claimed_total: i64,
        duration_seconds: u64,
    ) -> Result<CallSettlement>;

    /// Get a call session.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_call_session(&self, call_id: &str) -> Result<Option<CallSession>>;
}

/// Withdrawal requests against the earnings ledger.
pub trait WithdrawalLedger: Send + Sync {
    /// Reserve earnings and create a `pending` withdrawal.
    ///
    /// # Errors
    ///
    /// - `LinkedAccountNotFound` if the account is missing, inactive or not the caller's.
    /// - `InsufficientBalance` if earnings do not cover `quote.amount_coins`.
    fn reserve_withdrawal(
        &self,
        user_id: &UserId,
        account_id: &LinkedAccountId,
        quote: WithdrawalQuote,
    ) -> Result<WithdrawalRequest>;

    /// Get a withdrawal by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_withdrawal(&self, withdrawal_id: &WithdrawalId) -> Result<Option<WithdrawalRequest>>;

    /// Withdrawals of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_withdrawals_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<WithdrawalRequest>>;

    /// Withdrawals in a status, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_withdrawals_by_status(
        &self,
        status: WithdrawalStatus,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>>;

    /// Withdrawals flagged for manual reconciliation, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_reconciliation(&self, limit: usize) -> Result<Vec<WithdrawalRequest>>;

    /// Apply a status reported by the payout channel.
    ///
    /// Success completes a live request; failure refunds it exactly once; a
    /// success on an already refunded request is flagged for reconciliation
    /// and never deducts again.
    ///
    /// # Errors
    ///
    /// - `WithdrawalNotFound`.
    /// - `InvalidInput` if `payout_id` conflicts with the stored payout id.
    fn apply_payout_update(
        &self,
        withdrawal_id: &WithdrawalId,
        payout_id: Option<&str>,
        payout_status: &str,
    ) -> Result<PayoutUpdate>;

    /// Give the reservation back after the payout channel failed or timed
    /// out, at most once.
    ///
    /// # Errors
    ///
    /// - `WithdrawalNotFound`.
    /// - `InvalidStateTransition` for completed withdrawals.
    fn refund_withdrawal(&self, withdrawal_id: &WithdrawalId, reason: &str) -> Result<RefundOutcome>;

    /// Reject a withdrawal on review. Only requests that were never handed
    /// to the payout channel can be rejected; repeating a rejection is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// - `WithdrawalNotFound`.
    /// - `InvalidStateTransition` once the channel has accepted the request.
    fn reject_withdrawal(&self, withdrawal_id: &WithdrawalId, reason: &str) -> Result<RefundOutcome>;
}

/// Linked payout accounts.
pub trait Registry: Send + Sync {
    /// Link a payout account. The normalized number must be unclaimed by others.
    ///
    /// # Errors
    ///
    /// - `InvalidInput` for missing fields.
    /// - `DuplicateLinkedAccount` if the number is linked already.
    fn link_account(&self, user_id: &UserId, input: NewLinkedAccount) -> Result<LinkedAccount>;

    /// Active linked accounts of a user, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_linked_accounts(&self, user_id: &UserId) -> Result<Vec<LinkedAccount>>;

    /// Get a linked account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_linked_account(&self, account_id: &LinkedAccountId) -> Result<Option<LinkedAccount>>;

    /// Deactivate a linked account. The number stays reserved to its owner.
    ///
    /// # Errors
    ///
    /// Returns `LinkedAccountNotFound` if missing or owned by someone else.
    fn unlink_account(&self, user_id: &UserId, account_id: &LinkedAccountId) -> Result<LinkedAccount>;
}

/// Users, gift catalog and public rooms.
pub trait Directory: Send + Sync {
    /// Insert or replace a profile, keeping usernames unique.
    ///
    /// # Errors
    ///
    /// Returns `UsernameTaken` if another user holds the username.
    fn put_user(&self, profile: &UserProfile) -> Result<()>;

    /// Create or update username and role, keeping the PIN.
    ///
    /// # Errors
    ///
    /// Returns `UsernameTaken` or `InvalidInput`.
    fn sync_user(&self, user_id: &UserId, username: &str, role: Role) -> Result<UserProfile>;

    /// Get a profile by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>>;

    /// Find a profile by username (case-insensitive).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn find_user_by_username(&self, username: &str) -> Result<Option<UserProfile>>;

    /// Store a new PIN hash.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound` if the user is unknown.
    fn set_pin_hash(&self, user_id: &UserId, pin_hash: &str) -> Result<()>;

    /// Insert or replace a catalog gift.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_gift(&self, gift: &Gift) -> Result<()>;

    /// Get a catalog gift.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_gift(&self, gift_id: &GiftId) -> Result<Option<Gift>>;

    /// Register a public room.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn put_room(&self, room: &Room) -> Result<()>;

    /// Get a public room.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_room(&self, room_id: &str) -> Result<Option<Room>>;
}

/// Advisory monthly topup bookkeeping.
pub trait TopupLedger: Send + Sync {
    /// Add a mentor to merchant topup to the merchant's month.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn record_topup(
        &self,
        mentor: &UserId,
        merchant: &UserId,
        amount: i64,
        quota: i64,
        at: DateTime<Utc>,
    ) -> Result<TopupProgress>;

    /// Progress of a merchant in a month (`YYYY-MM`).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_topup_progress(&self, merchant: &UserId, month: &str) -> Result<Option<TopupProgress>>;
}

/// Append-only audit log.
pub trait AuditLog: Send + Sync {
    /// Append an entry.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn append_audit(&self, entry: &AuditEntry) -> Result<()>;

    /// Latest entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_audit(&self, limit: usize) -> Result<Vec<AuditEntry>>;
}
