//! Core types and utilities for z-ledger.
//!
//! This crate provides the domain types of the virtual currency ledger:
//!
//! - **Identifiers**: `UserId`, `TransactionId`, `WithdrawalId`, `LinkedAccountId`, `GiftId`
//! - **Balances**: `AccountBalance` (spendable) and `EarningsBalance` (withdrawable)
//! - **Transactions**: `TransactionRecord`, `TransactionKind`
//! - **Settlement**: `RevenueSplit`, `Gift`, `GiftEarning`, `CallSession`
//! - **Withdrawals**: `WithdrawalRequest`, `WithdrawalStatus`, `WithdrawalPolicy`
//! - **Registry**: `LinkedAccount`, `PayoutDestination`
//! - **Directory**: `UserProfile`, `Role`, `Room`, `RoomContext`
//! - **Audit**: `AuditEntry`, `redact_payload`
//!
//! # Coins
//!
//! All amounts are `i64` coins, the smallest unit of the virtual currency.
//! Withdrawals convert coins to US dollars at a fixed rate
//! (15 500 coins per dollar by default).
//!
//! Nothing here performs I/O; persistence and locking live in `z-ledger-store`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod audit;
pub mod balance;
pub mod error;
pub mod ids;
pub mod linked_account;
pub mod room;
pub mod settlement;
pub mod topup;
pub mod transaction;
pub mod user;
pub mod withdrawal;

pub use audit::{redact_payload, AuditEntry, AuditOutcome, REDACTED};
pub use balance::{AccountBalance, EarningsBalance};
pub use error::{ensure_positive, LedgerError, Result};
pub use ids::{
    AuditId, GiftEarningId, GiftId, IdError, LinkedAccountId, TransactionId, UserId, WithdrawalId,
};
pub use linked_account::{
    normalize_account_number, AccountType, LinkedAccount, NewLinkedAccount, PayoutDestination,
};
pub use room::{private_chat_id, Room, RoomContext};
pub use settlement::{
    validate_call_id, CallSession, CallTariff, Gift, GiftEarning, RevenueSplit,
    DEFAULT_FIRST_MINUTE_PRICE, DEFAULT_MINUTE_PRICE, INTERVALS_PER_MINUTE,
    RECIPIENT_SHARE_PERCENT,
};
pub use topup::{month_key, TopupProgress, DEFAULT_MONTHLY_TOPUP_QUOTA};
pub use transaction::{LedgerKind, TransactionKind, TransactionRecord};
pub use user::{normalize_username, validate_pin_format, Role, UserProfile};
pub use withdrawal::{
    parse_reference_id, PayoutOutcome, WithdrawalPolicy, WithdrawalQuote, WithdrawalRequest,
    WithdrawalStatus,
};
