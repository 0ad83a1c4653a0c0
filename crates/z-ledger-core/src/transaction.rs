//! Immutable transaction records.
//!
//! Every balance mutation appends exactly one [`TransactionRecord`]. Records
//! are never updated or deleted and are the source of truth for balance
//! history and reconciliation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LedgerError;
use crate::{TransactionId, UserId};

/// Which balance table a transaction moved value in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerKind {
    /// Spendable account balance.
    Spendable,
    /// Withdrawable earnings balance.
    Earnings,
}

/// Kind of value movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    /// User to user transfer of spendable coins.
    Transfer,
    /// Gift purchase: sender's spendable coins, recipient earns a share.
    Gift,
    /// Direct catalog purchase of a gift without a recipient.
    GiftPurchase,
    /// Admin grant of spendable coins.
    AdminAdd,
    /// Admin topup of spendable coins (merchant stock).
    AdminTopup,
    /// Per-interval charge of a paid call.
    CallCharge,
    /// Receiver's share of a finalized call.
    CallEarning,
    /// Cosmetic frame purchase.
    FramePurchase,
    /// Earnings reserved for a withdrawal request.
    Withdrawal,
    /// Compensating credit of a failed withdrawal.
    WithdrawalRefund,
}

impl TransactionKind {
    /// The ledger this kind of transaction moves value in.
    #[must_use]
    pub const fn ledger(self) -> LedgerKind {
        match self {
            Self::CallEarning | Self::Withdrawal | Self::WithdrawalRefund => LedgerKind::Earnings,
            _ => LedgerKind::Spendable,
        }
    }

    /// Kinds an admin may use to mint spendable coins.
    #[must_use]
    pub const fn is_admin_grant(self) -> bool {
        matches!(self, Self::AdminAdd | Self::AdminTopup)
    }

    /// Kinds another platform service may use to charge a user directly.
    #[must_use]
    pub const fn is_service_charge(self) -> bool {
        matches!(self, Self::FramePurchase | Self::GiftPurchase)
    }

    /// Wire name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transfer => "transfer",
            Self::Gift => "gift",
            Self::GiftPurchase => "gift_purchase",
            Self::AdminAdd => "admin_add",
            Self::AdminTopup => "admin_topup",
            Self::CallCharge => "call_charge",
            Self::CallEarning => "call_earning",
            Self::FramePurchase => "frame_purchase",
            Self::Withdrawal => "withdrawal",
            Self::WithdrawalRefund => "withdrawal_refund",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "transfer" => Self::Transfer,
            "gift" => Self::Gift,
            "gift_purchase" => Self::GiftPurchase,
            "admin_add" => Self::AdminAdd,
            "admin_topup" => Self::AdminTopup,
            "call_charge" => Self::CallCharge,
            "call_earning" => Self::CallEarning,
            "frame_purchase" => Self::FramePurchase,
            "withdrawal" => Self::Withdrawal,
            "withdrawal_refund" => Self::WithdrawalRefund,
            other => {
                return Err(LedgerError::InvalidInput(format!(
                    "unknown transaction kind: {other}"
                )))
            }
        })
    }
}

/// An immutable record of one value movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    /// Unique transaction id (ULID for time-ordering).
    pub id: TransactionId,

    /// Paying side. `None` means the system.
    pub from_user: Option<UserId>,

    /// Receiving side. `None` means the system.
    pub to_user: Option<UserId>,

    /// Amount in coins. Always positive.
    pub amount: i64,

    /// Kind of movement.
    pub kind: TransactionKind,

    /// Human-readable description.
    pub description: String,

    /// When the transaction was committed.
    pub created_at: DateTime<Utc>,
}

impl TransactionRecord {
    /// Create a new record with a fresh id.
    #[must_use]
    pub fn new(
        from_user: Option<UserId>,
        to_user: Option<UserId>,
        amount: i64,
        kind: TransactionKind,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            from_user,
            to_user,
            amount,
            kind,
            description: description.into(),
            created_at: Utc::now(),
        }
    }

    /// User to user transfer.
    #[must_use]
    pub fn transfer(from: UserId, to: UserId, amount: i64, description: impl Into<String>) -> Self {
        Self::new(Some(from), Some(to), amount, TransactionKind::Transfer, description)
    }

    /// System credit of spendable coins.
    #[must_use]
    pub fn system_credit(to: UserId, amount: i64, kind: TransactionKind, description: impl Into<String>) -> Self {
        Self::new(None, Some(to), amount, kind, description)
    }

    /// Spendable debit retained by the system.
    #[must_use]
    pub fn system_debit(from: UserId, amount: i64, kind: TransactionKind, description: impl Into<String>) -> Self {
        Self::new(Some(from), None, amount, kind, description)
    }

    /// Users this record should be listed for.
    #[must_use]
    pub fn participants(&self) -> Vec<UserId> {
        let mut users: Vec<UserId> = self.from_user.into_iter().chain(self.to_user).collect();
        users.dedup();
        users
    }
}
