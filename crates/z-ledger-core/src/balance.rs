//! Balance rows for the two ledgers.
//!
//! The spendable [`AccountBalance`] and the withdrawable [`EarningsBalance`]
//! are deliberately separate types: value only enters the earnings ledger
//! through settlement splits, never through a transfer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, LedgerError, Result};
use crate::UserId;

/// Spendable coin balance of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    /// Owner of the balance.
    pub user_id: UserId,

    /// Current balance in coins. Never negative.
    pub balance: i64,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl AccountBalance {
    /// Create an empty balance row.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Add `amount` coins.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts or on overflow.
    pub fn credit(&mut self, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("balance overflow".to_string()))?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Remove `amount` coins.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the balance does not cover `amount`.
    pub fn debit(&mut self, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }
}

/// Withdrawable earnings of one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EarningsBalance {
    /// Owner of the earnings.
    pub user_id: UserId,

    /// Withdrawable balance in coins. Never negative.
    pub balance: i64,

    /// Lifetime settlement proceeds. Monotonic.
    pub total_earned: i64,

    /// Lifetime completed withdrawals in coins.
    pub total_withdrawn: i64,

    /// When the row was created.
    pub created_at: DateTime<Utc>,

    /// When the row was last mutated.
    pub updated_at: DateTime<Utc>,
}

impl EarningsBalance {
    /// Create an empty earnings row.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            balance: 0,
            total_earned: 0,
            total_withdrawn: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Post a settlement share. Increases both `balance` and `total_earned`.
    ///
    /// A zero share (gross too small to yield a recipient cut) is a no-op.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative shares or on overflow.
    pub fn earn(&mut self, share: i64) -> Result<i64> {
        if share < 0 {
            return Err(LedgerError::non_positive(share));
        }
        let overflow = || LedgerError::InvalidAmount("earnings overflow".to_string());
        self.balance = self.balance.checked_add(share).ok_or_else(overflow)?;
        self.total_earned = self.total_earned.checked_add(share).ok_or_else(overflow)?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Reserve `amount` for a withdrawal.
    ///
    /// # Errors
    ///
    /// Returns `InsufficientBalance` if the earnings do not cover `amount`.
    pub fn reserve(&mut self, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        if self.balance < amount {
            return Err(LedgerError::InsufficientBalance {
                balance: self.balance,
                required: amount,
            });
        }
        self.balance -= amount;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Give back a reservation. `total_earned` is untouched.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts or on overflow.
    pub fn restore(&mut self, amount: i64) -> Result<i64> {
        ensure_positive(amount)?;
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("earnings overflow".to_string()))?;
        self.updated_at = Utc::now();
        Ok(self.balance)
    }

    /// Record a completed payout of an already reserved amount.
    pub fn record_withdrawn(&mut self, amount: i64) {
        self.total_withdrawn = self.total_withdrawn.saturating_add(amount);
        self.updated_at = Utc::now();
    }

    /// Can the user request at least `minimum_coins`?
    #[must_use]
    pub fn can_withdraw(&self, minimum_coins: i64) -> bool {
        self.balance >= minimum_coins
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_never_goes_negative() {
        let mut row = AccountBalance::new(UserId::generate());
        row.credit(100).unwrap();
        let err = row.debit(101).unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                balance: 100,
                required: 101
            }
        );
        assert_eq!(row.balance, 100);
        assert_eq!(row.debit(100).unwrap(), 0);
    }

    #[test]
    fn zero_and_negative_amounts_rejected() {
        let mut row = AccountBalance::new(UserId::generate());
        assert!(matches!(row.credit(0), Err(LedgerError::InvalidAmount(_))));
        assert!(matches!(row.debit(-5), Err(LedgerError::InvalidAmount(_))));
    }

    #[test]
    fn refund_restores_balance_but_not_lifetime_earnings() {
        let mut earnings = EarningsBalance::new(UserId::generate());
        earnings.earn(155_000).unwrap();
        earnings.reserve(155_000).unwrap();
        assert_eq!(earnings.balance, 0);
        earnings.restore(155_000).unwrap();
        assert_eq!(earnings.balance, 155_000);
        assert_eq!(earnings.total_earned, 155_000);
    }

    #[test]
    fn zero_share_is_noop() {
        let mut earnings = EarningsBalance::new(UserId::generate());
        earnings.earn(0).unwrap();
        assert_eq!(earnings.balance, 0);
        assert_eq!(earnings.total_earned, 0);
    }
}
