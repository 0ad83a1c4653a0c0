//! Linked payout accounts.
//!
//! An account number may be linked by at most one user, ever. The registry
//! enforces this through an index keyed by [`normalize_account_number`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::{LinkedAccountId, UserId};

/// Destination type of a payout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Bank account.
    Bank,
    /// E-wallet.
    Ewallet,
}

impl AccountType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Bank => "bank",
            Self::Ewallet => "ewallet",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bank" => Ok(Self::Bank),
            "ewallet" => Ok(Self::Ewallet),
            other => Err(LedgerError::InvalidInput(format!(
                "account type must be 'bank' or 'ewallet', got {other:?}"
            ))),
        }
    }
}

/// Everything a user supplies when linking an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewLinkedAccount {
    /// Bank or e-wallet.
    pub account_type: AccountType,
    /// Provider code, e.g. `BCA` or `GOPAY`.
    pub provider: String,
    /// Display name of the provider.
    pub account_name: String,
    /// Account number or wallet phone number.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
}

impl NewLinkedAccount {
    /// Check that every field is present.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` naming the first empty field.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("accountId", &self.provider),
            ("accountName", &self.account_name),
            ("accountNumber", &self.account_number),
            ("holderName", &self.holder_name),
        ] {
            if value.trim().is_empty() {
                return Err(LedgerError::InvalidInput(format!("{field} is required")));
            }
        }
        if normalize_account_number(&self.account_number).is_empty() {
            return Err(LedgerError::InvalidInput(
                "accountNumber must contain letters or digits".to_string(),
            ));
        }
        Ok(())
    }
}

/// A payout destination owned by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedAccount {
    /// Registry id.
    pub id: LinkedAccountId,
    /// Owner.
    pub user_id: UserId,
    /// Bank or e-wallet.
    pub account_type: AccountType,
    /// Provider code, upper-cased.
    pub provider: String,
    /// Display name of the provider.
    pub account_name: String,
    /// Account number as entered.
    pub account_number: String,
    /// Name of the account holder.
    pub holder_name: String,
    /// Unlinked accounts stay reserved to their owner but cannot receive payouts.
    pub active: bool,
    /// When the account was linked.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl LinkedAccount {
    /// Create an active account from validated input.
    #[must_use]
    pub fn new(user_id: UserId, input: NewLinkedAccount) -> Self {
        let now = Utc::now();
        Self {
            id: LinkedAccountId::generate(),
            user_id,
            account_type: input.account_type,
            provider: input.provider.trim().to_ascii_uppercase(),
            account_name: input.account_name.trim().to_string(),
            account_number: input.account_number.trim().to_string(),
            holder_name: input.holder_name.trim().to_string(),
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Index key of the account number.
    #[must_use]
    pub fn number_key(&self) -> String {
        normalize_account_number(&self.account_number)
    }

    /// Snapshot used as the payout destination of a withdrawal.
    #[must_use]
    pub fn destination(&self) -> PayoutDestination {
        PayoutDestination {
            account_type: self.account_type,
            provider: self.provider.clone(),
            account_number: self.account_number.clone(),
            holder_name: self.holder_name.clone(),
        }
    }
}

/// Where a payout goes. Copied into the withdrawal at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutDestination {
    /// Bank or e-wallet.
    pub account_type: AccountType,
    /// Provider code.
    pub provider: String,
    /// Account number.
    pub account_number: String,
    /// Account holder.
    pub holder_name: String,
}

/// Canonical form of an account number: letters and digits only, upper-cased.
///
/// `"1234-5678"`, `"1234 5678"` and `"12345678"` are the same account.
#[must_use]
pub fn normalize_account_number(number: &str) -> String {
    number
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(number: &str) -> NewLinkedAccount {
        NewLinkedAccount {
            account_type: AccountType::Bank,
            provider: "bca".to_string(),
            account_name: "Bank Central Asia".to_string(),
            account_number: number.to_string(),
            holder_name: "Alice".to_string(),
        }
    }

    #[test]
    fn formatting_variants_share_a_key() {
        assert_eq!(normalize_account_number("1234-5678"), "12345678");
        assert_eq!(normalize_account_number(" 1234 5678 "), "12345678");
    }

    #[test]
    fn all_fields_required() {
        let mut missing = input("1234");
        missing.holder_name = "  ".to_string();
        assert!(matches!(missing.validate(), Err(LedgerError::InvalidInput(_))));
        assert!(input("--").validate().is_err());
        assert!(input("1234").validate().is_ok());
    }

    #[test]
    fn provider_is_upper_cased() {
        let account = LinkedAccount::new(UserId::generate(), input("1234"));
        assert_eq!(account.provider, "BCA");
        assert!("wallet".parse::<AccountType>().is_err());
    }
}
