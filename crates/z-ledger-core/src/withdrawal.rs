//! Withdrawal requests and their state machine.
//!
//! ```text
//! pending ──► processing ──► completed
//!    │             │
//!    │             └──────► rejected
//!    ├──────────────────────► completed
//!    └──────────────────────► rejected
//! ```
//!
//! `refunded` is the only guard against a double compensating credit: a
//! refund is applied at most once per request, no matter how many failure
//! handlers run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};
use crate::linked_account::PayoutDestination;
use crate::{LinkedAccountId, UserId, WithdrawalId};

// ============================================================================
// Constants
// ============================================================================

/// Coins per US dollar.
pub const DEFAULT_COINS_PER_USD: i64 = 15_500;

/// Minimum withdrawal in US cents ($10).
pub const DEFAULT_MIN_WITHDRAW_USD_CENTS: i64 = 1_000;

/// Withdrawal fee in basis points (3%).
pub const DEFAULT_WITHDRAW_FEE_BPS: i64 = 300;

/// Prefix of the payout reference id sent to the channel.
pub const REFERENCE_PREFIX: &str = "WD-";

/// Status of a withdrawal request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WithdrawalStatus {
    /// Reserved, not yet accepted by the payout channel.
    Pending,
    /// Accepted by the payout channel.
    Processing,
    /// Paid out.
    Completed,
    /// Failed or rejected; the reservation was refunded.
    Rejected,
}

impl WithdrawalStatus {
    /// Is this a final state?
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Rejected)
    }

    /// Is `self -> next` an allowed transition?
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing | Self::Completed | Self::Rejected)
                | (Self::Processing, Self::Completed | Self::Rejected)
        )
    }

    /// Wire name of the status.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for WithdrawalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WithdrawalStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "rejected" => Ok(Self::Rejected),
            other => Err(LedgerError::InvalidInput(format!(
                "unknown withdrawal status: {other}"
            ))),
        }
    }
}

/// Conversion and fee rules for withdrawals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalPolicy {
    /// Coins per US dollar.
    pub coins_per_usd: i64,
    /// Minimum withdrawal in US cents.
    pub min_usd_cents: i64,
    /// Fee in basis points of the gross coins.
    pub fee_bps: i64,
}

impl Default for WithdrawalPolicy {
    fn default() -> Self {
        Self {
            coins_per_usd: DEFAULT_COINS_PER_USD,
            min_usd_cents: DEFAULT_MIN_WITHDRAW_USD_CENTS,
            fee_bps: DEFAULT_WITHDRAW_FEE_BPS,
        }
    }
}

impl WithdrawalPolicy {
    /// Minimum withdrawal in coins.
    #[must_use]
    pub fn min_coins(&self) -> i64 {
        self.min_usd_cents * self.coins_per_usd / 100
    }

    /// US dollar value of a coin amount.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn coins_to_usd(&self, coins: i64) -> f64 {
        coins as f64 / self.coins_per_usd as f64
    }

    /// Price a withdrawal of `amount_usd_cents`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for non-positive amounts and
    /// `BelowMinimumWithdrawal` under the minimum.
    pub fn quote(&self, amount_usd_cents: i64) -> Result<WithdrawalQuote> {
        if amount_usd_cents <= 0 {
            return Err(LedgerError::non_positive(amount_usd_cents));
        }
        let overflow = || LedgerError::InvalidAmount("withdrawal amount too large".to_string());
        let amount_coins = amount_usd_cents
            .checked_mul(self.coins_per_usd)
            .ok_or_else(overflow)?
            / 100;
        if amount_usd_cents < self.min_usd_cents {
            return Err(LedgerError::BelowMinimumWithdrawal {
                minimum_coins: self.min_coins(),
                requested_coins: amount_coins,
            });
        }
        // Fee rounds up so the payout never exceeds (100% - fee) of the gross.
        let fee_coins = (amount_coins.checked_mul(self.fee_bps).ok_or_else(overflow)? + 9_999) / 10_000;
        Ok(WithdrawalQuote {
            amount_usd_cents,
            amount_coins,
            fee_coins,
            net_amount: amount_coins - fee_coins,
        })
    }
}

/// A priced withdrawal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalQuote {
    /// Requested value in US cents.
    pub amount_usd_cents: i64,
    /// Coins reserved from earnings.
    pub amount_coins: i64,
    /// Fee in coins.
    pub fee_coins: i64,
    /// Amount sent to the payout channel.
    pub net_amount: i64,
}

/// How a payout channel status string maps onto the lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayoutOutcome {
    /// Money reached the destination.
    Succeeded,
    /// Payout definitively failed.
    Failed,
    /// Accepted, still in flight.
    InFlight,
    /// Status we do not interpret.
    Unknown,
}

impl PayoutOutcome {
    /// Classify a provider status (case-insensitive).
    #[must_use]
    pub fn classify(status: &str) -> Self {
        match status.trim().to_ascii_uppercase().as_str() {
            "COMPLETED" | "SUCCEEDED" => Self::Succeeded,
            "FAILED" | "EXPIRED" | "CANCELLED" | "REVERSED" => Self::Failed,
            "ACCEPTED" | "PENDING" | "REQUESTED" | "PROCESSING" => Self::InFlight,
            _ => Self::Unknown,
        }
    }
}

/// A cash-out request against the earnings ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithdrawalRequest {
    /// Request id.
    pub id: WithdrawalId,
    /// Requesting user.
    pub user_id: UserId,
    /// Linked account chosen by the user.
    pub linked_account_id: LinkedAccountId,
    /// Destination snapshot taken at request time.
    pub destination: PayoutDestination,
    /// Requested value in US cents.
    pub amount_usd_cents: i64,
    /// Coins reserved from earnings.
    pub amount_coins: i64,
    /// Fee in coins.
    pub fee_coins: i64,
    /// Amount sent to the payout channel.
    pub net_amount: i64,
    /// Lifecycle status.
    pub status: WithdrawalStatus,
    /// Set once the reservation has been given back.
    pub refunded: bool,
    /// Payout id assigned by the channel.
    pub payout_id: Option<String>,
    /// Last status reported by the channel.
    pub payout_status: Option<String>,
    /// A success arrived after the request was already refunded.
    pub needs_reconciliation: bool,
    /// Free-form notes (failure reasons, admin comments).
    pub notes: Option<String>,
    /// When the request was created.
    pub created_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
    /// When the request reached a terminal state.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WithdrawalRequest {
    /// Create a pending request.
    #[must_use]
    pub fn new(
        user_id: UserId,
        linked_account_id: LinkedAccountId,
        destination: PayoutDestination,
        quote: WithdrawalQuote,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: WithdrawalId::generate(),
            user_id,
            linked_account_id,
            destination,
            amount_usd_cents: quote.amount_usd_cents,
            amount_coins: quote.amount_coins,
            fee_coins: quote.fee_coins,
            net_amount: quote.net_amount,
            status: WithdrawalStatus::Pending,
            refunded: false,
            payout_id: None,
            payout_status: None,
            needs_reconciliation: false,
            notes: None,
            created_at: now,
            updated_at: now,
            processed_at: None,
        }
    }

    /// Move to `next`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidStateTransition` for disallowed transitions.
    pub fn transition(&mut self, next: WithdrawalStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(LedgerError::InvalidStateTransition {
                from: self.status.to_string(),
                to: next.to_string(),
            });
        }
        let now = Utc::now();
        self.status = next;
        self.updated_at = now;
        if next.is_terminal() {
            self.processed_at = Some(now);
        }
        Ok(())
    }

    /// Append a line to the notes.
    pub fn add_note(&mut self, note: impl AsRef<str>) {
        let note = note.as_ref();
        self.notes = Some(match self.notes.take() {
            Some(existing) => format!("{existing}; {note}"),
            None => note.to_string(),
        });
    }

    /// Reference id sent to the payout channel.
    #[must_use]
    pub fn reference_id(&self) -> String {
        format!("{REFERENCE_PREFIX}{}", self.id)
    }

    /// Idempotency key for the payout submission, stable across retries.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!("withdrawal-{}", self.id)
    }

    /// Requested value in dollars.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn amount_usd(&self) -> f64 {
        self.amount_usd_cents as f64 / 100.0
    }
}

/// Recover the withdrawal id from a payout reference id.
#[must_use]
pub fn parse_reference_id(reference_id: &str) -> Option<WithdrawalId> {
    reference_id.strip_prefix(REFERENCE_PREFIX)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::linked_account::AccountType;

    fn destination() -> PayoutDestination {
        PayoutDestination {
            account_type: AccountType::Bank,
            provider: "BCA".to_string(),
            account_number: "1234".to_string(),
            holder_name: "Alice".to_string(),
        }
    }

    #[test]
    fn minimum_is_155000_coins() {
        let policy = WithdrawalPolicy::default();
        assert_eq!(policy.min_coins(), 155_000);
        let quote = policy.quote(1_000).unwrap();
        assert_eq!(quote.amount_coins, 155_000);
        assert_eq!(quote.fee_coins, 4_650);
        assert_eq!(quote.net_amount, 150_350);
    }

    #[test]
    fn below_minimum_rejected() {
        let err = WithdrawalPolicy::default().quote(999).unwrap_err();
        assert!(matches!(err, LedgerError::BelowMinimumWithdrawal { minimum_coins: 155_000, .. }));
    }

    #[test]
    fn fee_rounds_up() {
        let policy = WithdrawalPolicy {
            coins_per_usd: 100,
            min_usd_cents: 1,
            fee_bps: 300,
        };
        // 0.03 * 101 = 3.03 -> 4
        let quote = policy.quote(101).unwrap();
        assert_eq!(quote.amount_coins, 101);
        assert_eq!(quote.fee_coins, 4);
        assert_eq!(quote.net_amount, 97);
    }

    #[test]
    fn terminal_states_are_final() {
        let quote = WithdrawalPolicy::default().quote(1_000).unwrap();
        let mut request =
            WithdrawalRequest::new(UserId::generate(), LinkedAccountId::generate(), destination(), quote);
        request.transition(WithdrawalStatus::Processing).unwrap();
        request.transition(WithdrawalStatus::Rejected).unwrap();
        assert!(request.processed_at.is_some());
        assert!(matches!(
            request.transition(WithdrawalStatus::Completed),
            Err(LedgerError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn reference_roundtrip() {
        let quote = WithdrawalPolicy::default().quote(1_000).unwrap();
        let request =
            WithdrawalRequest::new(UserId::generate(), LinkedAccountId::generate(), destination(), quote);
        assert_eq!(parse_reference_id(&request.reference_id()), Some(request.id));
        assert!(request.idempotency_key().starts_with("withdrawal-"));
        assert_eq!(parse_reference_id("XX-123"), None);
    }

    #[test]
    fn provider_statuses_classified() {
        assert_eq!(PayoutOutcome::classify("succeeded"), PayoutOutcome::Succeeded);
        assert_eq!(PayoutOutcome::classify("EXPIRED"), PayoutOutcome::Failed);
        assert_eq!(PayoutOutcome::classify("ACCEPTED"), PayoutOutcome::InFlight);
        assert_eq!(PayoutOutcome::classify("WEIRD"), PayoutOutcome::Unknown);
    }
}
