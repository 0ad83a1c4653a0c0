//! Monthly mentor to merchant topup bookkeeping.
//!
//! Advisory only: nothing in the ledger depends on these numbers being exact.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::UserId;

/// Default monthly topup quota per merchant, in coins.
pub const DEFAULT_MONTHLY_TOPUP_QUOTA: i64 = 1_000_000;

/// Calendar month key `YYYY-MM`.
#[must_use]
pub fn month_key(at: DateTime<Utc>) -> String {
    format!("{:04}-{:02}", at.year(), at.month())
}

/// Coins a merchant received from mentors in one month.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopupProgress {
    /// Receiving merchant.
    pub merchant: UserId,
    /// Month key `YYYY-MM`.
    pub month: String,
    /// Coins received this month.
    pub received: i64,
    /// Quota for the month.
    pub quota: i64,
    /// Number of topup transfers.
    pub transfer_count: u32,
    /// Mentor of the latest topup.
    pub last_mentor: Option<UserId>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl TopupProgress {
    /// Empty progress for a month.
    #[must_use]
    pub fn new(merchant: UserId, month: String, quota: i64) -> Self {
        Self {
            merchant,
            month,
            received: 0,
            quota,
            transfer_count: 0,
            last_mentor: None,
            updated_at: Utc::now(),
        }
    }

    /// Add one topup transfer.
    pub fn record(&mut self, mentor: UserId, amount: i64) {
        self.received = self.received.saturating_add(amount);
        self.transfer_count = self.transfer_count.saturating_add(1);
        self.last_mentor = Some(mentor);
        self.updated_at = Utc::now();
    }

    /// Coins left before the quota is reached.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        (self.quota - self.received).max(0)
    }

    /// Quota reached?
    #[must_use]
    pub fn quota_reached(&self) -> bool {
        self.received >= self.quota
    }
}
