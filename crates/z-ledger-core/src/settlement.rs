//! Revenue splits for gifts and paid calls.
//!
//! The recipient receives `floor(gross * 30 / 100)`; the system keeps the
//! remainder, so the two shares always add back up to the gross amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_positive, LedgerError, Result};
use crate::room::RoomContext;
use crate::{GiftEarningId, GiftId, UserId};

// ============================================================================
// Constants
// ============================================================================

/// Percentage of a gift or call that goes to the recipient's earnings.
pub const RECIPIENT_SHARE_PERCENT: i64 = 30;

/// Maximum length of a caller-chosen call id.
pub const MAX_CALL_ID_LEN: usize = 128;

/// Charged intervals per call minute (one every 20 seconds).
pub const INTERVALS_PER_MINUTE: u32 = 3;

/// Default price of the first minute of a call.
pub const DEFAULT_FIRST_MINUTE_PRICE: i64 = 2_500;

/// Default price of every later minute.
pub const DEFAULT_MINUTE_PRICE: i64 = 2_000;

/// Per-minute call pricing, charged in interval slices.
///
/// A minute's price is divided over its intervals; any remainder goes one
/// coin at a time to the earliest intervals, so 2500 is charged as
/// 834/833/833 and 2000 as 667/667/666.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallTariff {
    /// Price of the first minute.
    pub first_minute: i64,
    /// Price of each minute after the first.
    pub later_minute: i64,
}

impl Default for CallTariff {
    fn default() -> Self {
        Self {
            first_minute: DEFAULT_FIRST_MINUTE_PRICE,
            later_minute: DEFAULT_MINUTE_PRICE,
        }
    }
}

impl CallTariff {
    /// Price of the interval with zero-based index `interval`.
    #[must_use]
    pub fn interval_price(&self, interval: u32) -> i64 {
        let minute_price = if interval < INTERVALS_PER_MINUTE {
            self.first_minute
        } else {
            self.later_minute
        };
        let slots = i64::from(INTERVALS_PER_MINUTE);
        let slot = i64::from(interval % INTERVALS_PER_MINUTE);
        minute_price / slots + i64::from(slot < minute_price % slots)
    }
}

/// A gross amount divided between the recipient and the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    /// Gross amount paid.
    pub gross: i64,
    /// Share credited to the recipient's earnings.
    pub user_share: i64,
    /// Share retained by the system.
    pub system_share: i64,
}

impl RevenueSplit {
    /// Split `gross` with the standard recipient percentage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative amounts.
    pub fn standard(gross: i64) -> Result<Self> {
        Self::with_percent(gross, RECIPIENT_SHARE_PERCENT)
    }

    /// Split `gross` giving `percent` to the recipient, floor-rounded.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` for negative amounts or a percent outside 0..=100.
    pub fn with_percent(gross: i64, percent: i64) -> Result<Self> {
        if gross < 0 {
            return Err(LedgerError::non_positive(gross));
        }
        if !(0..=100).contains(&percent) {
            return Err(LedgerError::InvalidAmount(format!(
                "split percent out of range: {percent}"
            )));
        }
        // i128 keeps gross * percent exact for every i64 gross.
        let user_share = i64::try_from(i128::from(gross) * i128::from(percent) / 100)
            .map_err(|_| LedgerError::InvalidAmount("split overflow".to_string()))?;
        Ok(Self {
            gross,
            user_share,
            system_share: gross - user_share,
        })
    }
}

/// A gift catalog entry. Prices are only read from here, never from a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gift {
    /// Catalog id.
    pub id: GiftId,
    /// Display name.
    pub name: String,
    /// Price in coins.
    pub price: i64,
    /// When the entry was last changed.
    pub updated_at: DateTime<Utc>,
}

impl Gift {
    /// Create a catalog entry.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAmount` if the price is not positive, `InvalidInput` for an empty name.
    pub fn new(id: GiftId, name: impl Into<String>, price: i64) -> Result<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(LedgerError::InvalidInput("gift name is required".to_string()));
        }
        ensure_positive(price)?;
        Ok(Self {
            id,
            name,
            price,
            updated_at: Utc::now(),
        })
    }
}

/// One settled gift event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GiftEarning {
    /// Record id.
    pub id: GiftEarningId,
    /// User whose earnings were credited.
    pub recipient: UserId,
    /// Sender of the gift.
    pub sender: UserId,
    /// Sender's username at the time of the gift.
    pub sender_username: String,
    /// Gift catalog id.
    pub gift_id: GiftId,
    /// Gift name at the time of the gift.
    pub gift_name: String,
    /// Price paid.
    pub gift_price: i64,
    /// Share credited to the recipient.
    pub user_share: i64,
    /// Share retained by the system.
    pub system_share: i64,
    /// Where the gift was sent.
    pub room: Option<RoomContext>,
    /// Sent inside a private chat.
    pub is_private: bool,
    /// When the gift was settled.
    pub created_at: DateTime<Utc>,
}

impl GiftEarning {
    /// Build the record for a settled gift.
    #[must_use]
    pub fn new(
        gift: &Gift,
        sender: UserId,
        sender_username: impl Into<String>,
        recipient: UserId,
        split: RevenueSplit,
        room: Option<RoomContext>,
    ) -> Self {
        let is_private = room.as_ref().is_some_and(RoomContext::is_private);
        Self {
            id: GiftEarningId::generate(),
            recipient,
            sender,
            sender_username: sender_username.into(),
            gift_id: gift.id,
            gift_name: gift.name.clone(),
            gift_price: split.gross,
            user_share: split.user_share,
            system_share: split.system_share,
            room,
            is_private,
            created_at: Utc::now(),
        }
    }
}

/// Running state of a paid call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallSession {
    /// Caller-chosen call id.
    pub call_id: String,
    /// User being charged.
    pub payer: UserId,
    /// User earning from the call.
    pub receiver: UserId,
    /// Sum of all interval charges.
    pub charged_total: i64,
    /// Number of charged intervals.
    pub intervals: u32,
    /// Settled and closed.
    pub finalized: bool,
    /// Reported call duration, set on finalization.
    pub duration_seconds: Option<u64>,
    /// Split applied on finalization.
    pub settlement: Option<RevenueSplit>,
    /// First charge.
    pub started_at: DateTime<Utc>,
    /// Last change.
    pub updated_at: DateTime<Utc>,
}

impl CallSession {
    /// Open a session for the first interval charge.
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for an empty or oversized call id, `InvalidRecipient` for self-calls.
    pub fn open(call_id: &str, payer: UserId, receiver: UserId) -> Result<Self> {
        validate_call_id(call_id)?;
        if payer == receiver {
            return Err(LedgerError::InvalidRecipient("cannot call yourself".to_string()));
        }
        let now = Utc::now();
        Ok(Self {
            call_id: call_id.to_string(),
            payer,
            receiver,
            charged_total: 0,
            intervals: 0,
            finalized: false,
            duration_seconds: None,
            settlement: None,
            started_at: now,
            updated_at: now,
        })
    }

    /// Check that `user` took part in the call, on either side.
    ///
    /// # Errors
    ///
    /// Returns `CallSessionMismatch` otherwise.
    pub fn ensure_participant(&self, user: UserId) -> Result<()> {
        if self.payer != user && self.receiver != user {
            return Err(LedgerError::CallSessionMismatch {
                call_id: self.call_id.clone(),
            });
        }
        Ok(())
    }

    /// Price of the next interval to be charged.
    #[must_use]
    pub fn next_interval_price(&self, tariff: &CallTariff) -> i64 {
        tariff.interval_price(self.intervals)
    }

    /// Check that the session belongs to this payer/receiver pair.
    ///
    /// # Errors
    ///
    /// Returns `CallSessionMismatch` otherwise.
    pub fn ensure_participants(&self, payer: UserId, receiver: UserId) -> Result<()> {
        if self.payer != payer || self.receiver != receiver {
            return Err(LedgerError::CallSessionMismatch {
                call_id: self.call_id.clone(),
            });
        }
        Ok(())
    }

    /// Account for one charged interval.
    ///
    /// # Errors
    ///
    /// Returns `CallAlreadyFinalized` once the session is settled.
    pub fn add_charge(&mut self, amount: i64) -> Result<()> {
        if self.finalized {
            return Err(LedgerError::CallAlreadyFinalized {
                call_id: self.call_id.clone(),
            });
        }
        self.charged_total = self
            .charged_total
            .checked_add(amount)
            .ok_or_else(|| LedgerError::InvalidAmount("call total overflow".to_string()))?;
        self.intervals = self.intervals.saturating_add(1);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Close the session and compute the split of the accumulated charges.
    ///
    /// # Errors
    ///
    /// Returns `CallAlreadyFinalized` if already closed.
    pub fn finalize(&mut self, duration_seconds: u64) -> Result<RevenueSplit> {
        if self.finalized {
            return Err(LedgerError::CallAlreadyFinalized {
                call_id: self.call_id.clone(),
            });
        }
        let split = RevenueSplit::standard(self.charged_total)?;
        self.finalized = true;
        self.duration_seconds = Some(duration_seconds);
        self.settlement = Some(split);
        self.updated_at = Utc::now();
        Ok(split)
    }
}

/// Validate a caller-chosen call id.
///
/// # Errors
///
/// Returns `InvalidInput` for empty or oversized ids.
pub fn validate_call_id(call_id: &str) -> Result<()> {
    if call_id.trim().is_empty() || call_id.len() > MAX_CALL_ID_LEN {
        return Err(LedgerError::InvalidInput(format!(
            "call id must be 1..={MAX_CALL_ID_LEN} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_is_complete_for_every_price() {
        for price in 1..=1000 {
            let split = RevenueSplit::standard(price).unwrap();
            assert_eq!(split.user_share + split.system_share, price, "price {price}");
            assert_eq!(split.user_share, price * 30 / 100);
        }
    }

    #[test]
    fn tariff_slices_each_minute() {
        let tariff = CallTariff::default();
        let prices: Vec<i64> = (0..6).map(|i| tariff.interval_price(i)).collect();
        assert_eq!(prices, vec![834, 833, 833, 667, 667, 666]);
        assert_eq!(prices.iter().sum::<i64>(), 4_500);
        assert_eq!(tariff.interval_price(6), 667);
        assert_eq!(tariff.interval_price(8), 666);
    }

    #[test]
    fn either_participant_may_settle() {
        let payer = UserId::generate();
        let receiver = UserId::generate();
        let session = CallSession::open("c", payer, receiver).unwrap();
        assert!(session.ensure_participant(payer).is_ok());
        assert!(session.ensure_participant(receiver).is_ok());
        assert!(matches!(
            session.ensure_participant(UserId::generate()),
            Err(LedgerError::CallSessionMismatch { .. })
        ));
    }

    #[test]
    fn split_of_150_is_45_105() {
        let split = RevenueSplit::standard(150).unwrap();
        assert_eq!(split.user_share, 45);
        assert_eq!(split.system_share, 105);
    }

    #[test]
    fn split_handles_extremes() {
        let split = RevenueSplit::standard(i64::MAX).unwrap();
        assert_eq!(split.user_share + split.system_share, i64::MAX);
        assert!(RevenueSplit::standard(-1).is_err());
        assert!(RevenueSplit::with_percent(10, 101).is_err());
    }

    #[test]
    fn gift_requires_positive_price() {
        assert!(Gift::new(GiftId::generate(), "Rose", 0).is_err());
        assert!(Gift::new(GiftId::generate(), " ", 10).is_err());
    }

    #[test]
    fn call_session_rejects_self_call() {
        let user = UserId::generate();
        assert!(matches!(
            CallSession::open("c1", user, user),
            Err(LedgerError::InvalidRecipient(_))
        ));
    }

    #[test]
    fn finalize_splits_accumulated_charges_once() {
        let mut session = CallSession::open("c1", UserId::generate(), UserId::generate()).unwrap();
        session.add_charge(100).unwrap();
        session.add_charge(100).unwrap();
        let split = session.finalize(120).unwrap();
        assert_eq!(split.gross, 200);
        assert_eq!(split.user_share, 60);
        assert!(matches!(
            session.finalize(120),
            Err(LedgerError::CallAlreadyFinalized { .. })
        ));
        assert!(session.add_charge(100).is_err());
    }
}
