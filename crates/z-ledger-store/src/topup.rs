//! Monthly mentor to merchant topup progress.

use chrono::{DateTime, Utc};
use z_ledger_core::{month_key, TopupProgress, UserId};

use crate::error::Result;
use crate::keys;
use crate::rocks::RocksStore;
use crate::schema::cf;
use crate::TopupLedger;

impl TopupLedger for RocksStore {
    fn record_topup(
        &self,
        mentor: &UserId,
        merchant: &UserId,
        amount: i64,
        quota: i64,
        at: DateTime<Utc>,
    ) -> Result<TopupProgress> {
        let month = month_key(at);
        let key = keys::topup_key(merchant, &month);

        let progress = self.run_in_transaction("record_topup", |tx| {
            let mut progress = tx
                .lock::<TopupProgress>(cf::TOPUP_PROGRESS, &key)?
                .unwrap_or_else(|| TopupProgress::new(*merchant, month.clone(), quota));
            progress.quota = quota;
            progress.record(*mentor, amount);
            tx.put(cf::TOPUP_PROGRESS, &key, &progress)?;
            Ok(progress)
        })?;

        if progress.quota_reached() {
            tracing::info!(
                merchant = %merchant,
                month = %progress.month,
                received = progress.received,
                quota = progress.quota,
                "Merchant reached monthly topup quota"
            );
        }
        Ok(progress)
    }

    fn get_topup_progress(&self, merchant: &UserId, month: &str) -> Result<Option<TopupProgress>> {
        self.read(cf::TOPUP_PROGRESS, &keys::topup_key(merchant, month))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn progress_accumulates_per_month() {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        let mentor = UserId::generate();
        let merchant = UserId::generate();
        let march = Utc.with_ymd_and_hms(2026, 3, 5, 12, 0, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();

        store.record_topup(&mentor, &merchant, 600, 1_000, march).unwrap();
        let progress = store.record_topup(&mentor, &merchant, 500, 1_000, march).unwrap();
        assert_eq!(progress.received, 1_100);
        assert_eq!(progress.transfer_count, 2);
        assert!(progress.quota_reached());
        assert_eq!(progress.remaining(), 0);

        store.record_topup(&mentor, &merchant, 10, 1_000, april).unwrap();
        let april_progress = store.get_topup_progress(&merchant, "2026-04").unwrap().unwrap();
        assert_eq!(april_progress.received, 10);
        assert_eq!(april_progress.last_mentor, Some(mentor));
        assert!(store.get_topup_progress(&merchant, "2026-05").unwrap().is_none());
    }
}
