//! Withdrawal reservation, payout outcomes and refunds.
//!
//! The earnings row is the source of truth for what a user can still cash
//! out. A withdrawal reserves its coins up front; a definitive payout failure
//! or an admin rejection gives them back exactly once, guarded by the
//! `refunded` flag on the request row.

use z_ledger_core::{
    LedgerError, LinkedAccount, LinkedAccountId, PayoutOutcome, TransactionKind,
    TransactionRecord, UserId, WithdrawalId, WithdrawalQuote, WithdrawalRequest, WithdrawalStatus,
};

use crate::error::Result;
use crate::keys;
use crate::rocks::{LedgerTx, RocksStore};
use crate::schema::cf;
use crate::{PayoutUpdate, RefundOutcome, WithdrawalLedger};

fn not_found(withdrawal_id: &WithdrawalId) -> LedgerError {
    LedgerError::WithdrawalNotFound {
        withdrawal_id: withdrawal_id.to_string(),
    }
}

fn lock_withdrawal(tx: &LedgerTx<'_>, withdrawal_id: &WithdrawalId) -> Result<WithdrawalRequest> {
    Ok(tx
        .lock::<WithdrawalRequest>(cf::WITHDRAWALS, &keys::ulid_key(withdrawal_id.to_bytes()))?
        .ok_or_else(|| not_found(withdrawal_id))?)
}

/// Write the request and keep the status index in step with it.
fn save_withdrawal(
    tx: &LedgerTx<'_>,
    withdrawal: &WithdrawalRequest,
    previous_status: Option<WithdrawalStatus>,
) -> Result<()> {
    let id = withdrawal.id.to_bytes();
    if let Some(previous) = previous_status.filter(|s| *s != withdrawal.status) {
        tx.delete(cf::WITHDRAWALS_BY_STATUS, &keys::status_index_key(previous, id))?;
    }
    tx.put_index(
        cf::WITHDRAWALS_BY_STATUS,
        &keys::status_index_key(withdrawal.status, id),
    )?;
    tx.put(cf::WITHDRAWALS, &keys::ulid_key(id), withdrawal)
}

/// Give the reservation back inside `tx`. Caller checks `refunded` first.
fn restore_reservation(tx: &LedgerTx<'_>, withdrawal: &mut WithdrawalRequest, reason: &str) -> Result<()> {
    if withdrawal.status != WithdrawalStatus::Rejected {
        withdrawal.transition(WithdrawalStatus::Rejected)?;
    }

    let mut earnings = tx.lock_earnings(&withdrawal.user_id)?;
    earnings.restore(withdrawal.amount_coins)?;
    tx.put_earnings(&earnings)?;

    tx.append_transaction(&TransactionRecord::new(
        None,
        Some(withdrawal.user_id),
        withdrawal.amount_coins,
        TransactionKind::WithdrawalRefund,
        format!("Refund for withdrawal {}", withdrawal.reference_id()),
    ))?;

    withdrawal.refunded = true;
    withdrawal.add_note(format!("refunded: {reason}"));
    Ok(())
}

fn flag_for_reconciliation(tx: &LedgerTx<'_>, withdrawal: &mut WithdrawalRequest, note: &str) -> Result<()> {
    withdrawal.needs_reconciliation = true;
    withdrawal.add_note(note);
    tx.put_index(
        cf::WITHDRAWALS_RECONCILIATION,
        &keys::ulid_key(withdrawal.id.to_bytes()),
    )
}

impl WithdrawalLedger for RocksStore {
    fn reserve_withdrawal(
        &self,
        user_id: &UserId,
        account_id: &LinkedAccountId,
        quote: WithdrawalQuote,
    ) -> Result<WithdrawalRequest> {
        let withdrawal = self.run_in_transaction("reserve_withdrawal", |tx| {
            let account = tx
                .lock_shared::<LinkedAccount>(
                    cf::LINKED_ACCOUNTS,
                    &keys::ulid_key(account_id.to_bytes()),
                )?
                .filter(|a| a.user_id == *user_id && a.active)
                .ok_or_else(|| LedgerError::LinkedAccountNotFound {
                    account_id: account_id.to_string(),
                })?;

            let mut earnings = tx.lock_earnings(user_id)?;
            earnings.reserve(quote.amount_coins)?;
            tx.put_earnings(&earnings)?;

            let withdrawal =
                WithdrawalRequest::new(*user_id, *account_id, account.destination(), quote);
            tx.append_transaction(&TransactionRecord::new(
                Some(*user_id),
                None,
                quote.amount_coins,
                TransactionKind::Withdrawal,
                format!("Withdrawal {}", withdrawal.reference_id()),
            ))?;

            tx.put_index(
                cf::WITHDRAWALS_BY_USER,
                &keys::user_index_key(user_id, withdrawal.id.to_bytes()),
            )?;
            save_withdrawal(tx, &withdrawal, None)?;
            Ok(withdrawal)
        })?;

        tracing::info!(
            withdrawal_id = %withdrawal.id,
            user_id = %user_id,
            amount_coins = withdrawal.amount_coins,
            fee_coins = withdrawal.fee_coins,
            "Withdrawal reserved"
        );
        Ok(withdrawal)
    }

    fn get_withdrawal(&self, withdrawal_id: &WithdrawalId) -> Result<Option<WithdrawalRequest>> {
        self.read(cf::WITHDRAWALS, &keys::ulid_key(withdrawal_id.to_bytes()))
    }

    fn list_withdrawals_by_user(&self, user_id: &UserId, limit: usize) -> Result<Vec<WithdrawalRequest>> {
        let index =
            self.scan_prefix_rev(cf::WITHDRAWALS_BY_USER, &keys::user_prefix(user_id), 0, limit)?;
        self.resolve_index(&index, cf::WITHDRAWALS)
    }

    fn list_withdrawals_by_status(
        &self,
        status: WithdrawalStatus,
        limit: usize,
    ) -> Result<Vec<WithdrawalRequest>> {
        let index = self.scan_prefix_rev(
            cf::WITHDRAWALS_BY_STATUS,
            &[keys::status_tag(status)],
            0,
            limit,
        )?;
        self.resolve_index(&index, cf::WITHDRAWALS)
    }

    fn list_reconciliation(&self, limit: usize) -> Result<Vec<WithdrawalRequest>> {
        let index = self.scan_prefix_rev(cf::WITHDRAWALS_RECONCILIATION, &[], 0, limit)?;
        self.resolve_index(&index, cf::WITHDRAWALS)
    }

    fn apply_payout_update(
        &self,
        withdrawal_id: &WithdrawalId,
        payout_id: Option<&str>,
        payout_status: &str,
    ) -> Result<PayoutUpdate> {
        let outcome = PayoutOutcome::classify(payout_status);

        let update = self.run_in_transaction("apply_payout_update", |tx| {
            let mut withdrawal = lock_withdrawal(tx, withdrawal_id)?;
            let previous = withdrawal.status;

            if let Some(incoming) = payout_id {
                match withdrawal.payout_id.as_deref() {
                    Some(stored) if stored != incoming => {
                        return Err(LedgerError::InvalidInput(format!(
                            "payout id {incoming} does not match {stored}"
                        ))
                        .into());
                    }
                    Some(_) => {}
                    None => withdrawal.payout_id = Some(incoming.to_string()),
                }
            }
            withdrawal.payout_status = Some(payout_status.to_string());

            let update = match (outcome, previous) {
                (PayoutOutcome::Succeeded, WithdrawalStatus::Pending | WithdrawalStatus::Processing) => {
                    withdrawal.transition(WithdrawalStatus::Completed)?;
                    let mut earnings = tx.lock_earnings(&withdrawal.user_id)?;
                    earnings.record_withdrawn(withdrawal.amount_coins);
                    tx.put_earnings(&earnings)?;
                    PayoutUpdate::Completed
                }
                (PayoutOutcome::Succeeded, WithdrawalStatus::Rejected) => {
                    flag_for_reconciliation(
                        tx,
                        &mut withdrawal,
                        "payout reported success after the request was rejected",
                    )?;
                    PayoutUpdate::Reconciliation
                }
                (PayoutOutcome::Failed, WithdrawalStatus::Pending | WithdrawalStatus::Processing) => {
                    restore_reservation(tx, &mut withdrawal, &format!("payout {payout_status}"))?;
                    PayoutUpdate::Refunded
                }
                (PayoutOutcome::Failed, WithdrawalStatus::Rejected) if !withdrawal.refunded => {
                    restore_reservation(tx, &mut withdrawal, &format!("payout {payout_status}"))?;
                    PayoutUpdate::Refunded
                }
                (PayoutOutcome::Failed, WithdrawalStatus::Completed) => {
                    flag_for_reconciliation(
                        tx,
                        &mut withdrawal,
                        "payout reported failure after the request was completed",
                    )?;
                    PayoutUpdate::Reconciliation
                }
                (PayoutOutcome::InFlight, WithdrawalStatus::Pending) => {
                    withdrawal.transition(WithdrawalStatus::Processing)?;
                    PayoutUpdate::Processing
                }
                (PayoutOutcome::InFlight, WithdrawalStatus::Rejected) if !withdrawal.needs_reconciliation => {
                    flag_for_reconciliation(
                        tx,
                        &mut withdrawal,
                        "payout accepted after the request was rejected",
                    )?;
                    PayoutUpdate::Reconciliation
                }
                _ => PayoutUpdate::Recorded,
            };

            save_withdrawal(tx, &withdrawal, Some(previous))?;
            Ok(update(withdrawal))
        })?;

        match &update {
            PayoutUpdate::Reconciliation(w) => tracing::error!(
                withdrawal_id = %w.id,
                status = %w.status,
                payout_status,
                "Payout status contradicts withdrawal state, flagged for reconciliation"
            ),
            other => tracing::info!(
                withdrawal_id = %withdrawal_id,
                status = %other.withdrawal().status,
                payout_status,
                "Applied payout status"
            ),
        }
        Ok(update)
    }

    fn refund_withdrawal(&self, withdrawal_id: &WithdrawalId, reason: &str) -> Result<RefundOutcome> {
        let outcome = self.run_in_transaction("refund_withdrawal", |tx| {
            let mut withdrawal = lock_withdrawal(tx, withdrawal_id)?;
            if withdrawal.refunded {
                return Ok(RefundOutcome::AlreadyRefunded(withdrawal));
            }
            let previous = withdrawal.status;
            restore_reservation(tx, &mut withdrawal, reason)?;
            save_withdrawal(tx, &withdrawal, Some(previous))?;
            Ok(RefundOutcome::Refunded(withdrawal))
        })?;

        if let RefundOutcome::Refunded(w) = &outcome {
            tracing::info!(
                withdrawal_id = %w.id,
                user_id = %w.user_id,
                amount_coins = w.amount_coins,
                reason,
                "Withdrawal refunded"
            );
        }
        Ok(outcome)
    }

    fn reject_withdrawal(&self, withdrawal_id: &WithdrawalId, reason: &str) -> Result<RefundOutcome> {
        let outcome = self.run_in_transaction("reject_withdrawal", |tx| {
            let mut withdrawal = lock_withdrawal(tx, withdrawal_id)?;
            if withdrawal.refunded {
                return Ok(RefundOutcome::AlreadyRefunded(withdrawal));
            }
            if withdrawal.status != WithdrawalStatus::Pending || withdrawal.payout_id.is_some() {
                return Err(LedgerError::InvalidStateTransition {
                    from: withdrawal.status.to_string(),
                    to: WithdrawalStatus::Rejected.to_string(),
                }
                .into());
            }
            restore_reservation(tx, &mut withdrawal, reason)?;
            save_withdrawal(tx, &withdrawal, Some(WithdrawalStatus::Pending))?;
            Ok(RefundOutcome::Refunded(withdrawal))
        })?;

        if let RefundOutcome::Refunded(w) = &outcome {
            tracing::info!(
                withdrawal_id = %w.id,
                user_id = %w.user_id,
                amount_coins = w.amount_coins,
                reason,
                "Withdrawal rejected on review"
            );
        }
        Ok(outcome)
    }
}
