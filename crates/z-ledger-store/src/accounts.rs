//! Account ledger: spendable balances and transaction history.

use z_ledger_core::{
    ensure_positive, AccountBalance, LedgerError, LedgerKind, TransactionId, TransactionKind,
    TransactionRecord, UserId,
};

use crate::error::Result;
use crate::keys;
use crate::rocks::{user_not_found, RocksStore};
use crate::schema::cf;
use crate::{AccountLedger, LedgerEntry, TransferReceipt};

fn ensure_spendable(kind: TransactionKind) -> Result<()> {
    if kind.ledger() != LedgerKind::Spendable {
        return Err(LedgerError::InvalidAmount(format!(
            "{kind} does not move spendable balance"
        ))
        .into());
    }
    Ok(())
}

impl AccountLedger for RocksStore {
    fn get_balance(&self, user_id: &UserId) -> Result<i64> {
        if let Some(row) =
            self.read::<AccountBalance>(cf::ACCOUNT_BALANCES, &keys::user_key(user_id))?
        {
            return Ok(row.balance);
        }
        if self.user_known(user_id)? {
            Ok(0)
        } else {
            Err(user_not_found(user_id))
        }
    }

    fn credit(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerEntry> {
        ensure_positive(amount)?;
        ensure_spendable(kind)?;

        let entry = self.run_in_transaction("credit", |tx| {
            let mut row = tx.lock_account(user_id)?;
            let balance = row.credit(amount)?;
            tx.put_account(&row)?;

            let transaction = TransactionRecord::system_credit(*user_id, amount, kind, description);
            tx.append_transaction(&transaction)?;
            Ok(LedgerEntry {
                transaction,
                balance,
            })
        })?;

        tracing::info!(
            user_id = %user_id,
            amount,
            kind = %kind,
            balance = entry.balance,
            "Credited account"
        );
        Ok(entry)
    }

    fn debit(
        &self,
        user_id: &UserId,
        amount: i64,
        kind: TransactionKind,
        description: &str,
    ) -> Result<LedgerEntry> {
        ensure_positive(amount)?;
        ensure_spendable(kind)?;

        let entry = self.run_in_transaction("debit", |tx| {
            let mut row = tx.lock_account(user_id)?;
            let balance = row.debit(amount)?;
            tx.put_account(&row)?;

            let transaction = TransactionRecord::system_debit(*user_id, amount, kind, description);
            tx.append_transaction(&transaction)?;
            Ok(LedgerEntry {
                transaction,
                balance,
            })
        })?;

        tracing::info!(
            user_id = %user_id,
            amount,
            kind = %kind,
            balance = entry.balance,
            "Debited account"
        );
        Ok(entry)
    }

    fn transfer(
        &self,
        from: &UserId,
        to: &UserId,
        amount: i64,
        description: &str,
    ) -> Result<TransferReceipt> {
        ensure_positive(amount)?;
        if from == to {
            return Err(LedgerError::InvalidRecipient("cannot transfer to yourself".into()).into());
        }

        let receipt = self.run_in_transaction("transfer", |tx| {
            let rows = tx.lock_accounts(&[*from, *to])?;
            let (mut sender, mut recipient) = match rows.as_slice() {
                [a, b] if a.user_id == *from => (a.clone(), b.clone()),
                [a, b] => (b.clone(), a.clone()),
                _ => return Err(user_not_found(to)),
            };

            let from_balance = sender.debit(amount)?;
            let to_balance = recipient.credit(amount)?;
            tx.put_account(&sender)?;
            tx.put_account(&recipient)?;

            let transaction = TransactionRecord::transfer(*from, *to, amount, description);
            tx.append_transaction(&transaction)?;
            Ok(TransferReceipt {
                transaction,
                from_balance,
                to_balance,
            })
        })?;

        tracing::info!(
            from = %from,
            to = %to,
            amount,
            transaction_id = %receipt.transaction.id,
            "Transfer committed"
        );
        Ok(receipt)
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<TransactionRecord>> {
        self.read(cf::TRANSACTIONS, &keys::ulid_key(transaction_id.to_bytes()))
    }

    fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<TransactionRecord>> {
        let index = self.scan_prefix_rev(
            cf::TRANSACTIONS_BY_USER,
            &keys::user_prefix(user_id),
            offset,
            limit,
        )?;
        self.resolve_index(&index, cf::TRANSACTIONS)
    }
}
