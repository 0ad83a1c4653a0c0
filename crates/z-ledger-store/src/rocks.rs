//! `RocksDB` storage implementation.
//!
//! The store is a pessimistic `TransactionDB`. Every ledger mutation runs
//! through [`RocksStore::run_in_transaction`], which hands the operation a
//! [`LedgerTx`], commits when the operation returns `Ok`, rolls back when it
//! returns `Err`, and retries a bounded number of times on lock timeouts and
//! detected deadlocks.
//!
//! # Lock order
//!
//! Rows are locked in this order, and within one class by ascending key:
//!
//! 1. gifts (shared), call sessions, withdrawals, linked accounts, number claims
//! 2. account balances, ascending `UserId`
//! 3. earnings balances, ascending `UserId`
//!
//! Operations never hold a lock across an `.await`: transaction bodies are
//! synchronous closures.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, MultiThreaded, Options,
    Transaction, TransactionDB, TransactionDBOptions, TransactionOptions, WriteOptions,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use z_ledger_core::{AccountBalance, EarningsBalance, LedgerError, TransactionRecord, UserId};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};

/// Attempts per transaction before contention surfaces to the caller.
pub const MAX_TXN_ATTEMPTS: u32 = 3;

/// Default row lock wait in milliseconds.
pub const DEFAULT_LOCK_TIMEOUT_MS: i64 = 2_000;

/// Tuning knobs for the store.
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    /// How long a transaction waits for a row lock before giving up.
    pub lock_timeout_ms: i64,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
        }
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<TransactionDB<MultiThreaded>>,
    options: StoreOptions,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, StoreOptions::default())
    }

    /// Open with explicit [`StoreOptions`].
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_db_opts = TransactionDBOptions::default();
        txn_db_opts.set_default_lock_timeout(options.lock_timeout_ms);
        txn_db_opts.set_txn_lock_timeout(options.lock_timeout_ms);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = TransactionDB::open_cf_descriptors(&opts, &txn_db_opts, path, cf_descriptors)
            .map_err(|e| StoreError::Database(e.to_string()))?;

        Ok(Self {
            db: Arc::new(db),
            options,
        })
    }

    /// Get a column family handle.
    pub(crate) fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    pub(crate) fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    pub(crate) fn deserialize<T: DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read a record outside any transaction.
    pub(crate) fn read<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        self.db
            .get_cf(&cf, key)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Keys under `prefix`, newest (highest) first, after skipping `offset`.
    pub(crate) fn scan_prefix_rev(
        &self,
        cf_name: &str,
        prefix: &[u8],
        offset: usize,
        limit: usize,
    ) -> Result<Vec<Box<[u8]>>> {
        let cf = self.cf(cf_name)?;
        let upper = keys::prefix_upper_bound(prefix);
        let iter = self
            .db
            .iterator_cf(&cf, IteratorMode::From(&upper, Direction::Reverse));

        let mut out = Vec::new();
        let mut skipped = 0;
        for item in iter {
            let (key, _) = item?;
            if !key.starts_with(prefix) {
                break;
            }
            if skipped < offset {
                skipped += 1;
                continue;
            }
            if out.len() >= limit {
                break;
            }
            out.push(key);
        }
        Ok(out)
    }

    /// Load the records referenced by the trailing ids of index keys.
    pub(crate) fn resolve_index<T: DeserializeOwned>(
        &self,
        index_keys: &[Box<[u8]>],
        target_cf: &str,
    ) -> Result<Vec<T>> {
        let mut records = Vec::with_capacity(index_keys.len());
        for key in index_keys {
            let id = keys::trailing_id(key)?;
            if let Some(record) = self.read(target_cf, &id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Values of a whole column family, newest key first.
    pub(crate) fn scan_values_rev<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        limit: usize,
    ) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut out = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::End) {
            if out.len() >= limit {
                break;
            }
            let (_, value) = item?;
            out.push(Self::deserialize(&value)?);
        }
        Ok(out)
    }

    fn begin(&self) -> LedgerTx<'_> {
        let write_opts = WriteOptions::default();
        let mut txn_opts = TransactionOptions::default();
        txn_opts.set_deadlock_detect(true);
        txn_opts.set_lock_timeout(self.options.lock_timeout_ms);
        LedgerTx {
            store: self,
            txn: self.db.transaction_opt(&write_opts, &txn_opts),
        }
    }

    /// Run `body` inside one store transaction.
    ///
    /// Commits on `Ok`, rolls back on `Err`. Lock timeouts and deadlocks
    /// (`StoreError::Contention`, from the body or from commit) restart the
    /// body up to [`MAX_TXN_ATTEMPTS`] times, after which the contention is
    /// reported as `LedgerError::ConcurrentModification`.
    ///
    /// # Errors
    ///
    /// Returns whatever `body` returns, or a commit failure.
    pub fn run_in_transaction<T, F>(&self, op: &'static str, mut body: F) -> Result<T>
    where
        F: FnMut(&LedgerTx<'_>) -> Result<T>,
    {
        let mut attempt = 1;
        loop {
            let tx = self.begin();
            let outcome = match body(&tx) {
                Ok(value) => tx.txn.commit().map(|()| value).map_err(StoreError::from),
                Err(e) => {
                    if let Err(rollback_err) = tx.txn.rollback() {
                        tracing::warn!(op, error = %rollback_err, "rollback failed");
                    }
                    Err(e)
                }
            };

            match outcome {
                Err(StoreError::Contention(reason)) if attempt < MAX_TXN_ATTEMPTS => {
                    tracing::debug!(op, attempt, %reason, "lock contention, retrying transaction");
                    attempt += 1;
                }
                Err(StoreError::Contention(reason)) => {
                    tracing::warn!(op, attempt, %reason, "lock contention retries exhausted");
                    return Err(LedgerError::ConcurrentModification.into());
                }
                other => return other,
            }
        }
    }
}

/// An open store transaction with row-level primitives.
pub struct LedgerTx<'a> {
    store: &'a RocksStore,
    txn: Transaction<'a, TransactionDB<MultiThreaded>>,
}

impl LedgerTx<'_> {
    /// Read without locking (sees this transaction's own writes).
    ///
    /// # Errors
    ///
    /// Returns an error on database or decoding failure.
    pub fn get<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;
        self.txn
            .get_cf(&cf, key)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    /// Read and take an exclusive row lock, held until commit or rollback.
    ///
    /// The key is locked even when absent, which makes this usable for
    /// uniqueness claims.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Contention` if the lock cannot be acquired in time.
    pub fn lock<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        self.get_for_update(cf_name, key, true)
    }

    /// Read and take a shared row lock.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Contention` if the lock cannot be acquired in time.
    pub fn lock_shared<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        self.get_for_update(cf_name, key, false)
    }

    fn get_for_update<T: DeserializeOwned>(
        &self,
        cf_name: &str,
        key: &[u8],
        exclusive: bool,
    ) -> Result<Option<T>> {
        let cf = self.store.cf(cf_name)?;
        self.txn
            .get_for_update_cf(&cf, key, exclusive)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    /// Write a record.
    ///
    /// # Errors
    ///
    /// Returns an error on database or encoding failure.
    pub fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.put_cf(&cf, key, RocksStore::serialize(value)?)?;
        Ok(())
    }

    /// Write an index entry with an empty value.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn put_index(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.put_cf(&cf, key, [])?;
        Ok(())
    }

    /// Delete a key.
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn delete(&self, cf_name: &str, key: &[u8]) -> Result<()> {
        let cf = self.store.cf(cf_name)?;
        self.txn.delete_cf(&cf, key)?;
        Ok(())
    }

    // =========================================================================
    // Ledger rows
    // =========================================================================

    /// Does the directory know this user?
    ///
    /// # Errors
    ///
    /// Returns an error on database failure.
    pub fn user_exists(&self, user_id: &UserId) -> Result<bool> {
        let cf = self.store.cf(cf::USERS)?;
        Ok(self.txn.get_cf(&cf, keys::user_key(user_id))?.is_some())
    }

    /// Lock the spendable balance rows of `users` in ascending id order.
    ///
    /// Missing rows come back as zero balances when the user exists in the
    /// directory; otherwise the call fails with `UserNotFound`.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound`, or `Contention` on lock failure.
    pub fn lock_accounts(&self, users: &[UserId]) -> Result<Vec<AccountBalance>> {
        let mut ordered = users.to_vec();
        ordered.sort_unstable();
        ordered.dedup();

        let mut rows = Vec::with_capacity(ordered.len());
        for user_id in ordered {
            let row = match self.lock(cf::ACCOUNT_BALANCES, &keys::user_key(&user_id))? {
                Some(row) => row,
                None if self.user_exists(&user_id)? => AccountBalance::new(user_id),
                None => return Err(user_not_found(&user_id)),
            };
            rows.push(row);
        }
        Ok(rows)
    }

    /// Lock one spendable balance row.
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound`, or `Contention` on lock failure.
    pub fn lock_account(&self, user_id: &UserId) -> Result<AccountBalance> {
        self.lock_accounts(std::slice::from_ref(user_id))?
            .pop()
            .ok_or_else(|| user_not_found(user_id))
    }

    /// Write a spendable balance row.
    ///
    /// # Errors
    ///
    /// Returns an error on database or encoding failure.
    pub fn put_account(&self, row: &AccountBalance) -> Result<()> {
        self.put(cf::ACCOUNT_BALANCES, &keys::user_key(&row.user_id), row)
    }

    /// Lock one earnings row (created empty if the user exists).
    ///
    /// # Errors
    ///
    /// Returns `UserNotFound`, or `Contention` on lock failure.
    pub fn lock_earnings(&self, user_id: &UserId) -> Result<EarningsBalance> {
        match self.lock(cf::EARNINGS_BALANCES, &keys::user_key(user_id))? {
            Some(row) => Ok(row),
            None if self.user_exists(user_id)? => Ok(EarningsBalance::new(*user_id)),
            None => Err(user_not_found(user_id)),
        }
    }

    /// Write an earnings row.
    ///
    /// # Errors
    ///
    /// Returns an error on database or encoding failure.
    pub fn put_earnings(&self, row: &EarningsBalance) -> Result<()> {
        self.put(cf::EARNINGS_BALANCES, &keys::user_key(&row.user_id), row)
    }

    /// Append a transaction record and index it under every participant.
    ///
    /// # Errors
    ///
    /// Returns an error on database or encoding failure.
    pub fn append_transaction(&self, record: &TransactionRecord) -> Result<()> {
        let id = record.id.to_bytes();
        self.put(cf::TRANSACTIONS, &keys::ulid_key(id), record)?;
        for user_id in record.participants() {
            self.put_index(cf::TRANSACTIONS_BY_USER, &keys::user_index_key(&user_id, id))?;
        }
        Ok(())
    }
}

pub(crate) fn user_not_found(user_id: &UserId) -> StoreError {
    LedgerError::UserNotFound {
        user: user_id.to_string(),
    }
    .into()
}
