//! Key encoding utilities for `RocksDB`.
//!
//! Index keys are `owner (16 bytes) || record id (16 bytes)`. Record ids are
//! ULIDs, so entries under one owner sort by creation time.

use z_ledger_core::{UserId, WithdrawalStatus};

use crate::error::{Result, StoreError};

/// Length of an encoded UUID or ULID.
pub const ID_LEN: usize = 16;

/// Create a per-user key (balances, users).
#[must_use]
pub fn user_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a key from a ULID-based id.
#[must_use]
pub fn ulid_key(bytes: [u8; ID_LEN]) -> Vec<u8> {
    bytes.to_vec()
}

/// Create a `user_id || record_id` index key.
#[must_use]
pub fn user_index_key(user_id: &UserId, record_id: [u8; ID_LEN]) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 * ID_LEN);
    key.extend_from_slice(user_id.as_bytes());
    key.extend_from_slice(&record_id);
    key
}

/// Prefix for iterating all index entries of a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// One byte tag per withdrawal status.
#[must_use]
pub const fn status_tag(status: WithdrawalStatus) -> u8 {
    match status {
        WithdrawalStatus::Pending => b'p',
        WithdrawalStatus::Processing => b'r',
        WithdrawalStatus::Completed => b'c',
        WithdrawalStatus::Rejected => b'x',
    }
}

/// Create a `status || withdrawal_id` index key.
#[must_use]
pub fn status_index_key(status: WithdrawalStatus, withdrawal_id: [u8; ID_LEN]) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + ID_LEN);
    key.push(status_tag(status));
    key.extend_from_slice(&withdrawal_id);
    key
}

/// Key of a lower-cased username.
#[must_use]
pub fn username_key(normalized: &str) -> Vec<u8> {
    normalized.as_bytes().to_vec()
}

/// Key of a normalized account number.
#[must_use]
pub fn account_number_key(normalized: &str) -> Vec<u8> {
    normalized.as_bytes().to_vec()
}

/// Key of a caller-chosen call id.
#[must_use]
pub fn call_key(call_id: &str) -> Vec<u8> {
    call_id.as_bytes().to_vec()
}

/// Key of a public room.
#[must_use]
pub fn room_key(room_id: &str) -> Vec<u8> {
    room_id.as_bytes().to_vec()
}

/// Create a `merchant_id || YYYY-MM` key.
#[must_use]
pub fn topup_key(merchant: &UserId, month: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(ID_LEN + month.len());
    key.extend_from_slice(merchant.as_bytes());
    key.extend_from_slice(month.as_bytes());
    key
}

/// Smallest key strictly greater than every key starting with `prefix`.
#[must_use]
pub fn prefix_upper_bound(prefix: &[u8]) -> Vec<u8> {
    let mut bound = prefix.to_vec();
    bound.extend_from_slice(&[0xFF; ID_LEN + 1]);
    bound
}

/// Extract the trailing 16 byte record id from an index key.
///
/// # Errors
///
/// Returns `StoreError::Serialization` if the key is too short.
pub fn trailing_id(key: &[u8]) -> Result<[u8; ID_LEN]> {
    let start = key
        .len()
        .checked_sub(ID_LEN)
        .ok_or_else(|| StoreError::Serialization(format!("index key too short: {} bytes", key.len())))?;
    let mut bytes = [0u8; ID_LEN];
    bytes.copy_from_slice(&key[start..]);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use z_ledger_core::TransactionId;

    #[test]
    fn user_index_key_format() {
        let user_id = UserId::generate();
        let tx_id = TransactionId::generate();
        let key = user_index_key(&user_id, tx_id.to_bytes());

        assert_eq!(key.len(), 32);
        assert_eq!(&key[..16], user_id.as_bytes());
        assert_eq!(trailing_id(&key).unwrap(), tx_id.to_bytes());
    }

    #[test]
    fn short_keys_are_errors_not_panics() {
        assert!(trailing_id(&[1, 2, 3]).is_err());
    }

    #[test]
    fn status_keys_group_by_status() {
        let id = [7u8; ID_LEN];
        let pending = status_index_key(WithdrawalStatus::Pending, id);
        let rejected = status_index_key(WithdrawalStatus::Rejected, id);
        assert_eq!(pending[0], b'p');
        assert_ne!(pending, rejected);
    }

    #[test]
    fn upper_bound_sorts_after_prefix_entries() {
        let user_id = UserId::generate();
        let key = user_index_key(&user_id, [0xFF; ID_LEN]);
        assert!(key < prefix_upper_bound(&user_prefix(&user_id)));
    }
}
