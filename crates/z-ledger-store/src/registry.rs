//! Linked payout accounts.
//!
//! Account numbers are unique across all users once normalized. The claim
//! survives unlinking, so a number can only ever come back to its first owner.

use chrono::Utc;
use z_ledger_core::{
    normalize_account_number, LedgerError, LinkedAccount, LinkedAccountId, NewLinkedAccount,
    UserId,
};

use crate::error::Result;
use crate::keys;
use crate::rocks::{user_not_found, RocksStore};
use crate::schema::cf;
use crate::{AccountNumberClaim, Registry};

impl Registry for RocksStore {
    fn link_account(&self, user_id: &UserId, input: NewLinkedAccount) -> Result<LinkedAccount> {
        input.validate()?;
        let number_key = keys::account_number_key(&normalize_account_number(&input.account_number));

        let account = self.run_in_transaction("link_account", |tx| {
            if !tx.user_exists(user_id)? {
                return Err(user_not_found(user_id));
            }

            let claim = tx.lock::<AccountNumberClaim>(cf::LINKED_ACCOUNT_NUMBERS, &number_key)?;
            let account = match claim {
                Some(claim) if claim.user_id != *user_id => {
                    return Err(LedgerError::DuplicateLinkedAccount.into());
                }
                Some(claim) => {
                    let key = keys::ulid_key(claim.account_id.to_bytes());
                    match tx.lock::<LinkedAccount>(cf::LINKED_ACCOUNTS, &key)? {
                        Some(existing) if existing.active => {
                            return Err(LedgerError::DuplicateLinkedAccount.into());
                        }
                        // Relinking a number the user unlinked earlier reuses the record.
                        Some(existing) => {
                            let fresh = LinkedAccount::new(*user_id, input.clone());
                            LinkedAccount {
                                id: existing.id,
                                created_at: existing.created_at,
                                updated_at: Utc::now(),
                                ..fresh
                            }
                        }
                        None => LinkedAccount::new(*user_id, input.clone()),
                    }
                }
                None => LinkedAccount::new(*user_id, input.clone()),
            };

            let id = account.id.to_bytes();
            tx.put(cf::LINKED_ACCOUNTS, &keys::ulid_key(id), &account)?;
            tx.put_index(cf::LINKED_ACCOUNTS_BY_USER, &keys::user_index_key(user_id, id))?;
            tx.put(
                cf::LINKED_ACCOUNT_NUMBERS,
                &number_key,
                &AccountNumberClaim {
                    user_id: *user_id,
                    account_id: account.id,
                },
            )?;
            Ok(account)
        })?;

        tracing::info!(
            user_id = %user_id,
            account_id = %account.id,
            account_type = %account.account_type,
            provider = %account.provider,
            "Linked payout account"
        );
        Ok(account)
    }

    fn list_linked_accounts(&self, user_id: &UserId) -> Result<Vec<LinkedAccount>> {
        let index = self.scan_prefix_rev(
            cf::LINKED_ACCOUNTS_BY_USER,
            &keys::user_prefix(user_id),
            0,
            usize::MAX,
        )?;
        let accounts: Vec<LinkedAccount> = self.resolve_index(&index, cf::LINKED_ACCOUNTS)?;
        Ok(accounts.into_iter().filter(|a| a.active).collect())
    }

    fn get_linked_account(&self, account_id: &LinkedAccountId) -> Result<Option<LinkedAccount>> {
        self.read(cf::LINKED_ACCOUNTS, &keys::ulid_key(account_id.to_bytes()))
    }

    fn unlink_account(&self, user_id: &UserId, account_id: &LinkedAccountId) -> Result<LinkedAccount> {
        let account = self.run_in_transaction("unlink_account", |tx| {
            let key = keys::ulid_key(account_id.to_bytes());
            let mut account = tx
                .lock::<LinkedAccount>(cf::LINKED_ACCOUNTS, &key)?
                .filter(|a| a.user_id == *user_id && a.active)
                .ok_or_else(|| LedgerError::LinkedAccountNotFound {
                    account_id: account_id.to_string(),
                })?;
            account.active = false;
            account.updated_at = Utc::now();
            tx.put(cf::LINKED_ACCOUNTS, &key, &account)?;
            Ok(account)
        })?;

        tracing::info!(user_id = %user_id, account_id = %account_id, "Unlinked payout account");
        Ok(account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use z_ledger_core::{AccountType, Role};

    use crate::{Directory, StoreError};

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    fn bank(number: &str) -> NewLinkedAccount {
        NewLinkedAccount {
            account_type: AccountType::Bank,
            provider: "bca".into(),
            account_name: "Bank Central Asia".into(),
            account_number: number.into(),
            holder_name: "Holder".into(),
        }
    }

    #[test]
    fn account_number_is_unique_across_users() {
        let (store, _dir) = create_test_store();
        let a = UserId::generate();
        let b = UserId::generate();
        store.sync_user(&a, "a", Role::User).unwrap();
        store.sync_user(&b, "b", Role::User).unwrap();

        let linked = store.link_account(&a, bank("1234-5678")).unwrap();
        assert_eq!(linked.provider, "BCA");

        assert!(matches!(
            store.link_account(&b, bank("1234 5678")),
            Err(StoreError::Ledger(LedgerError::DuplicateLinkedAccount))
        ));
        assert!(matches!(
            store.link_account(&a, bank("12345678")),
            Err(StoreError::Ledger(LedgerError::DuplicateLinkedAccount))
        ));
        assert!(store.list_linked_accounts(&b).unwrap().is_empty());
    }

    #[test]
    fn unlinked_number_stays_with_its_owner() {
        let (store, _dir) = create_test_store();
        let a = UserId::generate();
        let b = UserId::generate();
        store.sync_user(&a, "a", Role::User).unwrap();
        store.sync_user(&b, "b", Role::User).unwrap();

        let linked = store.link_account(&a, bank("555")).unwrap();
        store.unlink_account(&a, &linked.id).unwrap();
        assert!(store.list_linked_accounts(&a).unwrap().is_empty());

        assert!(matches!(
            store.link_account(&b, bank("555")),
            Err(StoreError::Ledger(LedgerError::DuplicateLinkedAccount))
        ));

        let relinked = store.link_account(&a, bank("555")).unwrap();
        assert_eq!(relinked.id, linked.id);
        assert!(relinked.active);
        assert_eq!(store.list_linked_accounts(&a).unwrap().len(), 1);
    }

    #[test]
    fn unlink_checks_ownership() {
        let (store, _dir) = create_test_store();
        let a = UserId::generate();
        let b = UserId::generate();
        store.sync_user(&a, "a", Role::User).unwrap();
        store.sync_user(&b, "b", Role::User).unwrap();

        let linked = store.link_account(&a, bank("777")).unwrap();
        assert!(matches!(
            store.unlink_account(&b, &linked.id),
            Err(StoreError::Ledger(LedgerError::LinkedAccountNotFound { .. }))
        ));
        assert!(store.get_linked_account(&linked.id).unwrap().unwrap().active);
    }

    #[test]
    fn blank_fields_rejected() {
        let (store, _dir) = create_test_store();
        let a = UserId::generate();
        store.sync_user(&a, "a", Role::User).unwrap();
        let mut input = bank("1");
        input.holder_name = "  ".into();
        assert!(matches!(
            store.link_account(&a, input),
            Err(StoreError::Ledger(LedgerError::InvalidInput(_)))
        ));
    }
}
