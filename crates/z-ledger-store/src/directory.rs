//! User directory, gift catalog and public room registry.

use chrono::Utc;
use z_ledger_core::{
    normalize_username, Gift, GiftId, LedgerError, Role, Room, UserId, UserProfile,
};

use crate::error::Result;
use crate::keys;
use crate::rocks::{user_not_found, LedgerTx, RocksStore};
use crate::schema::cf;
use crate::Directory;

impl RocksStore {
    pub(crate) fn user_known(&self, user_id: &UserId) -> Result<bool> {
        Ok(self
            .read::<UserProfile>(cf::USERS, &keys::user_key(user_id))?
            .is_some())
    }
}

/// Write `profile`, moving its username claim if the name changed.
fn write_profile(tx: &LedgerTx<'_>, profile: &UserProfile) -> Result<()> {
    let user_key = keys::user_key(&profile.user_id);
    let name_key = keys::username_key(&profile.username_key());

    if let Some(owner) = tx.lock::<UserId>(cf::USERNAMES, &name_key)? {
        if owner != profile.user_id {
            return Err(LedgerError::UsernameTaken {
                username: profile.username.clone(),
            }
            .into());
        }
    }

    if let Some(previous) = tx.lock::<UserProfile>(cf::USERS, &user_key)? {
        if previous.username_key() != profile.username_key() {
            tx.delete(cf::USERNAMES, &keys::username_key(&previous.username_key()))?;
        }
    }

    tx.put(cf::USERNAMES, &name_key, &profile.user_id)?;
    tx.put(cf::USERS, &user_key, profile)
}

impl Directory for RocksStore {
    fn put_user(&self, profile: &UserProfile) -> Result<()> {
        self.run_in_transaction("put_user", |tx| write_profile(tx, profile))
    }

    fn sync_user(&self, user_id: &UserId, username: &str, role: Role) -> Result<UserProfile> {
        let fresh = UserProfile::new(*user_id, username.trim(), role)?;
        let profile = self.run_in_transaction("sync_user", |tx| {
            let profile = match tx.get::<UserProfile>(cf::USERS, &keys::user_key(user_id))? {
                Some(mut existing) => {
                    existing.username.clone_from(&fresh.username);
                    existing.role = role;
                    existing.updated_at = Utc::now();
                    existing
                }
                None => fresh.clone(),
            };
            write_profile(tx, &profile)?;
            Ok(profile)
        })?;

        tracing::info!(user_id = %user_id, username = %profile.username, role = %role, "Synced user");
        Ok(profile)
    }

    fn get_user(&self, user_id: &UserId) -> Result<Option<UserProfile>> {
        self.read(cf::USERS, &keys::user_key(user_id))
    }

    fn find_user_by_username(&self, username: &str) -> Result<Option<UserProfile>> {
        let key = keys::username_key(&normalize_username(username));
        match self.read::<UserId>(cf::USERNAMES, &key)? {
            Some(user_id) => self.get_user(&user_id),
            None => Ok(None),
        }
    }

    fn set_pin_hash(&self, user_id: &UserId, pin_hash: &str) -> Result<()> {
        self.run_in_transaction("set_pin_hash", |tx| {
            let key = keys::user_key(user_id);
            let mut profile = tx
                .lock::<UserProfile>(cf::USERS, &key)?
                .ok_or_else(|| user_not_found(user_id))?;
            profile.pin_hash = Some(pin_hash.to_string());
            profile.updated_at = Utc::now();
            tx.put(cf::USERS, &key, &profile)
        })
    }

    fn put_gift(&self, gift: &Gift) -> Result<()> {
        self.run_in_transaction("put_gift", |tx| {
            let key = keys::ulid_key(gift.id.to_bytes());
            tx.lock::<Gift>(cf::GIFTS, &key)?;
            tx.put(cf::GIFTS, &key, gift)
        })?;
        tracing::info!(gift_id = %gift.id, name = %gift.name, price = gift.price, "Gift saved");
        Ok(())
    }

    fn get_gift(&self, gift_id: &GiftId) -> Result<Option<Gift>> {
        self.read(cf::GIFTS, &keys::ulid_key(gift_id.to_bytes()))
    }

    fn put_room(&self, room: &Room) -> Result<()> {
        self.run_in_transaction("put_room", |tx| {
            tx.put(cf::ROOMS, &keys::room_key(&room.id), room)
        })
    }

    fn get_room(&self, room_id: &str) -> Result<Option<Room>> {
        self.read(cf::ROOMS, &keys::room_key(room_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    use crate::StoreError;

    fn create_test_store() -> (RocksStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = RocksStore::open(dir.path()).unwrap();
        (store, dir)
    }

    #[test]
    fn usernames_are_unique_case_insensitively() {
        let (store, _dir) = create_test_store();
        let alice = UserId::generate();
        store.sync_user(&alice, "Alice", Role::User).unwrap();

        let err = store.sync_user(&UserId::generate(), "alice", Role::User).unwrap_err();
        assert!(matches!(err, StoreError::Ledger(LedgerError::UsernameTaken { .. })));

        let found = store.find_user_by_username("ALICE").unwrap().unwrap();
        assert_eq!(found.user_id, alice);
    }

    #[test]
    fn rename_releases_old_username_and_keeps_pin() {
        let (store, _dir) = create_test_store();
        let alice = UserId::generate();
        store.sync_user(&alice, "alice", Role::User).unwrap();
        store.set_pin_hash(&alice, "hash").unwrap();

        let renamed = store.sync_user(&alice, "alicia", Role::Mentor).unwrap();
        assert_eq!(renamed.pin_hash.as_deref(), Some("hash"));
        assert_eq!(renamed.role, Role::Mentor);
        assert!(store.find_user_by_username("alice").unwrap().is_none());

        let bob = UserId::generate();
        store.sync_user(&bob, "alice", Role::User).unwrap();
    }

    #[test]
    fn pin_for_unknown_user_fails() {
        let (store, _dir) = create_test_store();
        assert!(matches!(
            store.set_pin_hash(&UserId::generate(), "hash"),
            Err(StoreError::Ledger(LedgerError::UserNotFound { .. }))
        ));
    }

    #[test]
    fn gifts_and_rooms_roundtrip() {
        let (store, _dir) = create_test_store();
        let gift = Gift::new(GiftId::generate(), "Rose", 150).unwrap();
        store.put_gift(&gift).unwrap();
        assert_eq!(store.get_gift(&gift.id).unwrap().unwrap().price, 150);

        store.put_room(&Room::new("lobby", "Lobby").unwrap()).unwrap();
        assert!(store.get_room("lobby").unwrap().is_some());
        assert!(store.get_room("attic").unwrap().is_none());
    }
}
