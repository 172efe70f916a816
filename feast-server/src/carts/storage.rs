//! redb-based storage for user aggregates and their carts
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `users` | `user_id` | `UserRecord` (JSON) | Aggregate root, carts embedded |
//! | `user_emails` | `email` | `user_id` | Unique email index |
//!
//! # Concurrency
//!
//! Every cart mutation is a read-modify-write of the whole user record.
//! [`CartStorage::save_user`] is a compare-and-swap on `UserRecord::version`
//! executed inside a single redb write transaction (redb serializes writers),
//! so a stale writer gets [`StorageError::VersionConflict`] instead of
//! silently overwriting a concurrent update.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::Cart;
use thiserror::Error;

use super::user::{UserRecord, normalize_email};

/// key = user_id, value = JSON-serialized UserRecord
const USERS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("users");

/// key = normalized email, value = user_id
const USER_EMAILS_TABLE: TableDefinition<&str, &str> = TableDefinition::new("user_emails");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Email already registered: {0}")]
    EmailTaken(String),

    #[error("Version conflict on user {user_id}: expected {expected}, found {actual}")]
    VersionConflict {
        user_id: String,
        expected: u64,
        actual: u64,
    },
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Cart store backed by redb
#[derive(Clone)]
pub struct CartStorage {
    db: Arc<Database>,
}

impl std::fmt::Debug for CartStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartStorage").finish_non_exhaustive()
    }
}

impl CartStorage {
    /// Open or create the database at the given path
    ///
    /// redb commits with `Durability::Immediate` by default: a committed
    /// cart mutation survives a crash.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        Self::init(db)
    }

    /// Open an in-memory database (tests, ephemeral dev servers)
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        Self::init(db)
    }

    fn init(db: Database) -> StorageResult<Self> {
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(USERS_TABLE)?;
            let _ = write_txn.open_table(USER_EMAILS_TABLE)?;
        }
        write_txn.commit()?;
        Ok(Self { db: Arc::new(db) })
    }

    // ========== User Operations ==========

    /// Insert a new user. Fails with `EmailTaken` if the email is indexed.
    pub fn insert_user(&self, user: &UserRecord) -> StorageResult<()> {
        let email = normalize_email(&user.email);
        let txn = self.db.begin_write()?;
        {
            let mut emails = txn.open_table(USER_EMAILS_TABLE)?;
            if emails.get(email.as_str())?.is_some() {
                return Err(StorageError::EmailTaken(email));
            }
            emails.insert(email.as_str(), user.id.as_str())?;

            let mut users = txn.open_table(USERS_TABLE)?;
            let value = serde_json::to_vec(user)?;
            users.insert(user.id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load a user aggregate
    pub fn load_user(&self, user_id: &str) -> StorageResult<Option<UserRecord>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USERS_TABLE)?;

        match table.get(user_id)? {
            Some(value) => Ok(Some(serde_json::from_slice(value.value())?)),
            None => Ok(None),
        }
    }

    /// Load a user aggregate, `UserNotFound` if absent
    pub fn require_user(&self, user_id: &str) -> StorageResult<UserRecord> {
        self.load_user(user_id)?
            .ok_or_else(|| StorageError::UserNotFound(user_id.to_string()))
    }

    pub fn find_user_by_email(&self, email: &str) -> StorageResult<Option<UserRecord>> {
        let email = normalize_email(email);
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(USER_EMAILS_TABLE)?;
        let user_id = match table.get(email.as_str())? {
            Some(id) => id.value().to_string(),
            None => return Ok(None),
        };
        drop(table);
        drop(read_txn);
        self.load_user(&user_id)
    }

    /// Compare-and-swap save of a user aggregate.
    ///
    /// `user.version` must equal the stored version; the record is written
    /// with `version + 1` and returned.
    pub fn save_user(&self, mut user: UserRecord) -> StorageResult<UserRecord> {
        let expected = user.version;
        let txn = self.db.begin_write()?;
        {
            let mut users = txn.open_table(USERS_TABLE)?;
            let actual = {
                let current = users
                    .get(user.id.as_str())?
                    .ok_or_else(|| StorageError::UserNotFound(user.id.clone()))?;
                let stored: UserRecord = serde_json::from_slice(current.value())?;
                stored.version
            };
            if actual != expected {
                return Err(StorageError::VersionConflict {
                    user_id: user.id.clone(),
                    expected,
                    actual,
                });
            }

            user.version = expected + 1;
            let value = serde_json::to_vec(&user)?;
            users.insert(user.id.as_str(), value.as_slice())?;
        }
        txn.commit()?;
        Ok(user)
    }

    // ========== Cart Queries ==========

    /// All active carts of a user. Never returns checked-out carts.
    pub fn list_active_carts(&self, user_id: &str) -> StorageResult<Vec<Cart>> {
        let user = self.require_user(user_id)?;
        Ok(user.active_carts().cloned().collect())
    }

    /// The active cart of a user for one restaurant
    pub fn find_cart(&self, user_id: &str, restaurant_id: &str) -> StorageResult<Option<Cart>> {
        let user = self.require_user(user_id)?;
        Ok(user.active_cart(restaurant_id).cloned())
    }

    /// Checked-out carts, newest first
    pub fn list_cart_history(&self, user_id: &str) -> StorageResult<Vec<Cart>> {
        let user = self.require_user(user_id)?;
        Ok(user.cart_history().into_iter().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(email: &str) -> UserRecord {
        UserRecord::new(email, "Test", None, "hash")
    }

    #[test]
    fn insert_and_load() {
        let storage = CartStorage::open_in_memory().unwrap();
        let alice = user("alice@example.com");
        storage.insert_user(&alice).unwrap();

        let loaded = storage.load_user(&alice.id).unwrap().unwrap();
        assert_eq!(loaded.email, "alice@example.com");
        let by_email = storage
            .find_user_by_email("ALICE@example.com ")
            .unwrap()
            .unwrap();
        assert_eq!(by_email.id, alice.id);
        assert!(storage.load_user("missing").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_rejected() {
        let storage = CartStorage::open_in_memory().unwrap();
        storage.insert_user(&user("bob@example.com")).unwrap();
        let err = storage.insert_user(&user("Bob@Example.com")).unwrap_err();
        assert!(matches!(err, StorageError::EmailTaken(e) if e == "bob@example.com"));
    }

    #[test]
    fn save_bumps_version_and_rejects_stale_writer() {
        let storage = CartStorage::open_in_memory().unwrap();
        let u = user("carol@example.com");
        storage.insert_user(&u).unwrap();

        let first = storage.require_user(&u.id).unwrap();
        let stale = first.clone();

        let mut first = first;
        first.carts.push(Cart::open("R1", 0));
        let saved = storage.save_user(first).unwrap();
        assert_eq!(saved.version, 1);

        let mut stale = stale;
        stale.carts.push(Cart::open("R2", 0));
        let err = storage.save_user(stale).unwrap_err();
        assert!(matches!(
            err,
            StorageError::VersionConflict { expected: 0, actual: 1, .. }
        ));

        // winner's write survived
        let carts = storage.list_active_carts(&u.id).unwrap();
        assert_eq!(carts.len(), 1);
        assert_eq!(carts[0].restaurant_id(), "R1");
    }

    #[test]
    fn active_view_filters_checked_out() {
        let storage = CartStorage::open_in_memory().unwrap();
        let mut u = user("dan@example.com");
        let mut done = Cart::open("R1", 0);
        done.check_out(1).unwrap();
        u.carts.push(done);
        u.carts.push(Cart::open("R2", 2));
        storage.insert_user(&u).unwrap();

        let active = storage.list_active_carts(&u.id).unwrap();
        assert_eq!(active.len(), 1);
        assert!(storage.find_cart(&u.id, "R1").unwrap().is_none());
        assert!(storage.find_cart(&u.id, "R2").unwrap().is_some());
        assert_eq!(storage.list_cart_history(&u.id).unwrap().len(), 1);
        assert!(matches!(
            storage.list_active_carts("ghost"),
            Err(StorageError::UserNotFound(_))
        ));
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("feast.redb");
        let u = user("erin@example.com");
        {
            let storage = CartStorage::open(&path).unwrap();
            storage.insert_user(&u).unwrap();
            let mut loaded = storage.require_user(&u.id).unwrap();
            loaded.carts.push(Cart::open("R1", 0));
            storage.save_user(loaded).unwrap();
        }
        let storage = CartStorage::open(&path).unwrap();
        let loaded = storage.require_user(&u.id).unwrap();
        assert_eq!(loaded.version, 1);
        assert_eq!(loaded.carts.len(), 1);
    }
}
