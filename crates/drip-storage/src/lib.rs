//! # hashdrip Storage
//!
//! Durable account persistence behind a per-account serialized store.
//!
//! ## Layout
//!
//! - `memory_db` - in-process map, for tests and throwaway runs
//! - `json_db` - single JSON document on disk, rewritten atomically
//! - `rocks_db` - one RocksDB key per account (feature `rocksdb`)
//! - `store` - [`AccountStore`], the get-or-create / update contract used by
//!   the engines, with a lock per account id

pub mod json_db;
#[cfg(feature = "rocksdb")]
pub mod rocks_db;
pub mod store;

use drip_core::{Account, AccountId, DripError};
use thiserror::Error;

/// Errors raised by storage backends
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Backend error: {0}")]
    Backend(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

impl From<StoreError> for DripError {
    fn from(e: StoreError) -> Self {
        DripError::StorageFailure(e.to_string())
    }
}

/// Key-value persistence for account records.
///
/// Backends only need to be individually consistent per key; cross-request
/// serialization is handled by [`AccountStore`].
pub trait AccountBackend: Send + Sync {
    /// Load one account
    fn load(&self, id: AccountId) -> Result<Option<Account>, StoreError>;

    /// Insert or overwrite one account durably
    fn save(&self, account: &Account) -> Result<(), StoreError>;

    /// Insert or overwrite several accounts as one write: either all of them
    /// are stored or none is.
    ///
    /// The default saves one by one and is only all-or-nothing for a single
    /// record; the bundled backends override it.
    fn save_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
        for account in accounts {
            self.save(account)?;
        }
        Ok(())
    }

    /// All stored ids, ascending
    fn ids(&self) -> Result<Vec<AccountId>, StoreError>;

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.ids()?.len())
    }

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

pub mod memory_db {
    //! In-memory account backend

    use super::{AccountBackend, StoreError};
    use drip_core::{Account, AccountId};
    use parking_lot::RwLock;
    use std::collections::BTreeMap;

    /// Account map held in process memory; lost on restart
    pub struct MemoryBackend {
        data: RwLock<BTreeMap<AccountId, Account>>,
    }

    impl MemoryBackend {
        pub fn new() -> Self {
            Self {
                data: RwLock::new(BTreeMap::new()),
            }
        }
    }

    impl Default for MemoryBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    impl AccountBackend for MemoryBackend {
        fn load(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            Ok(self.data.read().get(&id).cloned())
        }

        fn save(&self, account: &Account) -> Result<(), StoreError> {
            self.data.write().insert(account.id(), account.clone());
            Ok(())
        }

        fn save_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
            let mut data = self.data.write();
            for account in accounts {
                data.insert(account.id(), account.clone());
            }
            Ok(())
        }

        fn ids(&self) -> Result<Vec<AccountId>, StoreError> {
            Ok(self.data.read().keys().copied().collect())
        }

        fn len(&self) -> Result<usize, StoreError> {
            Ok(self.data.read().len())
        }
    }
}

// Re-export for convenience
pub use json_db::JsonFileBackend;
pub use memory_db::MemoryBackend;
#[cfg(feature = "rocksdb")]
pub use rocks_db::RocksBackend;
pub use store::AccountStore;
