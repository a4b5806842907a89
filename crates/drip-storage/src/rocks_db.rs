//! RocksDB backend
//!
//! One key per account: the 8-byte big-endian account id, value is the
//! bincode-encoded [`Account`].

use crate::{AccountBackend, StoreError};
use drip_core::{Account, AccountId};
use rocksdb::{IteratorMode, Options, WriteBatch, DB};
use std::path::Path;
use tracing::info;

/// Account backend on an embedded RocksDB instance
pub struct RocksBackend {
    db: DB,
}

impl RocksBackend {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = DB::open(&opts, path.as_ref()).map_err(backend_err)?;
        info!("Opened RocksDB account store at {:?}", path.as_ref());
        Ok(Self { db })
    }
}

fn backend_err(e: rocksdb::Error) -> StoreError {
    StoreError::Backend(e.to_string())
}

fn decode_key(key: &[u8]) -> Result<AccountId, StoreError> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| StoreError::Serialization(format!("bad key length {}", key.len())))?;
    Ok(AccountId::from_key(bytes))
}

impl AccountBackend for RocksBackend {
    fn load(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        match self.db.get(id.to_key()).map_err(backend_err)? {
            Some(bytes) => bincode::deserialize(&bytes)
                .map(Some)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        let bytes =
            bincode::serialize(account).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.db
            .put(account.id().to_key(), bytes)
            .map_err(backend_err)
    }

    fn save_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let mut batch = WriteBatch::default();
        for account in accounts {
            let bytes = bincode::serialize(account)
                .map_err(|e| StoreError::Serialization(e.to_string()))?;
            batch.put(account.id().to_key(), bytes);
        }
        self.db.write(batch).map_err(backend_err)
    }

    fn ids(&self) -> Result<Vec<AccountId>, StoreError> {
        let mut ids = Vec::new();
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, _) = item.map_err(backend_err)?;
            ids.push(decode_key(&key)?);
        }
        ids.sort();
        Ok(ids)
    }
}
