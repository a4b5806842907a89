//! JSON document backend
//!
//! The whole ledger lives in one JSON file:
//!
//! ```json
//! { "accounts": [ { "id": 42, "balance": "0.000000000015000000", ... } ] }
//! ```
//!
//! Every save rewrites the document to a sibling temp file and renames it over
//! the previous file, so a crash leaves either the old or the new snapshot.
//!
//! Because each save rewrites the whole document, saves are serialized across
//! all accounts, not just per account: two users writing at once take turns on
//! the file. Fine for a small bot; use the `rocksdb` backend when many accounts
//! write concurrently.

use crate::{AccountBackend, StoreError};
use drip_core::{Account, AccountId};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Default, Serialize, Deserialize)]
struct Document {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Account backend persisted as a single JSON file
pub struct JsonFileBackend {
    path: PathBuf,
    accounts: RwLock<BTreeMap<AccountId, Account>>,
    /// Serializes snapshot writes
    persist: Mutex<()>,
}

impl JsonFileBackend {
    /// Open the document at `path`, starting empty if it does not exist
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();

        let accounts = if path.exists() {
            let content = fs::read_to_string(&path)?;
            let doc: Document = if content.trim().is_empty() {
                Document::default()
            } else {
                serde_json::from_str(&content)?
            };
            doc.accounts.into_iter().map(|a| (a.id(), a)).collect()
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            BTreeMap::new()
        };

        info!("Opened account file {:?} ({} accounts)", path, accounts.len());

        Ok(Self {
            path,
            accounts: RwLock::new(accounts),
            persist: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_snapshot(&self) -> Result<(), StoreError> {
        let _guard = self.persist.lock();

        let doc = Document {
            accounts: self.accounts.read().values().cloned().collect(),
        };
        let content = serde_json::to_vec_pretty(&doc)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, content)?;
        fs::rename(&tmp, &self.path)?;

        debug!("Wrote {} accounts to {:?}", doc.accounts.len(), self.path);
        Ok(())
    }
}

impl AccountBackend for JsonFileBackend {
    fn load(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
        Ok(self.accounts.read().get(&id).cloned())
    }

    fn save(&self, account: &Account) -> Result<(), StoreError> {
        self.save_all(std::slice::from_ref(account))
    }

    fn save_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
        let previous: Vec<(AccountId, Option<Account>)> = {
            let mut map = self.accounts.write();
            accounts
                .iter()
                .map(|account| (account.id(), map.insert(account.id(), account.clone())))
                .collect()
        };

        if let Err(e) = self.write_snapshot() {
            // Keep memory in line with what is on disk
            let mut map = self.accounts.write();
            for (id, prev) in previous.into_iter().rev() {
                match prev {
                    Some(prev) => map.insert(id, prev),
                    None => map.remove(&id),
                };
            }
            return Err(e);
        }
        Ok(())
    }

    fn ids(&self) -> Result<Vec<AccountId>, StoreError> {
        Ok(self.accounts.read().keys().copied().collect())
    }

    fn len(&self) -> Result<usize, StoreError> {
        Ok(self.accounts.read().len())
    }
}
