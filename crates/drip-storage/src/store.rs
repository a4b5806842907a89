//! Account store
//!
//! Wraps a backend with per-account mutual exclusion. Every read-modify-write
//! on an id runs under that id's lock, so two concurrent commands for the same
//! user cannot both act on a stale record. Different ids never contend.

use crate::memory_db::MemoryBackend;
use crate::AccountBackend;
use dashmap::DashMap;
use drip_core::{Account, AccountId, AccountPatch, Clock, DripError, RewardAmount};
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Get-or-create and atomic update over an [`AccountBackend`]
pub struct AccountStore {
    backend: Arc<dyn AccountBackend>,
    clock: Arc<dyn Clock>,
    locks: DashMap<AccountId, Arc<Mutex<()>>>,
}

impl AccountStore {
    pub fn new(backend: Arc<dyn AccountBackend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            clock,
            locks: DashMap::new(),
        }
    }

    /// Store over a fresh in-memory backend
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), clock)
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    fn lock_for(&self, id: AccountId) -> Arc<Mutex<()>> {
        self.locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load_or_new(&self, id: AccountId) -> Result<(Account, bool), DripError> {
        match self.backend.load(id).map_err(surface)? {
            Some(account) => Ok((account, false)),
            None => Ok((Account::new(id, self.clock.now()), true)),
        }
    }

    /// Existing account, without creating one
    pub fn get(&self, id: AccountId) -> Result<Option<Account>, DripError> {
        self.backend.load(id).map_err(surface)
    }

    /// Return the account, creating it with defaults on first sight
    pub fn get_or_create(&self, id: AccountId) -> Result<Account, DripError> {
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let (account, created) = self.load_or_new(id)?;
        if created {
            self.backend.save(&account).map_err(surface)?;
            debug!("Created account {}", id);
        }
        Ok(account)
    }

    /// Apply a partial field update atomically and return the new record
    pub fn update(&self, id: AccountId, patch: &AccountPatch) -> Result<Account, DripError> {
        self.modify(id, |account| {
            account.apply_patch(patch)?;
            Ok(account.clone())
        })
    }

    /// Read-check-then-write under the account lock.
    ///
    /// `f` works on a copy; the copy is persisted only when `f` returns `Ok`
    /// and actually changed something. A rejected operation leaves the stored
    /// record untouched.
    pub fn modify<T, F>(&self, id: AccountId, f: F) -> Result<T, DripError>
    where
        F: FnOnce(&mut Account) -> Result<T, DripError>,
    {
        let lock = self.lock_for(id);
        let _guard = lock.lock();

        let (current, created) = self.load_or_new(id)?;
        let mut next = current.clone();
        let out = f(&mut next)?;

        if created || next != current {
            self.backend.save(&next).map_err(surface)?;
        }
        Ok(out)
    }

    /// Read-check-then-write on two distinct accounts as one unit.
    ///
    /// Both locks are taken in ascending id order, so two pair operations on
    /// the same accounts cannot deadlock whichever way round they name them.
    /// Changed records are saved in a single backend write: either every change
    /// lands or none does.
    pub fn modify_pair<T, F>(&self, a: AccountId, b: AccountId, f: F) -> Result<T, DripError>
    where
        F: FnOnce(&mut Account, &mut Account) -> Result<T, DripError>,
    {
        if a == b {
            return Err(DripError::Internal(format!(
                "paired update names account {} twice",
                a
            )));
        }

        let (low, high) = if a < b { (a, b) } else { (b, a) };
        let low_lock = self.lock_for(low);
        let high_lock = self.lock_for(high);
        let _low_guard = low_lock.lock();
        let _high_guard = high_lock.lock();

        let (current_a, created_a) = self.load_or_new(a)?;
        let (current_b, created_b) = self.load_or_new(b)?;
        let mut next_a = current_a.clone();
        let mut next_b = current_b.clone();
        let out = f(&mut next_a, &mut next_b)?;

        let mut changed = Vec::with_capacity(2);
        if created_a || next_a != current_a {
            changed.push(next_a);
        }
        if created_b || next_b != current_b {
            changed.push(next_b);
        }
        if !changed.is_empty() {
            self.backend.save_all(&changed).map_err(surface)?;
        }
        Ok(out)
    }

    /// [`modify`](Self::modify) that also hands `f` the account's referrer,
    /// when it has one, locked and saved together with the account.
    pub fn modify_with_referrer<T, F>(&self, id: AccountId, f: F) -> Result<T, DripError>
    where
        F: FnOnce(&mut Account, Option<&mut Account>) -> Result<T, DripError>,
    {
        loop {
            match self.get(id)?.and_then(|account| account.referred_by()) {
                // A referrer is never replaced, so it is still the same one
                // once both locks are held
                Some(referrer) => {
                    return self.modify_pair(id, referrer, |account, referrer| {
                        f(account, Some(referrer))
                    });
                }
                None => {
                    let lock = self.lock_for(id);
                    let _guard = lock.lock();

                    let (current, created) = self.load_or_new(id)?;
                    if current.referred_by().is_some() {
                        // Linked since the lookup
                        continue;
                    }
                    let mut next = current.clone();
                    let out = f(&mut next, None)?;

                    if created || next != current {
                        self.backend.save(&next).map_err(surface)?;
                    }
                    return Ok(out);
                }
            }
        }
    }

    /// Number of stored accounts
    pub fn len(&self) -> Result<usize, DripError> {
        self.backend.len().map_err(surface)
    }

    pub fn is_empty(&self) -> Result<bool, DripError> {
        Ok(self.len()? == 0)
    }

    /// All stored ids, ascending
    pub fn ids(&self) -> Result<Vec<AccountId>, DripError> {
        self.backend.ids().map_err(surface)
    }

    /// Sum of every stored balance
    pub fn total_balance(&self) -> Result<RewardAmount, DripError> {
        let mut total = RewardAmount::ZERO;
        for id in self.ids()? {
            if let Some(account) = self.get(id)? {
                total += account.balance();
            }
        }
        Ok(total)
    }
}

fn surface(e: crate::StoreError) -> DripError {
    warn!("Account storage failure: {}", e);
    e.into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StoreError;
    use drip_core::{FieldChange, ManualClock};
    use std::thread;

    fn store() -> AccountStore {
        AccountStore::in_memory(Arc::new(ManualClock::at_epoch()))
    }

    fn units(n: u128) -> RewardAmount {
        RewardAmount::from_units(n)
    }

    #[test]
    fn test_get_or_create_is_idempotent() {
        let store = store();
        let id = AccountId::new(1);

        let first = store.get_or_create(id).unwrap();
        store
            .update(id, &FieldChange::Credit(units(5)).into())
            .unwrap();
        let second = store.get_or_create(id).unwrap();

        assert_eq!(first.balance(), RewardAmount::ZERO);
        assert_eq!(second.balance(), units(5));
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_rejected_modify_persists_nothing() {
        let store = store();
        let id = AccountId::new(2);
        store.update(id, &FieldChange::Credit(units(3)).into()).unwrap();

        let result: Result<(), DripError> = store.modify(id, |account| {
            account.credit(units(100))?;
            Err(DripError::NoActiveSession)
        });

        assert_eq!(result, Err(DripError::NoActiveSession));
        assert_eq!(store.get(id).unwrap().unwrap().balance(), units(3));
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let store = Arc::new(store());
        let id = AccountId::new(3);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .modify(id, |account| account.credit(units(1)))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(id).unwrap().unwrap().balance(), units(800));
    }

    #[test]
    fn test_total_balance() {
        let store = store();
        store
            .update(AccountId::new(1), &FieldChange::Credit(units(4)).into())
            .unwrap();
        store
            .update(AccountId::new(2), &FieldChange::Credit(units(6)).into())
            .unwrap();
        assert_eq!(store.total_balance().unwrap(), units(10));
    }

    struct BrokenBackend;

    impl AccountBackend for BrokenBackend {
        fn load(&self, _id: AccountId) -> Result<Option<Account>, StoreError> {
            Err(StoreError::Backend("disk unavailable".into()))
        }

        fn save(&self, _account: &Account) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk unavailable".into()))
        }

        fn ids(&self) -> Result<Vec<AccountId>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn test_backend_failure_surfaces_as_storage_failure() {
        let store = AccountStore::new(Arc::new(BrokenBackend), Arc::new(ManualClock::at_epoch()));
        let err = store.get_or_create(AccountId::new(1)).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, DripError::StorageFailure(_)));
    }

    /// Memory backend whose saves fail while they touch a blocked id
    #[derive(Default)]
    struct FailingSaves {
        inner: MemoryBackend,
        blocked: parking_lot::Mutex<Vec<AccountId>>,
    }

    impl FailingSaves {
        fn block(&self, id: AccountId) {
            self.blocked.lock().push(id);
        }

        fn check(&self, accounts: &[Account]) -> Result<(), StoreError> {
            let blocked = self.blocked.lock();
            match accounts.iter().find(|a| blocked.contains(&a.id())) {
                Some(a) => Err(StoreError::Backend(format!("{} is read-only", a.id()))),
                None => Ok(()),
            }
        }
    }

    impl AccountBackend for FailingSaves {
        fn load(&self, id: AccountId) -> Result<Option<Account>, StoreError> {
            self.inner.load(id)
        }

        fn save(&self, account: &Account) -> Result<(), StoreError> {
            self.check(std::slice::from_ref(account))?;
            self.inner.save(account)
        }

        fn save_all(&self, accounts: &[Account]) -> Result<(), StoreError> {
            self.check(accounts)?;
            self.inner.save_all(accounts)
        }

        fn ids(&self) -> Result<Vec<AccountId>, StoreError> {
            self.inner.ids()
        }
    }

    #[test]
    fn test_pair_update_is_all_or_nothing() {
        let backend = Arc::new(FailingSaves::default());
        let store = AccountStore::new(backend.clone(), Arc::new(ManualClock::at_epoch()));
        let (payer, payee) = (AccountId::new(1), AccountId::new(2));
        store.update(payer, &FieldChange::Credit(units(10)).into()).unwrap();

        backend.block(payee);
        let err = store
            .modify_pair(payer, payee, |from, to| {
                from.debit(units(4))?;
                to.credit(units(4))
            })
            .unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.get(payer).unwrap().unwrap().balance(), units(10));
        assert!(store.get(payee).unwrap().is_none());

        backend.blocked.lock().clear();
        store
            .modify_pair(payer, payee, |from, to| {
                from.debit(units(4))?;
                to.credit(units(4))
            })
            .unwrap();
        assert_eq!(store.get(payer).unwrap().unwrap().balance(), units(6));
        assert_eq!(store.get(payee).unwrap().unwrap().balance(), units(4));
    }

    #[test]
    fn test_pair_update_rejects_same_account() {
        let store = store();
        let id = AccountId::new(4);
        let result = store.modify_pair(id, id, |_, _| Ok(()));
        assert!(matches!(result, Err(DripError::Internal(_))));
    }

    #[test]
    fn test_opposite_order_pairs_do_not_deadlock() {
        let store = Arc::new(store());
        let (a, b) = (AccountId::new(5), AccountId::new(6));

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                let (first, second) = if i % 2 == 0 { (a, b) } else { (b, a) };
                thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .modify_pair(first, second, |x, y| {
                                x.credit(units(1))?;
                                y.credit(units(1))
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.get(a).unwrap().unwrap().balance(), units(800));
        assert_eq!(store.get(b).unwrap().unwrap().balance(), units(800));
    }

    #[test]
    fn test_modify_with_referrer_hands_over_the_referrer() {
        let store = store();
        let (referee, referrer) = (AccountId::new(8), AccountId::new(7));

        let seen = store
            .modify_with_referrer(referee, |_, referrer| Ok(referrer.map(|r| r.id())))
            .unwrap();
        assert_eq!(seen, None);

        store
            .update(referee, &FieldChange::ReferredBy(referrer).into())
            .unwrap();
        store
            .modify_with_referrer(referee, |account, referrer| {
                account.credit(units(10))?;
                match referrer {
                    Some(r) => r.credit_referral_bonus(units(1)),
                    None => Err(DripError::Internal("no referrer".into())),
                }
            })
            .unwrap();

        assert_eq!(store.get(referee).unwrap().unwrap().balance(), units(10));
        let referrer = store.get(referrer).unwrap().unwrap();
        assert_eq!(referrer.referral_earnings(), units(1));
    }
}
