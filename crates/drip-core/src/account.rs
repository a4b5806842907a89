//! Account record and its invariant-preserving mutations
//!
//! An [`Account`] is created lazily on first interaction and never deleted.
//! Fields are private: every mutation goes through a method that keeps the
//! ledger invariants (non-negative balance, write-once referral link,
//! duplicate-free referral list).

use crate::error::{DripError, Result};
use crate::types::{AccountId, RewardAmount};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Mining state, derived from `session_end` at read time
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MiningState {
    /// No session, or the last one has expired
    Idle,
    /// Session running until `ends_at`
    Mining {
        ends_at: DateTime<Utc>,
        remaining: Duration,
    },
}

impl MiningState {
    pub fn is_mining(&self) -> bool {
        matches!(self, Self::Mining { .. })
    }
}

/// Per-user ledger record
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    id: AccountId,
    balance: RewardAmount,
    #[serde(default)]
    referred_by: Option<AccountId>,
    #[serde(default)]
    referrals: Vec<AccountId>,
    #[serde(default)]
    referral_earnings: RewardAmount,
    #[serde(default)]
    session_end: Option<DateTime<Utc>>,
    #[serde(default)]
    last_ad_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl Account {
    /// Fresh account: zero balance, no session, no referral link
    pub fn new(id: AccountId, now: DateTime<Utc>) -> Self {
        Self {
            id,
            balance: RewardAmount::ZERO,
            referred_by: None,
            referrals: Vec::new(),
            referral_earnings: RewardAmount::ZERO,
            session_end: None,
            last_ad_at: None,
            created_at: now,
        }
    }

    pub fn id(&self) -> AccountId {
        self.id
    }

    pub fn balance(&self) -> RewardAmount {
        self.balance
    }

    pub fn referred_by(&self) -> Option<AccountId> {
        self.referred_by
    }

    pub fn referrals(&self) -> &[AccountId] {
        &self.referrals
    }

    pub fn referral_earnings(&self) -> RewardAmount {
        self.referral_earnings
    }

    pub fn session_end(&self) -> Option<DateTime<Utc>> {
        self.session_end
    }

    pub fn last_ad_at(&self) -> Option<DateTime<Utc>> {
        self.last_ad_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Mining while `now < session_end`
    pub fn mining_state(&self, now: DateTime<Utc>) -> MiningState {
        match self.session_end {
            Some(ends_at) if now < ends_at => MiningState::Mining {
                ends_at,
                remaining: ends_at - now,
            },
            _ => MiningState::Idle,
        }
    }

    /// Time left before another ad credit is allowed, if any
    pub fn ad_cooldown_remaining(&self, now: DateTime<Utc>, cooldown: Duration) -> Option<Duration> {
        let last = self.last_ad_at?;
        let elapsed = now - last;
        if elapsed < cooldown {
            Some(cooldown - elapsed)
        } else {
            None
        }
    }

    /// Begin a new session ending `duration` from `now`
    pub fn start_session(&mut self, now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
        let ends_at = now + duration;
        self.session_end = Some(ends_at);
        ends_at
    }

    pub fn record_ad(&mut self, now: DateTime<Utc>) {
        self.last_ad_at = Some(now);
    }

    pub fn credit(&mut self, amount: RewardAmount) -> Result<()> {
        self.balance = self
            .balance
            .checked_add(amount)
            .ok_or_else(|| DripError::Internal(format!("balance overflow on {}", self.id)))?;
        Ok(())
    }

    /// Debit, refusing anything that would take the balance below zero
    pub fn debit(&mut self, amount: RewardAmount) -> Result<()> {
        self.balance = self
            .balance
            .checked_sub(amount)
            .ok_or(DripError::BalanceUnderflow {
                requested: amount,
                available: self.balance,
            })?;
        Ok(())
    }

    /// Referral bonus lands in both the balance and the earnings counter
    pub fn credit_referral_bonus(&mut self, amount: RewardAmount) -> Result<()> {
        self.credit(amount)?;
        self.referral_earnings += amount;
        Ok(())
    }

    /// Set the referrer once. Returns false when already linked or self-referral.
    pub fn set_referrer(&mut self, referrer: AccountId) -> bool {
        if referrer == self.id || self.referred_by.is_some() {
            return false;
        }
        self.referred_by = Some(referrer);
        true
    }

    /// Append a referee. Returns false for duplicates and the account itself.
    pub fn add_referral(&mut self, referee: AccountId) -> bool {
        if referee == self.id || self.referrals.contains(&referee) {
            return false;
        }
        self.referrals.push(referee);
        true
    }

    /// Apply a single field change
    pub fn apply(&mut self, change: &FieldChange) -> Result<()> {
        match *change {
            FieldChange::Credit(amount) => self.credit(amount),
            FieldChange::Debit(amount) => self.debit(amount),
            FieldChange::ReferralBonus(amount) => self.credit_referral_bonus(amount),
            FieldChange::ReferredBy(referrer) => {
                self.set_referrer(referrer);
                Ok(())
            }
            FieldChange::AppendReferral(referee) => {
                self.add_referral(referee);
                Ok(())
            }
            FieldChange::SessionEnd(ends_at) => {
                self.session_end = Some(ends_at);
                Ok(())
            }
            FieldChange::LastAdAt(at) => {
                self.record_ad(at);
                Ok(())
            }
        }
    }

    /// Apply every change or none of them
    pub fn apply_patch(&mut self, patch: &AccountPatch) -> Result<()> {
        let mut next = self.clone();
        for change in patch.changes() {
            next.apply(change)?;
        }
        *self = next;
        Ok(())
    }
}

/// One partial update to an account
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldChange {
    Credit(RewardAmount),
    Debit(RewardAmount),
    ReferralBonus(RewardAmount),
    /// Ignored when a referrer is already set
    ReferredBy(AccountId),
    /// Ignored for duplicates
    AppendReferral(AccountId),
    SessionEnd(DateTime<Utc>),
    LastAdAt(DateTime<Utc>),
}

/// Ordered set of field changes applied atomically
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountPatch {
    changes: Vec<FieldChange>,
}

impl AccountPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, change: FieldChange) -> Self {
        self.changes.push(change);
        self
    }

    pub fn push(&mut self, change: FieldChange) {
        self.changes.push(change);
    }

    pub fn changes(&self) -> &[FieldChange] {
        &self.changes
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

impl From<FieldChange> for AccountPatch {
    fn from(change: FieldChange) -> Self {
        Self::new().with(change)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t0() -> DateTime<Utc> {
        DateTime::<Utc>::default()
    }

    fn units(n: u128) -> RewardAmount {
        RewardAmount::from_units(n)
    }

    #[test]
    fn test_new_account_defaults() {
        let account = Account::new(AccountId::new(7), t0());
        assert_eq!(account.balance(), RewardAmount::ZERO);
        assert_eq!(account.referred_by(), None);
        assert!(account.referrals().is_empty());
        assert_eq!(account.mining_state(t0()), MiningState::Idle);
    }

    #[test]
    fn test_mining_state_derived_from_session_end() {
        let mut account = Account::new(AccountId::new(1), t0());
        let ends = account.start_session(t0(), Duration::hours(8));

        let state = account.mining_state(t0() + Duration::hours(1));
        assert_eq!(
            state,
            MiningState::Mining {
                ends_at: ends,
                remaining: Duration::hours(7)
            }
        );
        // Boundary: now == session_end is idle
        assert_eq!(account.mining_state(ends), MiningState::Idle);
    }

    #[test]
    fn test_debit_never_underflows() {
        let mut account = Account::new(AccountId::new(1), t0());
        account.credit(units(10)).unwrap();

        let err = account.debit(units(11)).unwrap_err();
        assert!(matches!(err, DripError::BalanceUnderflow { .. }));
        assert_eq!(account.balance(), units(10));

        account.debit(units(10)).unwrap();
        assert_eq!(account.balance(), RewardAmount::ZERO);
    }

    #[test]
    fn test_referrer_write_once() {
        let mut account = Account::new(AccountId::new(1), t0());
        assert!(!account.set_referrer(AccountId::new(1)));
        assert!(account.set_referrer(AccountId::new(2)));
        assert!(!account.set_referrer(AccountId::new(3)));
        assert_eq!(account.referred_by(), Some(AccountId::new(2)));
    }

    #[test]
    fn test_referrals_deduplicated() {
        let mut account = Account::new(AccountId::new(1), t0());
        assert!(account.add_referral(AccountId::new(2)));
        assert!(!account.add_referral(AccountId::new(2)));
        assert!(!account.add_referral(AccountId::new(1)));
        assert_eq!(account.referrals(), &[AccountId::new(2)]);
    }

    #[test]
    fn test_ad_cooldown() {
        let mut account = Account::new(AccountId::new(1), t0());
        let cooldown = Duration::seconds(60);
        assert_eq!(account.ad_cooldown_remaining(t0(), cooldown), None);

        account.record_ad(t0());
        assert_eq!(
            account.ad_cooldown_remaining(t0() + Duration::seconds(20), cooldown),
            Some(Duration::seconds(40))
        );
        assert_eq!(
            account.ad_cooldown_remaining(t0() + Duration::seconds(60), cooldown),
            None
        );
    }

    #[test]
    fn test_patch_is_all_or_nothing() {
        let mut account = Account::new(AccountId::new(1), t0());
        let patch = AccountPatch::new()
            .with(FieldChange::Credit(units(5)))
            .with(FieldChange::Debit(units(50)));

        assert!(account.apply_patch(&patch).is_err());
        assert_eq!(account.balance(), RewardAmount::ZERO);

        let patch = AccountPatch::new()
            .with(FieldChange::Credit(units(5)))
            .with(FieldChange::ReferralBonus(units(2)));
        account.apply_patch(&patch).unwrap();
        assert_eq!(account.balance(), units(7));
        assert_eq!(account.referral_earnings(), units(2));
    }

    #[test]
    fn test_serde_roundtrip_keeps_fields() {
        let mut account = Account::new(AccountId::new(42), t0());
        account.credit(units(15_000_000)).unwrap();
        account.set_referrer(AccountId::new(9));
        account.start_session(t0(), Duration::hours(8));

        let json = serde_json::to_string(&account).unwrap();
        let back: Account = serde_json::from_str(&json).unwrap();
        assert_eq!(back, account);
    }
}
