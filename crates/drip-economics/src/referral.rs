//! # Referral Ledger
//!
//! Referrer/referee links and the referral bonus.
//!
//! A link is written once: the referee's `referred_by` is set only while it is
//! empty, and the referee is appended to the referrer's `referrals` list. Every
//! credit the referee earns from mining pays the referrer a fixed share on top
//! (the referee's own balance is not reduced). The bonus is one level deep:
//! the referrer's own referrer gets nothing from it.

use drip_core::{Account, AccountId, BasisPoints, DripError, RewardAmount};
use drip_storage::AccountStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Result of a link attempt
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum LinkOutcome {
    /// Link written
    Linked,
    /// The account already had a referrer; nothing changed
    AlreadyLinked,
    /// Referrer and referee are the same account; nothing changed
    SelfReferral,
}

/// Referral figures for `/referstats`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralStats {
    pub referrals: usize,
    pub earnings: RewardAmount,
}

/// Referral link and bonus bookkeeping
pub struct ReferralLedger {
    store: Arc<AccountStore>,
    bonus: BasisPoints,
}

impl ReferralLedger {
    pub fn new(store: Arc<AccountStore>, bonus: BasisPoints) -> Self {
        Self { store, bonus }
    }

    pub fn bonus(&self) -> BasisPoints {
        self.bonus
    }

    /// Link `new_id` to `referrer_id`. Idempotent; never overwrites a link.
    ///
    /// Both sides of the link are written together. Repeating a link to the
    /// same referrer also re-adds the referee to the referrer's list, so a
    /// retry completes a link whose referrer side is missing.
    pub fn link_referral(
        &self,
        new_id: AccountId,
        referrer_id: AccountId,
    ) -> Result<LinkOutcome, DripError> {
        if new_id == referrer_id {
            return Ok(LinkOutcome::SelfReferral);
        }

        // Do not create the named referrer for a link that cannot happen
        let existing = self.store.get(new_id)?.and_then(|a| a.referred_by());
        if existing.is_some_and(|r| r != referrer_id) {
            debug!("Account {} already has a referrer", new_id);
            return Ok(LinkOutcome::AlreadyLinked);
        }

        let outcome = self
            .store
            .modify_pair(new_id, referrer_id, |account, referrer| {
                match account.referred_by() {
                    None => {
                        account.set_referrer(referrer_id);
                        referrer.add_referral(new_id);
                        Ok(LinkOutcome::Linked)
                    }
                    Some(r) if r == referrer_id => {
                        if referrer.add_referral(new_id) {
                            warn!("Repaired referral list of {} for {}", referrer_id, new_id);
                        }
                        Ok(LinkOutcome::AlreadyLinked)
                    }
                    Some(_) => Ok(LinkOutcome::AlreadyLinked),
                }
            })?;

        match outcome {
            LinkOutcome::Linked => info!("Referral linked: {} referred by {}", new_id, referrer_id),
            _ => debug!("Account {} already has a referrer", new_id),
        }
        Ok(outcome)
    }

    /// Credit `referrer` its share of a referee's `credited` amount.
    ///
    /// Returns the bonus, or `None` when the share rounds to zero.
    pub fn credit_bonus(
        &self,
        referrer: &mut Account,
        credited: RewardAmount,
    ) -> Result<Option<RewardAmount>, DripError> {
        let bonus = credited.share(self.bonus);
        if bonus.is_zero() {
            return Ok(None);
        }
        referrer.credit_referral_bonus(bonus)?;
        Ok(Some(bonus))
    }

    /// Pay the referrer of `account_id` its share of `amount`.
    ///
    /// Returns the referrer and the bonus paid, if any.
    pub fn on_earn(
        &self,
        account_id: AccountId,
        amount: RewardAmount,
    ) -> Result<Option<(AccountId, RewardAmount)>, DripError> {
        let referrer = match self.store.get(account_id)?.and_then(|a| a.referred_by()) {
            Some(referrer) => referrer,
            None => return Ok(None),
        };

        let paid = self
            .store
            .modify(referrer, |account| self.credit_bonus(account, amount))?;

        Ok(paid.map(|bonus| {
            debug!(
                "Referral bonus {:?} to {} from {}'s credit of {:?}",
                bonus, referrer, account_id, amount
            );
            (referrer, bonus)
        }))
    }

    pub fn stats(&self, id: AccountId) -> Result<ReferralStats, DripError> {
        let account = self.store.get_or_create(id)?;
        Ok(ReferralStats {
            referrals: account.referrals().len(),
            earnings: account.referral_earnings(),
        })
    }

    /// Deep link that opens the bot with this account as referrer
    pub fn invite_link(bot_username: &str, id: AccountId) -> String {
        format!("https://t.me/{}?start={}", bot_username, id)
    }
}
