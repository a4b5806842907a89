//! # Accrual Engine
//!
//! Mining session transitions and credit grants.
//!
//! ```text
//!            start (+BASE, session_end = now + 8h)
//!   Idle ─────────────────────────────────────────► Mining
//!    ▲                                                │  start: remaining time only
//!    │          now >= session_end (implicit)         │  ad: +AD if cooldown elapsed
//!    └────────────────────────────────────────────────┘
//! ```
//!
//! State is never stored; it is derived from `session_end` on every request,
//! inside the account lock, together with the cooldown check and the write.

use crate::config::EconomicsConfig;
use crate::referral::ReferralLedger;
use chrono::{DateTime, Duration, Utc};
use drip_core::{Account, AccountId, DripError, MiningState, RewardAmount};
use drip_storage::AccountStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a start request
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StartOutcome {
    /// New session opened and base credit granted
    Started {
        credited: RewardAmount,
        ends_at: DateTime<Utc>,
    },
    /// Session already running; nothing granted, nothing changed
    AlreadyMining {
        ends_at: DateTime<Utc>,
        remaining: Duration,
    },
}

/// Successful ad boost
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AdReceipt {
    pub credited: RewardAmount,
    pub balance: RewardAmount,
}

/// Read-only session view
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MiningStatus {
    pub state: MiningState,
    pub balance: RewardAmount,
    /// Wait before the next ad credit, when one applies
    pub ad_cooldown: Option<Duration>,
}

/// Session and credit state machine
pub struct AccrualEngine {
    store: Arc<AccountStore>,
    referrals: Arc<ReferralLedger>,
    base_credit: RewardAmount,
    ad_credit: RewardAmount,
    ad_cooldown: Duration,
    session_duration: Duration,
}

impl AccrualEngine {
    pub fn new(
        store: Arc<AccountStore>,
        referrals: Arc<ReferralLedger>,
        config: &EconomicsConfig,
    ) -> Self {
        Self {
            store,
            referrals,
            base_credit: config.base_credit,
            ad_credit: config.ad_credit,
            ad_cooldown: config.ad_cooldown(),
            session_duration: config.session_duration(),
        }
    }

    /// Open a session from `Idle`, or report the running one
    pub fn start_mining(&self, id: AccountId) -> Result<StartOutcome, DripError> {
        let clock = self.store.clock().clone();
        let base_credit = self.base_credit;
        let session_duration = self.session_duration;

        let (outcome, bonus) = self.store.modify_with_referrer(id, |account, referrer| {
            let now = clock.now();
            match account.mining_state(now) {
                MiningState::Mining { ends_at, remaining } => {
                    Ok((StartOutcome::AlreadyMining { ends_at, remaining }, None))
                }
                MiningState::Idle => {
                    let ends_at = account.start_session(now, session_duration);
                    account.credit(base_credit)?;
                    let bonus = self.pay_referrer(referrer, base_credit)?;
                    Ok((
                        StartOutcome::Started {
                            credited: base_credit,
                            ends_at,
                        },
                        bonus,
                    ))
                }
            }
        })?;

        if let StartOutcome::Started { ends_at, .. } = outcome {
            info!("Mining started for {} until {}", id, ends_at);
            log_bonus(id, bonus);
        }
        Ok(outcome)
    }

    /// Grant the ad credit while mining and outside the cooldown
    pub fn watch_ad(&self, id: AccountId) -> Result<AdReceipt, DripError> {
        let clock = self.store.clock().clone();
        let ad_credit = self.ad_credit;
        let cooldown = self.ad_cooldown;

        let (receipt, bonus) = self.store.modify_with_referrer(id, |account, referrer| {
            let now = clock.now();
            if !account.mining_state(now).is_mining() {
                return Err(DripError::NoActiveSession);
            }
            if let Some(wait) = account.ad_cooldown_remaining(now, cooldown) {
                return Err(DripError::CooldownActive {
                    retry_in_secs: ceil_secs(wait),
                });
            }

            account.credit(ad_credit)?;
            account.record_ad(now);
            let bonus = self.pay_referrer(referrer, ad_credit)?;
            Ok((
                AdReceipt {
                    credited: ad_credit,
                    balance: account.balance(),
                },
                bonus,
            ))
        })?;

        info!("Ad boost credited to {}", id);
        log_bonus(id, bonus);
        Ok(receipt)
    }

    pub fn status(&self, id: AccountId) -> Result<MiningStatus, DripError> {
        let account = self.store.get_or_create(id)?;
        let now = self.store.clock().now();
        let state = account.mining_state(now);

        Ok(MiningStatus {
            state,
            balance: account.balance(),
            ad_cooldown: if state.is_mining() {
                account.ad_cooldown_remaining(now, self.ad_cooldown)
            } else {
                None
            },
        })
    }

    /// Referrer share of a credit, saved together with the credit itself
    fn pay_referrer(
        &self,
        referrer: Option<&mut Account>,
        credited: RewardAmount,
    ) -> Result<Option<(AccountId, RewardAmount)>, DripError> {
        match referrer {
            Some(referrer) => Ok(self
                .referrals
                .credit_bonus(referrer, credited)?
                .map(|bonus| (referrer.id(), bonus))),
            None => Ok(None),
        }
    }
}

fn log_bonus(id: AccountId, bonus: Option<(AccountId, RewardAmount)>) {
    if let Some((referrer, bonus)) = bonus {
        debug!("Referral bonus {:?} to {} from credit to {}", bonus, referrer, id);
    }
}

fn ceil_secs(d: Duration) -> u64 {
    let millis = d.num_milliseconds().max(0) as u64;
    millis.div_ceil(1000)
}
