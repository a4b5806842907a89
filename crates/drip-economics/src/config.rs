//! Economic parameters

use crate::constants::*;
use chrono::Duration;
use drip_core::{BasisPoints, ExchangeRate, FiatAmount, RewardAmount};
use serde::{Deserialize, Serialize};

/// Tunable reward and withdrawal parameters
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EconomicsConfig {
    /// Fiat per whole reward coin
    #[serde(default = "default_exchange_rate")]
    pub exchange_rate: ExchangeRate,

    /// Credit for starting a session
    #[serde(default = "default_base_credit")]
    pub base_credit: RewardAmount,

    /// Credit per ad boost
    #[serde(default = "default_ad_credit")]
    pub ad_credit: RewardAmount,

    /// Seconds between ad credits
    #[serde(default = "default_ad_cooldown")]
    pub ad_cooldown_secs: u64,

    /// Session length in seconds
    #[serde(default = "default_session_duration")]
    pub session_duration_secs: u64,

    /// Referrer share of referee credits
    #[serde(default = "default_referral_bonus")]
    pub referral_bonus: BasisPoints,

    /// Smallest accepted withdrawal
    #[serde(default = "default_min_withdraw")]
    pub min_withdraw: FiatAmount,

    /// Withdrawal fee percentage
    #[serde(default = "default_fee_percent")]
    pub fee_percent: BasisPoints,

    /// Amount from which the flat fee applies
    #[serde(default = "default_fee_threshold")]
    pub fee_threshold: FiatAmount,

    /// Flat fee above the threshold
    #[serde(default = "default_flat_fee")]
    pub flat_fee: FiatAmount,
}

fn default_exchange_rate() -> ExchangeRate {
    ExchangeRate::new(FIAT_PER_COIN).expect("FIAT_PER_COIN is non-zero")
}

fn default_base_credit() -> RewardAmount {
    BASE_CREDIT
}

fn default_ad_credit() -> RewardAmount {
    AD_CREDIT
}

fn default_ad_cooldown() -> u64 {
    AD_COOLDOWN_SECS
}

fn default_session_duration() -> u64 {
    SESSION_DURATION_SECS
}

fn default_referral_bonus() -> BasisPoints {
    REFERRAL_BONUS
}

fn default_min_withdraw() -> FiatAmount {
    MIN_WITHDRAW
}

fn default_fee_percent() -> BasisPoints {
    FEE_PERCENT
}

fn default_fee_threshold() -> FiatAmount {
    FEE_THRESHOLD
}

fn default_flat_fee() -> FiatAmount {
    FLAT_FEE
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            exchange_rate: default_exchange_rate(),
            base_credit: default_base_credit(),
            ad_credit: default_ad_credit(),
            ad_cooldown_secs: default_ad_cooldown(),
            session_duration_secs: default_session_duration(),
            referral_bonus: default_referral_bonus(),
            min_withdraw: default_min_withdraw(),
            fee_percent: default_fee_percent(),
            fee_threshold: default_fee_threshold(),
            flat_fee: default_flat_fee(),
        }
    }
}

impl EconomicsConfig {
    pub fn ad_cooldown(&self) -> Duration {
        Duration::seconds(self.ad_cooldown_secs as i64)
    }

    pub fn session_duration(&self) -> Duration {
        Duration::seconds(self.session_duration_secs as i64)
    }
}
