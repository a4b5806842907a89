//! # hashdrip Economics - Mining, Referral & Withdrawal Rules
//!
//! The money-moving core of the bot. Everything that touches a balance lives
//! here and goes through the [`AccountStore`]'s per-account serialization.
//!
//! ## Components
//!
//! - **Accrual Engine**: `Idle`/`Mining` session transitions, base and ad-boost credits
//! - **Referral Ledger**: write-once referral links, 10% bonus on referee credits
//! - **Withdrawal Validator**: fee/payout split, balance check, debit, operator notice
//!
//! ## Default Parameters
//!
//! | Parameter          | Value                        |
//! |--------------------|------------------------------|
//! | Session length     | 8 hours                      |
//! | Base credit        | 0.00000000001 BTC            |
//! | Ad credit          | base / 2                     |
//! | Ad cooldown        | 60 seconds                   |
//! | Referral bonus     | 10% of every referee credit  |
//! | Minimum withdrawal | $0.50                        |
//! | Fee under $20      | 10%                          |
//! | Fee from $20       | $1 + 10%                     |
//! | Exchange rate      | $98,000 per BTC              |

pub mod accrual;
pub mod config;
pub mod referral;
pub mod withdrawal;

// Re-exports
pub use accrual::{AccrualEngine, AdReceipt, MiningStatus, StartOutcome};
pub use config::EconomicsConfig;
pub use referral::{LinkOutcome, ReferralLedger, ReferralStats};
pub use withdrawal::{
    FeeQuote, FeeSchedule, LogNotifier, PayoutNotifier, PayoutRequest, WithdrawalReceipt,
    WithdrawalValidator,
};

use drip_storage::AccountStore;
use std::sync::Arc;

/// Reward coin constants
pub mod constants {
    use drip_core::{BasisPoints, FiatAmount, RewardAmount};

    /// Reward coin symbol
    pub const SYMBOL: &str = "BTC";

    /// Payout currency sign
    pub const FIAT_SIGN: &str = "$";

    /// Base credit per session start: 10^-11 coin
    pub const BASE_CREDIT: RewardAmount = RewardAmount::from_units(10_000_000);

    /// Ad credit: half the base credit
    pub const AD_CREDIT: RewardAmount = RewardAmount::from_units(5_000_000);

    /// Seconds between two ad credits
    pub const AD_COOLDOWN_SECS: u64 = 60;

    /// Mining session length: 8 hours in seconds
    pub const SESSION_DURATION_SECS: u64 = 8 * 3600;

    /// Referrer share of every referee credit
    pub const REFERRAL_BONUS: BasisPoints = BasisPoints::from_percent(10);

    /// Smallest withdrawable amount: $0.50
    pub const MIN_WITHDRAW: FiatAmount = FiatAmount::from_micros(500_000);

    /// Percentage fee on every withdrawal
    pub const FEE_PERCENT: BasisPoints = BasisPoints::from_percent(10);

    /// Withdrawals at or above this pay the flat fee on top
    pub const FEE_THRESHOLD: FiatAmount = FiatAmount::from_whole(20);

    /// Flat fee for large withdrawals
    pub const FLAT_FEE: FiatAmount = FiatAmount::from_whole(1);

    /// Fiat per whole coin
    pub const FIAT_PER_COIN: FiatAmount = FiatAmount::from_whole(98_000);
}

pub use constants::*;

/// The three engines wired over one shared store
pub struct Economy {
    pub store: Arc<AccountStore>,
    pub accrual: AccrualEngine,
    pub referrals: Arc<ReferralLedger>,
    pub withdrawals: WithdrawalValidator,
    pub config: EconomicsConfig,
}

impl Economy {
    pub fn new(
        store: Arc<AccountStore>,
        notifier: Arc<dyn PayoutNotifier>,
        config: EconomicsConfig,
    ) -> Self {
        let referrals = Arc::new(ReferralLedger::new(store.clone(), config.referral_bonus));
        let accrual = AccrualEngine::new(store.clone(), referrals.clone(), &config);
        let withdrawals = WithdrawalValidator::new(store.clone(), notifier, &config);

        Self {
            store,
            accrual,
            referrals,
            withdrawals,
            config,
        }
    }
}
