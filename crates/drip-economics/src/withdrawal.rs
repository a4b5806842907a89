//! # Withdrawal Validator
//!
//! Turns a `<amount> <address>` request into a fee/payout split, checks the
//! balance, debits it and hands a payout instruction to the operator.
//!
//! ## Fee Schedule
//!
//! | Requested amount | Fee              |
//! |------------------|------------------|
//! | < $20            | 10%              |
//! | >= $20           | $1 + 10%         |
//!
//! The full requested amount is debited; the fee is kept by the system and the
//! operator pays out `amount - fee` by hand.

use crate::config::EconomicsConfig;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use drip_core::{AccountId, BasisPoints, DripError, ExchangeRate, FiatAmount, RewardAmount};
use drip_storage::AccountStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Fee parameters
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    pub percent: BasisPoints,
    pub threshold: FiatAmount,
    pub flat: FiatAmount,
}

impl FeeSchedule {
    pub fn from_config(config: &EconomicsConfig) -> Self {
        Self {
            percent: config.fee_percent,
            threshold: config.fee_threshold,
            flat: config.flat_fee,
        }
    }

    /// Split `amount` into fee and payout
    pub fn quote(&self, amount: FiatAmount) -> FeeQuote {
        let percentage = amount.share(self.percent);
        let fee = if amount < self.threshold {
            percentage
        } else {
            self.flat + percentage
        };

        FeeQuote {
            amount,
            fee,
            payout: amount.saturating_sub(fee),
        }
    }
}

/// Fee/payout split of a requested amount
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeQuote {
    pub amount: FiatAmount,
    pub fee: FiatAmount,
    pub payout: FiatAmount,
}

/// Instruction forwarded to the operator for manual fulfillment
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutRequest {
    pub request_id: Uuid,
    pub account_id: AccountId,
    pub amount: FiatAmount,
    pub fee: FiatAmount,
    pub payout: FiatAmount,
    pub address: String,
    pub requested_at: DateTime<Utc>,
}

impl PayoutRequest {
    /// Plain-text body for operator channels
    pub fn summary(&self) -> String {
        format!(
            "Withdrawal {}\nuser: {}\n{}$ -> {}\nFee: {}, receives: {}",
            self.request_id, self.account_id, self.amount, self.address, self.fee, self.payout
        )
    }
}

/// Successful withdrawal as shown to the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WithdrawalReceipt {
    pub request: PayoutRequest,
    pub debited: RewardAmount,
    pub balance: RewardAmount,
    /// Whether the operator notice went out
    pub notified: bool,
}

/// Delivers payout requests to an operator out-of-band
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PayoutNotifier: Send + Sync {
    async fn notify(&self, request: &PayoutRequest) -> Result<(), DripError>;
}

/// Notifier that only writes the request to the log
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl PayoutNotifier for LogNotifier {
    async fn notify(&self, request: &PayoutRequest) -> Result<(), DripError> {
        info!(
            request_id = %request.request_id,
            account = %request.account_id,
            amount = %request.amount,
            fee = %request.fee,
            payout = %request.payout,
            address = %request.address,
            "Payout requested"
        );
        Ok(())
    }
}

/// Withdrawal checks, debit and operator hand-off
pub struct WithdrawalValidator {
    store: Arc<AccountStore>,
    notifier: Arc<dyn PayoutNotifier>,
    exchange_rate: ExchangeRate,
    min_withdraw: FiatAmount,
    fees: FeeSchedule,
}

impl WithdrawalValidator {
    pub fn new(
        store: Arc<AccountStore>,
        notifier: Arc<dyn PayoutNotifier>,
        config: &EconomicsConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            exchange_rate: config.exchange_rate,
            min_withdraw: config.min_withdraw,
            fees: FeeSchedule::from_config(config),
        }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    pub fn min_withdraw(&self) -> FiatAmount {
        self.min_withdraw
    }

    /// Parse and range-check the amount, then split it. No state is touched.
    pub fn quote(&self, amount_text: &str) -> Result<FeeQuote, DripError> {
        let amount: FiatAmount = amount_text.parse()?;
        if amount.is_zero() {
            return Err(DripError::InvalidAmount(format!(
                "amount must be positive: {}",
                amount_text.trim()
            )));
        }
        if amount < self.min_withdraw {
            return Err(DripError::BelowMinimum {
                minimum: self.min_withdraw,
            });
        }
        Ok(self.fees.quote(amount))
    }

    /// Validate, debit the full amount, then notify the operator.
    ///
    /// The debit is committed before notification; a notifier failure is
    /// logged and reported in the receipt, never rolled back.
    pub async fn withdraw(
        &self,
        id: AccountId,
        amount_text: &str,
        address: &str,
    ) -> Result<WithdrawalReceipt, DripError> {
        let receipt = self.debit_for_payout(id, amount_text, address)?;
        Ok(self.forward_payout(receipt).await)
    }

    /// Storage half of [`withdraw`](Self::withdraw): validate and commit the
    /// debit. The returned receipt is not yet `notified`.
    ///
    /// Blocks on the account lock and the backend write.
    pub fn debit_for_payout(
        &self,
        id: AccountId,
        amount_text: &str,
        address: &str,
    ) -> Result<WithdrawalReceipt, DripError> {
        let quote = self.quote(amount_text)?;
        let address = address.trim();
        if address.is_empty() {
            return Err(DripError::InvalidAddress);
        }

        let rate = self.exchange_rate;
        let clock = self.store.clock().clone();
        let (debited, balance, requested_at) = self.store.modify(id, |account| {
            let available = rate.to_fiat(account.balance());
            if available < quote.amount {
                return Err(DripError::InsufficientBalance {
                    requested: quote.amount,
                    available,
                });
            }

            let debit = rate.to_reward(quote.amount);
            account.debit(debit)?;
            Ok((debit, account.balance(), clock.now()))
        })?;

        let request = PayoutRequest {
            request_id: Uuid::new_v4(),
            account_id: id,
            amount: quote.amount,
            fee: quote.fee,
            payout: quote.payout,
            address: address.to_string(),
            requested_at,
        };
        info!(
            "Withdrawal {} by {}: {} (fee {}, payout {})",
            request.request_id, id, quote.amount, quote.fee, quote.payout
        );

        Ok(WithdrawalReceipt {
            request,
            debited,
            balance,
            notified: false,
        })
    }

    /// Hand a committed withdrawal to the operator notifier
    pub async fn forward_payout(&self, mut receipt: WithdrawalReceipt) -> WithdrawalReceipt {
        receipt.notified = match self.notifier.notify(&receipt.request).await {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    "Payout request {} not delivered, debit kept: {}",
                    receipt.request.request_id, e
                );
                false
            }
        };
        receipt
    }
}
