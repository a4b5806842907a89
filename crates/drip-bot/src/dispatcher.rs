//! Command dispatch and reply rendering
//!
//! Each message is parsed into a [`Command`], executed against the
//! [`Economy`] and rendered into a single reply. Failures stay inside the
//! request: rejections get a specific explanation, transient storage errors
//! a "try again".

use crate::channels::{IncomingMessage, Reply};
use crate::commands::Command;
use chrono::Duration;
use drip_core::{AccountId, DripError, FiatAmount, MiningState, RewardAmount};
use drip_economics::{
    Economy, LinkOutcome, ReferralLedger, StartOutcome, WithdrawalReceipt, FIAT_SIGN, SYMBOL,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct Dispatcher {
    economy: Arc<Economy>,
    bot_username: String,
}

impl Dispatcher {
    pub fn new(economy: Arc<Economy>, bot_username: impl Into<String>) -> Self {
        Self {
            economy,
            bot_username: bot_username.into(),
        }
    }

    pub fn economy(&self) -> &Arc<Economy> {
        &self.economy
    }

    /// Handle one message; `None` means no reply is due
    pub async fn handle(&self, message: &IncomingMessage) -> Option<Reply> {
        let id = message.account_id;
        let command = Command::parse(&message.text)?;
        debug!("Dispatching /{} for {}", command.name(), id);

        let text = match self.execute(id, command).await {
            Ok(text) => text,
            Err(e) => {
                if e.is_transient() {
                    warn!("Command from {} failed: {}", id, e);
                } else {
                    debug!("Command from {} rejected: {}", id, e);
                }
                render_error(&e)
            }
        };
        Some(Reply::new(id, text))
    }

    async fn execute(&self, id: AccountId, command: Command) -> Result<String, DripError> {
        match command {
            Command::Start { referrer } => {
                let outcome = self
                    .blocking(move |economy| {
                        economy.store.get_or_create(id)?;
                        referrer
                            .map(|referrer| economy.referrals.link_referral(id, referrer))
                            .transpose()
                    })
                    .await?;

                let mut text = self.menu();
                if let (Some(LinkOutcome::Linked), Some(referrer)) = (outcome, referrer) {
                    text.push_str(&format!("\n\nYou joined with an invite from {}.", referrer));
                }
                Ok(text)
            }
            Command::Help => Ok(self.menu()),
            Command::Mine => {
                let outcome = self
                    .blocking(move |economy| economy.accrual.start_mining(id))
                    .await?;
                Ok(render_start(outcome, self.economy.config.ad_cooldown_secs))
            }
            Command::Ad => {
                let receipt = self
                    .blocking(move |economy| economy.accrual.watch_ad(id))
                    .await?;
                Ok(format!(
                    "Ad boost: +{} {}\nBalance: {} {}",
                    receipt.credited, SYMBOL, receipt.balance, SYMBOL
                ))
            }
            Command::Balance => {
                let status = self
                    .blocking(move |economy| economy.accrual.status(id))
                    .await?;
                let session = match status.state {
                    MiningState::Mining { remaining, .. } => {
                        format!("Mining, {} left", format_remaining(remaining))
                    }
                    MiningState::Idle => "Not mining. Send /mine to start.".to_string(),
                };
                Ok(format!(
                    "Balance: {} {} (~{}{})\n{}",
                    status.balance,
                    SYMBOL,
                    FIAT_SIGN,
                    self.approx_fiat(status.balance),
                    session
                ))
            }
            Command::Referral => {
                let bonus = self.economy.referrals.bonus();
                Ok(format!(
                    "Invite friends and earn {}% of everything they mine.\nYour link: {}",
                    bonus.as_percent(),
                    ReferralLedger::invite_link(&self.bot_username, id)
                ))
            }
            Command::ReferStats => {
                let stats = self
                    .blocking(move |economy| economy.referrals.stats(id))
                    .await?;
                Ok(format!(
                    "Referrals: {}\nEarned from referrals: {} {}",
                    stats.referrals, stats.earnings, SYMBOL
                ))
            }
            Command::WithdrawHelp => Ok(self.withdraw_help()),
            Command::Withdraw { amount, address } => {
                let debited = self
                    .blocking(move |economy| {
                        economy.withdrawals.debit_for_payout(id, &amount, &address)
                    })
                    .await?;
                let receipt = self.economy.withdrawals.forward_payout(debited).await;
                Ok(render_withdrawal(&receipt))
            }
            Command::Unknown(name) => {
                info!("Unknown command /{} from {}", name, id);
                Ok(format!("Unknown command /{}. Send /help for the list.", name))
            }
        }
    }

    /// Run synchronous ledger work off the async workers
    async fn blocking<T, F>(&self, f: F) -> Result<T, DripError>
    where
        F: FnOnce(&Economy) -> Result<T, DripError> + Send + 'static,
        T: Send + 'static,
    {
        let economy = self.economy.clone();
        tokio::task::spawn_blocking(move || f(&economy))
            .await
            .map_err(|e| DripError::Internal(format!("command task failed: {}", e)))?
    }

    fn approx_fiat(&self, balance: RewardAmount) -> String {
        let fiat = self.economy.config.exchange_rate.to_fiat(balance);
        format_approx(fiat)
    }

    fn menu(&self) -> String {
        let config = &self.economy.config;
        format!(
            "Welcome to hashdrip!\n\n\
             /mine - start an {}h mining session\n\
             /ad - watch an ad for a boost (every {}s while mining)\n\
             /balance - your balance\n\
             /referral - invite friends, earn {}% of their mining\n\
             /referstats - your referral stats\n\
             /withdraw - cash out (min {}{})",
            config.session_duration_secs / 3600,
            config.ad_cooldown_secs,
            config.referral_bonus.as_percent(),
            FIAT_SIGN,
            config.min_withdraw,
        )
    }

    fn withdraw_help(&self) -> String {
        let fees = self.economy.withdrawals.fees();
        format!(
            "Send the amount and your address in one message:\n\
             <amount> <address>\n\
             e.g. 0.75 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa\n\n\
             Minimum: {s}{min}\n\
             Fee: {pct}% below {s}{threshold}, {s}{flat} + {pct}% from {s}{threshold}",
            s = FIAT_SIGN,
            min = self.economy.withdrawals.min_withdraw(),
            pct = fees.percent.as_percent(),
            threshold = fees.threshold,
            flat = fees.flat,
        )
    }
}

fn render_start(outcome: StartOutcome, ad_cooldown_secs: u64) -> String {
    match outcome {
        StartOutcome::Started { credited, .. } => format!(
            "Mining started! +{} {}\nSend /ad every {}s to boost your earnings.",
            credited, SYMBOL, ad_cooldown_secs
        ),
        StartOutcome::AlreadyMining { remaining, .. } => format!(
            "Already mining. Time left: {}",
            format_remaining(remaining)
        ),
    }
}

fn render_withdrawal(receipt: &WithdrawalReceipt) -> String {
    let request = &receipt.request;
    let mut text = format!(
        "Withdrawal request accepted.\n\
         Amount: {s}{}\nFee: {s}{}\nYou receive: {s}{}\nTo: {}\n\
         Payouts are processed manually.",
        request.amount,
        request.fee,
        request.payout,
        request.address,
        s = FIAT_SIGN,
    );
    if !receipt.notified {
        text.push_str(" Your request is queued and will be picked up shortly.");
    }
    text
}

/// User-facing text for a failed command
pub fn render_error(error: &DripError) -> String {
    match error {
        DripError::NoActiveSession => "No active mining session. Send /mine first.".to_string(),
        DripError::CooldownActive { retry_in_secs } => {
            format!("Please wait {}s before the next ad.", retry_in_secs)
        }
        DripError::InvalidAmount(_) => {
            "Invalid amount. Send: <amount> <address>, e.g. 0.75 1A1zP1eP5QGefi2DMPTfTL5SLmv7DivfNa"
                .to_string()
        }
        DripError::BelowMinimum { minimum } => {
            format!("Minimum withdrawal is {}{}.", FIAT_SIGN, minimum)
        }
        DripError::InsufficientBalance {
            requested,
            available,
        } => format!(
            "Insufficient balance: you have ~{s}{}, requested {s}{}.",
            format_approx(*available),
            requested,
            s = FIAT_SIGN
        ),
        DripError::InvalidAddress => {
            "Missing destination address. Send: <amount> <address>".to_string()
        }
        _ => "Something went wrong on our side. Please try again.".to_string(),
    }
}

/// Four decimals, truncated
fn format_approx(amount: FiatAmount) -> String {
    let ten_thousandths = amount.micros() / 100;
    format!("{}.{:04}", ten_thousandths / 10_000, ten_thousandths % 10_000)
}

/// `7h 59m 12s`
fn format_remaining(remaining: Duration) -> String {
    let secs = remaining.num_seconds().max(0);
    format!("{}h {}m {}s", secs / 3600, secs % 3600 / 60, secs % 60)
}
