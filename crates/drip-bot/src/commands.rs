//! Command parsing

use drip_core::AccountId;

/// A recognized user command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// `/start [referrer_id]`; a non-numeric argument is dropped
    Start { referrer: Option<AccountId> },
    Help,
    Mine,
    Ad,
    Balance,
    Referral,
    ReferStats,
    /// `/withdraw` alone: usage instructions
    WithdrawHelp,
    /// `<amount> <address>`
    Withdraw { amount: String, address: String },
    /// Any other `/command`
    Unknown(String),
}

impl Command {
    /// Parse message text. Free text that is not a withdrawal request yields
    /// `None` and gets no reply.
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        let mut tokens = text.split_whitespace();
        let head = tokens.next()?;

        let Some(name) = head.strip_prefix('/') else {
            let address = tokens.next()?;
            if tokens.next().is_some() {
                return None;
            }
            return Some(Self::Withdraw {
                amount: head.to_string(),
                address: address.to_string(),
            });
        };

        // Group chats append the bot name: /mine@hashdrip_bot
        let name = name.split('@').next().unwrap_or(name).to_ascii_lowercase();
        let command = match name.as_str() {
            "start" => Self::Start {
                referrer: tokens.next().and_then(|arg| arg.parse().ok()),
            },
            "help" => Self::Help,
            "mine" => Self::Mine,
            "ad" => Self::Ad,
            "balance" => Self::Balance,
            "referral" => Self::Referral,
            "referstats" => Self::ReferStats,
            "withdraw" => Self::WithdrawHelp,
            _ => Self::Unknown(name),
        };
        Some(command)
    }

    /// Name used in logs
    pub fn name(&self) -> &str {
        match self {
            Self::Start { .. } => "start",
            Self::Help => "help",
            Self::Mine => "mine",
            Self::Ad => "ad",
            Self::Balance => "balance",
            Self::Referral => "referral",
            Self::ReferStats => "referstats",
            Self::WithdrawHelp => "withdraw",
            Self::Withdraw { .. } => "withdrawal",
            Self::Unknown(name) => name,
        }
    }
}
