//! Error types for hashdrip core operations

use crate::types::{FiatAmount, RewardAmount};
use thiserror::Error;

/// Result type alias for hashdrip operations
pub type Result<T> = std::result::Result<T, DripError>;

/// Errors surfaced by the mining, referral and withdrawal core
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DripError {
    // === Storage ===
    /// Account store medium unavailable
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    // === Mining ===
    /// Ad boost requested without a running session
    #[error("No active mining session")]
    NoActiveSession,

    /// Ad boost requested before the cooldown elapsed
    #[error("Ad cooldown active, retry in {retry_in_secs}s")]
    CooldownActive { retry_in_secs: u64 },

    // === Withdrawal ===
    /// Amount is not a positive, parseable number
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Amount is under the configured floor
    #[error("Amount below minimum withdrawal of {minimum}")]
    BelowMinimum { minimum: FiatAmount },

    /// Balance does not cover the requested amount
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: FiatAmount,
        available: FiatAmount,
    },

    /// Destination address missing
    #[error("Destination address is empty")]
    InvalidAddress,

    /// A debit larger than the stored balance
    #[error("Balance underflow: debit {requested:?} exceeds {available:?}")]
    BalanceUnderflow {
        requested: RewardAmount,
        available: RewardAmount,
    },

    // === Notification ===
    /// Operator notification could not be delivered
    #[error("Notification delivery failed: {0}")]
    NotificationDeliveryFailure(String),

    // === General ===
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DripError {
    /// Stable numeric code for logs and operator tooling
    pub fn code(&self) -> u32 {
        match self {
            Self::StorageFailure(_) => 1001,
            Self::NoActiveSession => 2001,
            Self::CooldownActive { .. } => 2002,
            Self::InvalidAmount(_) => 3001,
            Self::BelowMinimum { .. } => 3002,
            Self::InsufficientBalance { .. } => 3003,
            Self::InvalidAddress => 3004,
            Self::BalanceUnderflow { .. } => 3005,
            Self::NotificationDeliveryFailure(_) => 4001,
            Self::Internal(_) => 9999,
        }
    }

    /// Transient failures the user may simply retry
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::StorageFailure(_))
    }

    /// Errors caused by user input or account state rather than the system
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::NoActiveSession
                | Self::CooldownActive { .. }
                | Self::InvalidAmount(_)
                | Self::BelowMinimum { .. }
                | Self::InsufficientBalance { .. }
                | Self::InvalidAddress
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(DripError::NoActiveSession.code(), 2001);
        assert_eq!(DripError::StorageFailure("disk".into()).code(), 1001);
    }

    #[test]
    fn test_error_display() {
        let err = DripError::BelowMinimum {
            minimum: FiatAmount::from_micros(500_000),
        };
        assert_eq!(err.to_string(), "Amount below minimum withdrawal of 0.50");
    }

    #[test]
    fn test_transient_errors() {
        assert!(DripError::StorageFailure("locked".into()).is_transient());
        assert!(!DripError::NoActiveSession.is_transient());
        assert!(DripError::NoActiveSession.is_rejection());
        assert!(!DripError::Internal("x".into()).is_rejection());
    }
}
