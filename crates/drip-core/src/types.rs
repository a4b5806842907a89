//! Core type definitions for hashdrip
//!
//! Amounts are fixed-point integers in the smallest unit of their currency,
//! the same way on-chain tokens count wei instead of ether:
//!
//! - [`RewardAmount`]: internal reward coin, 18 decimals (`ONE_COIN`)
//! - [`FiatAmount`]: external payout currency, 6 decimals (`ONE_FIAT`)
//!
//! Both serialize as plain decimal strings so persisted accounts and config
//! files stay human-readable.

use crate::error::DripError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// Decimal places of the reward coin
pub const COIN_DECIMALS: u32 = 18;

/// One whole reward coin in smallest units
pub const ONE_COIN: u128 = 1_000_000_000_000_000_000; // 10^18

/// Decimal places of the fiat currency
pub const FIAT_DECIMALS: u32 = 6;

/// One whole fiat unit in smallest units
pub const ONE_FIAT: u128 = 1_000_000; // 10^6

/// Basis points in 100%
pub const BPS_DENOMINATOR: u128 = 10_000;

/// AccountId - stable external user identifier (chat platform user id)
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(i64);

impl AccountId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(&self) -> i64 {
        self.0
    }

    /// Big-endian key bytes, ordered like the numeric id for non-negative ids
    pub fn to_key(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }

    pub fn from_key(bytes: [u8; 8]) -> Self {
        Self(i64::from_be_bytes(bytes))
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for AccountId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl FromStr for AccountId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(Self)
    }
}

/// Parse a non-negative decimal string into a fixed-point integer.
///
/// More than `decimals` fractional digits are rejected unless the extra ones
/// are zeros. Signs, exponents and non-finite spellings are rejected.
fn parse_fixed(s: &str, decimals: u32) -> Result<u128, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty amount".to_string());
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };

    if whole.is_empty() && frac.is_empty() {
        return Err(format!("not a number: {s}"));
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("not a number: {s}"));
    }

    if frac.bytes().skip(decimals as usize).any(|b| b != b'0') {
        return Err(format!("more than {decimals} decimal places: {s}"));
    }

    let scale = 10u128.pow(decimals);
    let mut value: u128 = 0;
    for b in whole.bytes() {
        value = value
            .checked_mul(10)
            .and_then(|v| v.checked_add((b - b'0') as u128))
            .ok_or_else(|| format!("amount too large: {s}"))?;
    }
    value = value
        .checked_mul(scale)
        .ok_or_else(|| format!("amount too large: {s}"))?;

    let mut place = scale;
    for b in frac.bytes().take(decimals as usize) {
        place /= 10;
        value += (b - b'0') as u128 * place;
    }

    Ok(value)
}

/// Format a fixed-point integer with exactly `shown` fractional digits
/// (truncating).
fn format_fixed(value: u128, decimals: u32, shown: u32) -> String {
    let scale = 10u128.pow(decimals);
    let whole = value / scale;
    let frac = (value % scale) / 10u128.pow(decimals - shown);
    if shown == 0 {
        whole.to_string()
    } else {
        format!("{}.{:0width$}", whole, frac, width = shown as usize)
    }
}

/// Amount of the internal reward coin, in 10^-18 units
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RewardAmount(u128);

impl RewardAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_units(units: u128) -> Self {
        Self(units)
    }

    pub const fn units(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.0.checked_sub(other.0).map(Self)
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Divide by an integer (floor)
    pub fn div(self, divisor: u128) -> Self {
        Self(self.0.checked_div(divisor).unwrap_or(0))
    }

    /// Apply a basis-point share (floor)
    pub fn share(self, bps: BasisPoints) -> Self {
        Self(bps.apply(self.0))
    }
}

impl Add for RewardAmount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        self.saturating_add(other)
    }
}

impl AddAssign for RewardAmount {
    fn add_assign(&mut self, other: Self) {
        *self = self.saturating_add(other);
    }
}

impl FromStr for RewardAmount {
    type Err = DripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, COIN_DECIMALS)
            .map(Self)
            .map_err(DripError::InvalidAmount)
    }
}

impl TryFrom<String> for RewardAmount {
    type Error = DripError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<RewardAmount> for String {
    fn from(amount: RewardAmount) -> Self {
        format_fixed(amount.0, COIN_DECIMALS, COIN_DECIMALS)
    }
}

impl fmt::Display for RewardAmount {
    /// Twelve decimals, matching what users see in replies
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_fixed(self.0, COIN_DECIMALS, 12))
    }
}

impl fmt::Debug for RewardAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RewardAmount({})", String::from(*self))
    }
}

/// Amount of the external payout currency, in 10^-6 units
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiatAmount(u128);

impl FiatAmount {
    pub const ZERO: Self = Self(0);

    pub const fn from_micros(micros: u128) -> Self {
        Self(micros)
    }

    /// Whole currency units
    pub const fn from_whole(whole: u128) -> Self {
        Self(whole * ONE_FIAT)
    }

    pub const fn micros(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    pub fn share(self, bps: BasisPoints) -> Self {
        Self(bps.apply(self.0))
    }

    /// Two decimals, rounded half-up, for user-facing replies
    pub fn to_cents_string(&self) -> String {
        let cents = (self.0 + 5_000) / 10_000;
        format!("{}.{:02}", cents / 100, cents % 100)
    }
}

impl Add for FiatAmount {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl FromStr for FiatAmount {
    type Err = DripError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_fixed(s, FIAT_DECIMALS)
            .map(Self)
            .map_err(DripError::InvalidAmount)
    }
}

impl TryFrom<String> for FiatAmount {
    type Error = DripError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<FiatAmount> for String {
    fn from(amount: FiatAmount) -> Self {
        amount.to_string()
    }
}

impl fmt::Display for FiatAmount {
    /// Full precision with trailing zeros trimmed, at least two decimals
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full = format_fixed(self.0, FIAT_DECIMALS, FIAT_DECIMALS);
        let trimmed = full.trim_end_matches('0');
        let decimals = trimmed.split_once('.').map(|(_, d)| d.len()).unwrap_or(0);
        if decimals < 2 {
            f.write_str(&format_fixed(self.0, FIAT_DECIMALS, 2))
        } else {
            f.write_str(trimmed)
        }
    }
}

impl fmt::Debug for FiatAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FiatAmount({})", self)
    }
}

/// Percentage expressed in basis points (1% = 100 bps)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BasisPoints(u32);

impl BasisPoints {
    pub const fn new(bps: u32) -> Self {
        Self(bps)
    }

    pub const fn from_percent(percent: u32) -> Self {
        Self(percent * 100)
    }

    pub const fn get(&self) -> u32 {
        self.0
    }

    pub fn as_percent(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// `value * bps / 10_000`, floored
    pub fn apply(&self, value: u128) -> u128 {
        value
            .checked_mul(self.0 as u128)
            .map(|v| v / BPS_DENOMINATOR)
            .unwrap_or_else(|| value / BPS_DENOMINATOR * self.0 as u128)
    }
}

/// Conversion rate between reward coin and fiat: fiat per whole coin
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FiatAmount", into = "FiatAmount")]
pub struct ExchangeRate {
    fiat_per_coin: FiatAmount,
}

impl ExchangeRate {
    pub fn new(fiat_per_coin: FiatAmount) -> Result<Self, DripError> {
        if fiat_per_coin.is_zero() {
            return Err(DripError::InvalidAmount(
                "exchange rate must be positive".to_string(),
            ));
        }
        Ok(Self { fiat_per_coin })
    }

    pub fn fiat_per_coin(&self) -> FiatAmount {
        self.fiat_per_coin
    }

    /// Reward value in fiat, rounded down
    pub fn to_fiat(&self, reward: RewardAmount) -> FiatAmount {
        let rate = self.fiat_per_coin.micros();
        let micros = match reward.units().checked_mul(rate) {
            Some(product) => product / ONE_COIN,
            None => reward.units() / ONE_COIN * rate,
        };
        FiatAmount::from_micros(micros)
    }

    /// Reward units needed to cover a fiat amount, rounded up
    pub fn to_reward(&self, fiat: FiatAmount) -> RewardAmount {
        let rate = self.fiat_per_coin.micros();
        let units = match fiat.micros().checked_mul(ONE_COIN) {
            Some(product) => product.div_ceil(rate),
            None => fiat.micros().div_ceil(rate).saturating_mul(ONE_COIN),
        };
        RewardAmount::from_units(units)
    }
}

impl TryFrom<FiatAmount> for ExchangeRate {
    type Error = DripError;

    fn try_from(fiat_per_coin: FiatAmount) -> Result<Self, Self::Error> {
        Self::new(fiat_per_coin)
    }
}

impl From<ExchangeRate> for FiatAmount {
    fn from(rate: ExchangeRate) -> Self {
        rate.fiat_per_coin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fiat(s: &str) -> FiatAmount {
        s.parse().unwrap()
    }

    #[test]
    fn test_parse_fiat() {
        assert_eq!(fiat("0.75").micros(), 750_000);
        assert_eq!(fiat("20").micros(), 20_000_000);
        assert_eq!(fiat(".5").micros(), 500_000);
        assert_eq!(fiat("5.").micros(), 5_000_000);
        assert_eq!(fiat(" 19.99 ").micros(), 19_990_000);
        assert_eq!(fiat("0.5000000").micros(), 500_000);
    }

    #[test]
    fn test_parse_rejects_sub_micro_digits() {
        for lossy in ["0.5000009", "0.1234567", "19.9999999"] {
            assert!(
                matches!(lossy.parse::<FiatAmount>(), Err(DripError::InvalidAmount(_))),
                "{lossy:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for bad in ["", ".", "-1", "+1", "1e3", "abc", "NaN", "inf", "1.2.3", "1,5"] {
            assert!(
                matches!(bad.parse::<FiatAmount>(), Err(DripError::InvalidAmount(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_reward_display() {
        let base = RewardAmount::from_units(10_000_000);
        assert_eq!(base.to_string(), "0.000000000010");
        assert_eq!(
            String::from(base),
            "0.000000000010000000"
        );
        assert_eq!("0.00000000001".parse::<RewardAmount>().unwrap(), base);
    }

    #[test]
    fn test_fiat_display() {
        assert_eq!(fiat("1.999").to_string(), "1.999");
        assert_eq!(fiat("3").to_string(), "3.00");
        assert_eq!(fiat("0.5").to_string(), "0.50");
        assert_eq!(fiat("1.999").to_cents_string(), "2.00");
        assert_eq!(fiat("17.991").to_cents_string(), "17.99");
        assert_eq!(fiat("0.405").to_cents_string(), "0.41");
    }

    #[test]
    fn test_basis_points() {
        let ten = BasisPoints::from_percent(10);
        assert_eq!(ten.get(), 1_000);
        assert_eq!(ten.apply(19_990_000), 1_999_000);
        assert_eq!(ten.apply(7), 0);
    }

    #[test]
    fn test_exchange_rate_round_trip_never_undercharges() {
        let rate = ExchangeRate::new(fiat("98000")).unwrap();
        let amount = fiat("0.5");
        let units = rate.to_reward(amount);
        assert!(rate.to_fiat(units) >= amount);
        // One unit less no longer covers the amount
        let short = RewardAmount::from_units(units.units() - 1);
        assert!(rate.to_fiat(short) < amount);
    }

    #[test]
    fn test_zero_rate_rejected() {
        assert!(ExchangeRate::new(FiatAmount::ZERO).is_err());
    }

    #[test]
    fn test_amount_serde_as_string() {
        let json = serde_json::to_string(&fiat("0.5")).unwrap();
        assert_eq!(json, "\"0.50\"");
        let back: FiatAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fiat("0.5"));
    }

    #[test]
    fn test_account_id_key_order() {
        let a = AccountId::new(5);
        let b = AccountId::new(300);
        assert!(a.to_key() < b.to_key());
        assert_eq!(AccountId::from_key(b.to_key()), b);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn covered_amount_never_debits_more_than_balance(
                units in 0u128..1_000_000_000_000_000_000_000_000,
                micros in 1u128..100_000_000_000,
                rate in 1u128..1_000_000_000_000,
            ) {
                let rate = ExchangeRate::new(FiatAmount::from_micros(rate)).unwrap();
                let balance = RewardAmount::from_units(units);
                let amount = FiatAmount::from_micros(micros);
                if rate.to_fiat(balance) >= amount {
                    prop_assert!(rate.to_reward(amount) <= balance);
                }
            }

            #[test]
            fn fiat_display_parses_back(micros in 0u128..1_000_000_000_000_000) {
                let amount = FiatAmount::from_micros(micros);
                prop_assert_eq!(amount.to_string().parse::<FiatAmount>().unwrap(), amount);
            }
        }
    }
}
