use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Fixed-point decimal with 4 decimal places, stored as a scaled integer.
///
/// Prices and totals never touch binary floating point: values are parsed from
/// decimal strings and multiplied by whole share counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(i64);

/// Errors that can occur when parsing a decimal string into an [`Amount`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseAmountError {
    #[error("empty amount")]
    Empty,
    #[error("invalid character in amount '{0}'")]
    InvalidDigit(String),
    #[error("amount '{0}' has more than 4 decimal places")]
    TooManyDecimals(String),
    #[error("amount '{0}' is out of range")]
    Overflow(String),
}

impl Amount {
    const SCALE: i64 = 10_000;
    const DECIMALS: usize = 4;

    pub const ZERO: Amount = Amount(0);

    pub fn from_scaled(value: i64) -> Self {
        Amount(value)
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Multiply by a whole number of shares.
    pub fn checked_mul(self, shares: u32) -> Option<Self> {
        self.0.checked_mul(i64::from(shares)).map(Amount)
    }

    /// Multiply by a whole number of shares, clamping at the representable
    /// range instead of failing.
    pub fn saturating_mul(self, shares: u32) -> Self {
        Amount(self.0.saturating_mul(i64::from(shares)))
    }

    /// Price of one share when `self` is split into `shares` equal parts,
    /// rounded half away from zero to the nearest ten-thousandth.
    pub fn per_share(self, shares: u32) -> Option<Self> {
        if shares == 0 {
            return None;
        }
        let value = i128::from(self.0);
        let shares = i128::from(shares);
        let half = shares;
        let doubled = value * 2;
        let quotient = if doubled >= 0 {
            (doubled + half) / (2 * shares)
        } else {
            (doubled - half) / (2 * shares)
        };
        i64::try_from(quotient).ok().map(Amount)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = Self::SCALE as u64;
        let whole = abs / scale;
        let frac = abs % scale;
        write!(f, "{sign}{whole}.{frac:04}")
    }
}

impl FromStr for Amount {
    type Err = ParseAmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        if raw.is_empty() {
            return Err(ParseAmountError::Empty);
        }

        let (negative, digits) = match raw.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, raw.strip_prefix('+').unwrap_or(raw)),
        };

        let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(ParseAmountError::InvalidDigit(raw.to_string()));
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(ParseAmountError::InvalidDigit(raw.to_string()));
        }
        if frac.len() > Self::DECIMALS {
            return Err(ParseAmountError::TooManyDecimals(raw.to_string()));
        }

        let overflow = || ParseAmountError::Overflow(raw.to_string());

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        // right-pad the fraction to the full scale: "5" -> 5000
        let frac: i64 = if frac.is_empty() {
            0
        } else {
            format!("{frac:0<4}").parse().map_err(|_| overflow())?
        };

        let scaled = whole
            .checked_mul(Self::SCALE)
            .and_then(|w| w.checked_add(frac))
            .ok_or_else(overflow)?;

        Ok(Amount(if negative { -scaled } else { scaled }))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl std::ops::Add for Amount {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Amount::ZERO, |acc, amount| acc + amount)
    }
}
