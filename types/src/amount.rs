//! Token amounts in the smallest on-chain unit.
//!
//! Amounts are fixed-point integers (u128) so that baselines and deltas never
//! drift the way floating-point prices do. Conversion to and from a decimal
//! string happens only at presentation boundaries via [`TokenAmount::format_units`]
//! and [`TokenAmount::parse_units`].

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::PaywatchError;

/// Largest supported `decimals` value; `10^38` still fits in a u128.
pub const MAX_DECIMALS: u8 = 38;

/// An ERC-20 style token amount in smallest units.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TokenAmount(u128);

impl TokenAmount {
    pub const ZERO: Self = Self(0);

    pub fn new(raw: u128) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> u128 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        self.0.checked_add(other.0).map(Self)
    }

    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Render as a human-readable decimal, trimming trailing zeros.
    ///
    /// `1_500_000` with 6 decimals renders as `"1.5"`.
    pub fn format_units(&self, decimals: u8) -> String {
        let decimals = decimals.min(MAX_DECIMALS);
        if decimals == 0 {
            return self.0.to_string();
        }
        let scale = 10u128.pow(u32::from(decimals));
        let whole = self.0 / scale;
        let frac = self.0 % scale;
        if frac == 0 {
            return whole.to_string();
        }
        let frac = format!("{:0width$}", frac, width = usize::from(decimals));
        format!("{}.{}", whole, frac.trim_end_matches('0'))
    }

    /// Parse a decimal string such as `"12"` or `"1.25"` into smallest units.
    ///
    /// Uses exact integer arithmetic. More fractional digits than `decimals`
    /// is rejected rather than rounded.
    pub fn parse_units(input: &str, decimals: u8) -> Result<Self, PaywatchError> {
        let invalid = |reason: &str| PaywatchError::InvalidAmount {
            input: input.to_string(),
            reason: reason.to_string(),
        };
        if decimals > MAX_DECIMALS {
            return Err(invalid("token decimals out of range"));
        }

        let trimmed = input.trim();
        let (whole, frac) = match trimmed.split_once('.') {
            Some((w, f)) => (w, Some(f)),
            None => (trimmed, None),
        };
        if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits before the decimal point"));
        }
        let frac = frac.unwrap_or("");
        if trimmed.contains('.') && frac.is_empty() {
            return Err(invalid("expected digits after the decimal point"));
        }
        if !frac.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("fractional part must be digits"));
        }
        if frac.len() > usize::from(decimals) {
            return Err(invalid("more fractional digits than the token supports"));
        }

        let scale = 10u128.pow(u32::from(decimals));
        let whole: u128 = whole.parse().map_err(|_| invalid("amount too large"))?;
        let frac_value: u128 = if frac.is_empty() {
            0
        } else {
            let padding = 10u128.pow((usize::from(decimals) - frac.len()) as u32);
            let digits: u128 = frac.parse().map_err(|_| invalid("amount too large"))?;
            digits * padding
        };
        whole
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac_value))
            .map(Self)
            .ok_or_else(|| invalid("amount too large"))
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u128> for TokenAmount {
    fn from(raw: u128) -> Self {
        Self(raw)
    }
}
