//! Exact conversion between human decimal amounts and on-chain integers.
//!
//! The native unit uses a fixed scale of 10^18. Conversion goes through
//! string digits and `U256`, never through floating point.

use alloy::primitives::U256;
use std::fmt;
use std::str::FromStr;

use crate::ledger::types::{LedgerError, LedgerResult};

/// Decimal places of the native unit.
pub const NATIVE_DECIMALS: usize = 18;

/// Unit a human-entered amount is expressed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Unit {
    /// Native token, scaled by 10^18.
    #[default]
    Native,
    /// Already an on-chain integer; passed through unchanged.
    Raw,
}

impl FromStr for Unit {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "" | "VITE" => Ok(Unit::Native),
            "RAW" | "ATTOV" => Ok(Unit::Raw),
            other => Err(LedgerError::InvalidInput(format!("unknown unit '{}'", other))),
        }
    }
}

/// On-chain integer amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct Amount(U256);

impl Amount {
    pub const ZERO: Amount = Amount(U256::ZERO);

    pub fn from_raw(raw: U256) -> Self {
        Self(raw)
    }

    pub fn raw(&self) -> U256 {
        self.0
    }

    /// Parse a raw integer string as sent on the wire.
    pub fn parse_raw(s: &str) -> LedgerResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }
        if !s.chars().all(|c| c.is_ascii_digit()) {
            return Err(LedgerError::InvalidInput(format!("'{}' is not an integer amount", s)));
        }
        U256::from_str_radix(s, 10)
            .map(Self)
            .map_err(|e| LedgerError::InvalidInput(format!("amount '{}' out of range: {}", s, e)))
    }

    /// Parse a user-entered amount in the given unit. An empty string is zero.
    pub fn parse_human(s: &str, unit: Unit) -> LedgerResult<Self> {
        match unit {
            Unit::Native => Self::from_decimal(s, NATIVE_DECIMALS),
            Unit::Raw => Self::parse_raw(s),
        }
    }

    /// Scale a decimal string by `10^decimals`. Fails rather than rounding when
    /// the value has more fractional digits than the scale can hold.
    ///
    /// Only the value is kept. [`to_decimal`](Self::to_decimal) gives back the
    /// input text exactly when it is canonical: no leading zeros in the
    /// integer part, no trailing zeros in the fraction, and no bare `.`.
    /// Other spellings come back canonical, so `"0.50"` gives `"0.5"` and
    /// `"01"` gives `"1"`.
    pub fn from_decimal(s: &str, decimals: usize) -> LedgerResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::ZERO);
        }

        let (int_part, frac_part) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        let all_digits = |p: &str| p.chars().all(|c| c.is_ascii_digit());
        if (int_part.is_empty() && frac_part.is_empty()) || !all_digits(int_part) || !all_digits(frac_part) {
            return Err(LedgerError::InvalidInput(format!("'{}' is not a decimal amount", s)));
        }
        if frac_part.len() > decimals {
            return Err(LedgerError::InvalidInput(format!(
                "'{}' has more than {} fractional digits",
                s, decimals
            )));
        }

        let mut digits = String::with_capacity(int_part.len() + decimals);
        digits.push_str(int_part);
        digits.push_str(frac_part);
        digits.extend(std::iter::repeat('0').take(decimals - frac_part.len()));

        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            return Ok(Self::ZERO);
        }
        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|e| LedgerError::InvalidInput(format!("amount '{}' out of range: {}", s, e)))
    }

    /// Render as a canonical decimal string at `10^decimals` scale: integer
    /// part without leading zeros (a lone `0` below one), fraction without
    /// trailing zeros, and no `.` for whole values.
    pub fn to_decimal(&self, decimals: usize) -> String {
        let raw = self.0.to_string();
        if decimals == 0 {
            return raw;
        }
        let padded = if raw.len() <= decimals {
            format!("{}{}", "0".repeat(decimals + 1 - raw.len()), raw)
        } else {
            raw
        };
        let (int_part, frac_part) = padded.split_at(padded.len() - decimals);
        let frac_part = frac_part.trim_end_matches('0');
        if frac_part.is_empty() {
            int_part.to_string()
        } else {
            format!("{}.{}", int_part, frac_part)
        }
    }

    /// Render in the given unit.
    pub fn format(&self, unit: Unit) -> String {
        match unit {
            Unit::Native => self.to_decimal(NATIVE_DECIMALS),
            Unit::Raw => self.0.to_string(),
        }
    }

    /// Whole native units, fractional part truncated (balance display).
    pub fn whole_units(&self) -> String {
        (self.0 / U256::from(10u64).pow(U256::from(NATIVE_DECIMALS))).to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
