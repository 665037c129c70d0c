//! # Token Unit Conversion
//!
//! Users type amounts like `"12.5"`; contracts speak in smallest units
//! (`12_500_000` for a 6-decimal stablecoin). This module is the only place
//! that crosses between the two, and it does so with integer arithmetic
//! only. There is no floating point anywhere on this path.
//!
//! The formatting rules match what wallet UIs print: at least one
//! fractional digit (`"1.0"`), trailing fractional zeros trimmed
//! otherwise (`"1.5"`, not `"1.500000"`).

use std::fmt;

use primitive_types::U256;
use serde::{Serialize, Serializer};
use thiserror::Error;

/// Largest supported decimals value. `10^78` no longer fits in 256 bits.
pub const MAX_DECIMALS: u8 = 77;

/// Errors produced when parsing a decimal amount string.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitsError {
    /// Empty (or whitespace-only) input.
    #[error("amount is empty")]
    Empty,

    /// A character other than an ASCII digit or a single `.`.
    #[error("invalid character {found:?} in amount {input:?}")]
    InvalidCharacter {
        /// The offending input string.
        input: String,
        /// The first character that is not allowed.
        found: char,
    },

    /// More than one decimal point.
    #[error("amount {0:?} has more than one decimal point")]
    MultipleDecimalPoints(String),

    /// Non-zero digits beyond the token's precision.
    #[error("amount {input:?} has more than {decimals} decimal places")]
    TooManyDecimals {
        /// The offending input string.
        input: String,
        /// Precision of the token.
        decimals: u8,
    },

    /// The value does not fit in 256 bits.
    #[error("amount {0:?} overflows uint256")]
    Overflow(String),

    /// Token precision outside the representable range.
    #[error("unsupported decimals: {0} (max {MAX_DECIMALS})")]
    UnsupportedDecimals(u8),
}

/// Parses a decimal string into smallest units.
///
/// Accepts `"1"`, `"1.5"`, `".5"` and `"1."`. Surrounding whitespace is
/// ignored. Excess fractional digits are tolerated only when they are zeros.
///
/// # Errors
///
/// See [`UnitsError`] for the individual rejection reasons.
pub fn parse_units(input: &str, decimals: u8) -> Result<U256, UnitsError> {
    if decimals > MAX_DECIMALS {
        return Err(UnitsError::UnsupportedDecimals(decimals));
    }

    let text = input.trim();
    if text.is_empty() || text == "." {
        return Err(UnitsError::Empty);
    }

    if let Some(found) = text.chars().find(|c| !c.is_ascii_digit() && *c != '.') {
        return Err(UnitsError::InvalidCharacter {
            input: input.to_string(),
            found,
        });
    }

    let (whole, fraction) = match text.split_once('.') {
        Some((w, f)) => {
            if f.contains('.') {
                return Err(UnitsError::MultipleDecimalPoints(input.to_string()));
            }
            (w, f)
        }
        None => (text, ""),
    };

    let precision = decimals as usize;
    let fraction = if fraction.len() > precision {
        let (kept, excess) = fraction.split_at(precision);
        if excess.bytes().any(|b| b != b'0') {
            return Err(UnitsError::TooManyDecimals {
                input: input.to_string(),
                decimals,
            });
        }
        kept.to_string()
    } else {
        format!("{:0<width$}", fraction, width = precision)
    };

    let digits = format!("{}{}", whole, fraction);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }

    U256::from_dec_str(digits).map_err(|_| UnitsError::Overflow(input.to_string()))
}

/// Renders smallest units as a decimal string.
///
/// Always prints at least one fractional digit; trailing fractional zeros
/// beyond that are trimmed.
pub fn format_units(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let precision = decimals as usize;

    if precision == 0 {
        return format!("{}.0", digits);
    }

    let padded = format!("{:0>width$}", digits, width = precision + 1);
    let (whole, fraction) = padded.split_at(padded.len() - precision);
    let fraction = fraction.trim_end_matches('0');
    let fraction = if fraction.is_empty() { "0" } else { fraction };

    format!("{}.{}", whole, fraction)
}

// ---------------------------------------------------------------------------
// TokenAmount
// ---------------------------------------------------------------------------

/// A raw amount paired with the precision needed to display it.
///
/// Used in errors and reports so that messages show `"12.5"` instead of
/// `"12500000"` without every caller threading decimals through.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenAmount {
    /// Value in smallest units.
    pub raw: U256,
    /// Token precision.
    pub decimals: u8,
}

impl TokenAmount {
    /// Pairs a raw value with its precision.
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Parses a user-entered decimal string.
    pub fn parse(input: &str, decimals: u8) -> Result<Self, UnitsError> {
        Ok(Self::new(parse_units(input, decimals)?, decimals))
    }

    /// Returns `true` when the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_units(self.raw, self.decimals))
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}
