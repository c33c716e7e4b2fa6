//! Fixed-point decimal types for prices and quantities
//!
//! Uses rust_decimal for deterministic arithmetic (no floating-point errors).
//! Raw on-chain amounts are integers in a token's smallest unit; `Token`
//! converts them into human units at the interface boundary.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::OfferError;

/// Largest scale rust_decimal can represent
pub const MAX_DECIMALS: u32 = 28;

/// Quantity of one token, in human units
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(Decimal);

impl Quantity {
    pub const ZERO: Quantity = Quantity(Decimal::ZERO);

    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl FromStr for Quantity {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s).map(Self)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Price in quote units per base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Build a price as `numerator / denominator`
    ///
    /// Fails on a zero denominator or when the quotient leaves the decimal
    /// range.
    pub fn ratio(numerator: Quantity, denominator: Quantity) -> Option<Self> {
        numerator.0.checked_div(denominator.0).map(Self)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Decimal::from_str_exact(s).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A token with a fixed number of decimals
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub symbol: String,
    pub decimals: u32,
}

impl Token {
    /// Create a token description
    ///
    /// Tokens with more than 28 decimals cannot be represented exactly.
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Result<Self, OfferError> {
        let symbol = symbol.into();
        if decimals > MAX_DECIMALS {
            return Err(OfferError::InvalidDecimals { symbol, decimals });
        }
        Ok(Self { symbol, decimals })
    }

    /// Convert a raw amount in the token's smallest unit to human units
    pub fn from_units(&self, raw: u128) -> Result<Quantity, OfferError> {
        let out_of_range = || OfferError::AmountOutOfRange {
            symbol: self.symbol.clone(),
            raw: raw.to_string(),
        };
        let signed = i128::try_from(raw).map_err(|_| out_of_range())?;
        Decimal::try_from_i128_with_scale(signed, self.decimals)
            .map(Quantity)
            .map_err(|_| out_of_range())
    }
}
