//! Error types for offer records
//!
//! Errors raised while turning raw remote data into typed records. All of
//! them signal a producer-side problem and are not retried.

use thiserror::Error;

use crate::ids::OfferId;

/// Offer-level errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OfferError {
    #[error("Offer {id} has zero volume (not allowed)")]
    ZeroVolume { id: OfferId },

    #[error("Amount {raw} of {symbol} is outside the decimal range")]
    AmountOutOfRange { symbol: String, raw: String },

    #[error("Token {symbol} has {decimals} decimals, at most 28 are supported")]
    InvalidDecimals { symbol: String, decimals: u32 },
}
