//! Types library for the offer-list cache
//!
//! This library provides the value types shared by every component that
//! reads or caches a remote offer list.
//!
//! # Modules
//! - `ids`: Identifiers (OfferId, BlockNumber, Address, MarketId)
//! - `numeric`: Decimal quantities, prices and token unit conversion
//! - `market`: Markets, book sides and the offer lists behind them
//! - `offer`: Raw and typed offer records
//! - `errors`: Error taxonomy

// Public modules
pub mod ids;
pub mod numeric;
pub mod market;
pub mod offer;
pub mod errors;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::ids::*;
    pub use crate::numeric::*;
    pub use crate::market::*;
    pub use crate::offer::*;
    pub use crate::errors::*;
}
