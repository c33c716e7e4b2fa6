//! Identifier types for offer-list entities
//!
//! Offer ids are small integers assigned by the remote list; `0` is reserved
//! as the "no such entry" sentinel used at both list boundaries.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of one entry in a remote offer list
///
/// `OfferId::NONE` (0) never names a real offer. It marks the absence of a
/// neighbor in `prev`/`next` and the empty head of a list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OfferId(u32);

impl OfferId {
    /// Boundary sentinel
    pub const NONE: OfferId = OfferId(0);

    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Whether this is the boundary sentinel
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    pub const fn is_some(self) -> bool {
        self.0 != 0
    }

    pub const fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for OfferId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

impl fmt::Display for OfferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position in the remote ledger's history
///
/// Snapshots are anchored to a block number and every change event is tagged
/// with the block it occurred in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockNumber(u64);

impl BlockNumber {
    pub const fn new(block: u64) -> Self {
        Self(block)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for BlockNumber {
    fn from(block: u64) -> Self {
        Self(block)
    }
}

impl fmt::Display for BlockNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque principal identifier (offer maker or taker)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn new(address: impl Into<String>) -> Self {
        Self(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Market identifier (trading pair)
///
/// Format: "BASE/QUOTE" (e.g., "WETH/USDC", "DAI/USDC")
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a new MarketId from a string
    ///
    /// # Panics
    /// Panics if the format is invalid (must contain '/')
    pub fn new(symbol: impl Into<String>) -> Self {
        let s = symbol.into();
        assert!(s.contains('/'), "MarketId must be in BASE/QUOTE format");
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
