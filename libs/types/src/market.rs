//! Markets and their two offer lists
//!
//! A market A/B is backed by two remote offer lists, one per direction.
//! Which list a book caches decides how `gives`/`wants` map onto base and
//! quote volumes:
//!
//! - asks: offers give base, want quote
//! - bids: offers give quote, want base

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::MarketId;
use crate::numeric::{Price, Quantity, Token};

/// Which side of a market an offer list represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookSide {
    Bids,
    Asks,
}

impl BookSide {
    pub fn opposite(&self) -> Self {
        match self {
            BookSide::Bids => BookSide::Asks,
            BookSide::Asks => BookSide::Bids,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookSide::Bids => "bids",
            BookSide::Asks => "asks",
        }
    }
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound/inbound token pair identifying one remote offer list
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OfferList {
    /// Token the offers give
    pub outbound: Token,
    /// Token the offers want
    pub inbound: Token,
}

impl fmt::Display for OfferList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}->{}", self.outbound.symbol, self.inbound.symbol)
    }
}

/// A base/quote market
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Market {
    pub base: Token,
    pub quote: Token,
}

impl Market {
    pub fn new(base: Token, quote: Token) -> Self {
        Self { base, quote }
    }

    pub fn id(&self) -> MarketId {
        MarketId::new(format!("{}/{}", self.base.symbol, self.quote.symbol))
    }

    /// The remote offer list backing one side of this market
    pub fn offer_list(&self, side: BookSide) -> OfferList {
        match side {
            BookSide::Asks => OfferList {
                outbound: self.base.clone(),
                inbound: self.quote.clone(),
            },
            BookSide::Bids => OfferList {
                outbound: self.quote.clone(),
                inbound: self.base.clone(),
            },
        }
    }

    /// Split `gives`/`wants` of an offer on `side` into (base, quote) volumes
    pub fn base_quote_volumes(
        &self,
        side: BookSide,
        gives: Quantity,
        wants: Quantity,
    ) -> (Quantity, Quantity) {
        match side {
            BookSide::Asks => (gives, wants),
            BookSide::Bids => (wants, gives),
        }
    }

    /// Quote-per-base price of an offer on `side`
    ///
    /// `None` when the base volume is zero or the quotient overflows.
    pub fn price(&self, side: BookSide, gives: Quantity, wants: Quantity) -> Option<Price> {
        let (base, quote) = self.base_quote_volumes(side, gives, wants);
        Price::ratio(quote, base)
    }
}
