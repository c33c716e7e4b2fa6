//! Offer records
//!
//! `RawOffer` is an entry exactly as the remote list reports it, with
//! amounts in raw token units. `Offer` is the typed record kept in caches,
//! with amounts in human units and the derived volume and price.

use serde::{Deserialize, Serialize};

use crate::errors::OfferError;
use crate::ids::{Address, OfferId};
use crate::market::{BookSide, Market};
use crate::numeric::{Price, Quantity};

/// One remote offer-list entry in wire form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawOffer {
    pub id: OfferId,
    pub prev: OfferId,
    pub next: OfferId,
    pub maker: Address,
    /// Amount of outbound token offered, raw units
    pub gives: u128,
    /// Amount of inbound token wanted, raw units
    pub wants: u128,
    pub gasreq: u64,
    pub gasprice: u64,
    pub offer_gasbase: u64,
}

/// One cached offer-list entry
///
/// Everything but the `prev`/`next` links is fixed once read; the links are
/// rewritten as neighbors come and go.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    pub id: OfferId,
    pub prev: OfferId,
    pub next: OfferId,
    pub maker: Address,
    pub gives: Quantity,
    pub wants: Quantity,
    /// Base-token volume
    pub volume: Quantity,
    /// Quote per base; `None` when the ratio is outside the decimal range
    pub price: Option<Price>,
    pub gasreq: u64,
    pub gasprice: u64,
    pub offer_gasbase: u64,
}

impl Offer {
    /// Build a typed offer from its wire form
    ///
    /// Rejects offers with zero base volume: the remote list never holds
    /// such an entry, so seeing one means the producer is broken.
    pub fn from_raw(raw: RawOffer, market: &Market, side: BookSide) -> Result<Self, OfferError> {
        let list = market.offer_list(side);
        let gives = list.outbound.from_units(raw.gives)?;
        let wants = list.inbound.from_units(raw.wants)?;

        let (volume, _) = market.base_quote_volumes(side, gives, wants);
        if volume.is_zero() {
            return Err(OfferError::ZeroVolume { id: raw.id });
        }
        let price = market.price(side, gives, wants);

        Ok(Self {
            id: raw.id,
            prev: raw.prev,
            next: raw.next,
            maker: raw.maker,
            gives,
            wants,
            volume,
            price,
            gasreq: raw.gasreq,
            gasprice: raw.gasprice,
            offer_gasbase: raw.offer_gasbase,
        })
    }
}
