//! Change events for one offer list
//!
//! `RawEvent` is what the subscription transport delivers: a block-tagged
//! log with an event name and untyped arguments. It is decoded into the
//! closed `BookEvent` enum only once it is known to be newer than the
//! snapshot. An unknown name means the remote speaks a protocol version we
//! do not understand, which is fatal.
//!
//! `BookUpdate` is the notification handed to the consumer for every
//! applied insert or removal.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;
use types::ids::{Address, BlockNumber, OfferId};
use types::market::BookSide;
use types::numeric::Quantity;
use types::offer::Offer;

use crate::error::SemibookError;

/// A change event in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    /// Block the event occurred in
    pub block_number: BlockNumber,
    /// Position of the event within its block
    #[serde(default)]
    pub log_index: u32,
    /// Event name
    pub name: String,
    /// Event arguments, decoded according to `name`
    #[serde(default)]
    pub args: serde_json::Value,
}

impl RawEvent {
    pub fn new(block_number: impl Into<BlockNumber>, name: &str, args: serde_json::Value) -> Self {
        Self {
            block_number: block_number.into(),
            log_index: 0,
            name: name.to_string(),
            args,
        }
    }

    /// Decode the arguments into a typed event.
    pub fn decode(self) -> Result<BookEvent, SemibookError> {
        if !BookEvent::NAMES.contains(&self.name.as_str()) {
            return Err(SemibookError::UnknownEvent {
                name: self.name,
                block: self.block_number,
            });
        }
        let name = self.name.clone();
        serde_json::from_value(json!({ "name": self.name, "args": self.args })).map_err(|e| {
            SemibookError::MalformedEvent {
                name,
                reason: e.to_string(),
            }
        })
    }
}

/// Typed change events of an offer list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "name", content = "args")]
pub enum BookEvent {
    /// An offer was created or updated; it now sits right after `prev`.
    OfferWrite {
        id: OfferId,
        prev: OfferId,
        maker: Address,
        #[serde(deserialize_with = "amount")]
        gives: u128,
        #[serde(deserialize_with = "amount")]
        wants: u128,
        gasreq: u64,
        gasprice: u64,
    },

    /// An offer was taken and executed successfully.
    OfferSuccess {
        id: OfferId,
        taker: Address,
        #[serde(deserialize_with = "amount")]
        taker_wants: u128,
        #[serde(deserialize_with = "amount")]
        taker_gives: u128,
    },

    /// An offer was taken but its execution failed.
    OfferFail {
        id: OfferId,
        taker: Address,
        #[serde(deserialize_with = "amount")]
        taker_wants: u128,
        #[serde(deserialize_with = "amount")]
        taker_gives: u128,
        #[serde(default)]
        mgv_data: String,
    },

    /// An offer was withdrawn by its maker.
    OfferRetract { id: OfferId },

    /// The list's per-offer gas base changed.
    SetGasbase { offer_gasbase: u64 },
}

impl BookEvent {
    pub const NAMES: [&'static str; 5] = [
        "OfferWrite",
        "OfferSuccess",
        "OfferFail",
        "OfferRetract",
        "SetGasbase",
    ];

    /// Event name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            BookEvent::OfferWrite { .. } => "OfferWrite",
            BookEvent::OfferSuccess { .. } => "OfferSuccess",
            BookEvent::OfferFail { .. } => "OfferFail",
            BookEvent::OfferRetract { .. } => "OfferRetract",
            BookEvent::SetGasbase { .. } => "SetGasbase",
        }
    }

    /// Offer the event is about, if any.
    pub fn offer_id(&self) -> Option<OfferId> {
        match self {
            BookEvent::OfferWrite { id, .. }
            | BookEvent::OfferSuccess { id, .. }
            | BookEvent::OfferFail { id, .. }
            | BookEvent::OfferRetract { id } => Some(*id),
            BookEvent::SetGasbase { .. } => None,
        }
    }
}

/// Raw amounts arrive either as JSON numbers or, past `u64`, as decimal strings.
fn amount<'de, D>(deserializer: D) -> Result<u128, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(u64),
        Text(String),
    }

    match Repr::deserialize(deserializer)? {
        Repr::Number(n) => Ok(u128::from(n)),
        Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
    }
}

/// Kind of an applied structural change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateKind {
    OfferWrite,
    OfferSuccess,
    OfferFail,
    OfferRetract,
}

/// Taker-side details of a take (successful or failed).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakerFill {
    pub taker: Address,
    /// Outbound tokens the taker asked for
    pub taker_wants: Quantity,
    /// Inbound tokens the taker paid
    pub taker_gives: Quantity,
    /// Failure reason reported by the remote, for failed takes
    pub failure: Option<String>,
}

/// Notification for one applied insert or removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookUpdate {
    pub kind: UpdateKind,
    pub side: BookSide,
    /// Offer after insertion, or as it was just before removal
    pub offer: Offer,
    pub taker: Option<TakerFill>,
    /// Block of the event that caused the change
    pub block: BlockNumber,
}
