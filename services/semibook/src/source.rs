//! Boundary to the remote offer-list store
//!
//! Two collaborators feed a book: a reader answering point-in-time queries
//! and a subscriber streaming change events. Both are implemented by the
//! transport layer; this crate only consumes them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use types::ids::{BlockNumber, OfferId};
use types::market::OfferList;
use types::offer::RawOffer;

use crate::events::RawEvent;

/// Transport failures of the remote collaborators.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("subscription closed")]
    SubscriptionClosed,
}

/// Per-list configuration read alongside the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalConfig {
    pub offer_gasbase: u64,
}

/// One page of a paginated offer-list read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferPage {
    /// Cursor for the next page; `OfferId::NONE` once the list is exhausted
    pub next: OfferId,
    /// Consecutive offers in list order
    pub offers: Vec<RawOffer>,
}

/// Point-in-time queries against the remote store.
#[async_trait]
pub trait OfferListReader: Send + Sync {
    /// Current head of the remote ledger.
    async fn block_number(&self) -> Result<BlockNumber, SourceError>;

    /// Per-list configuration as of block `at`.
    async fn local_config(&self, list: &OfferList, at: BlockNumber) -> Result<LocalConfig, SourceError>;

    /// Read up to `page_size` offers starting at `from` (`NONE` = head),
    /// as of block `at`.
    async fn offer_list(
        &self,
        list: &OfferList,
        from: OfferId,
        page_size: usize,
        at: BlockNumber,
    ) -> Result<OfferPage, SourceError>;
}

/// Handle identifying a live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A live event subscription.
///
/// Events queue up in `events` from the moment `subscribe` returns, whether
/// or not anyone is reading yet.
#[derive(Debug)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub events: mpsc::UnboundedReceiver<RawEvent>,
}

/// Source of change events for offer lists.
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    async fn subscribe(&self, list: &OfferList) -> Result<Subscription, SourceError>;

    /// Stop delivering events for `id`. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}
