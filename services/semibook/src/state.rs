//! Reconciliation state machine
//!
//! Merges one snapshot and the live event stream into an `OfferStore`.
//!
//! Lifecycle:
//!
//! ```text
//!  Arming ──begin_loading(R)──► Loading{R} ──complete_loading──► Active{R}
//!    │ buffer events              │ buffer events                  │ apply events
//!    └────────────────────────────┴──────── fail ──────────────────┴──► Failed
//! ```
//!
//! Events received before `Active` are buffered, never applied. The buffer
//! is drained once, on entering `Active`, dropping events at or before the
//! reference block `R`. Every call out of order is a `Lifecycle` error.

use tracing::{debug, error, info};
use types::ids::{Address, BlockNumber, OfferId};
use types::market::{BookSide, Market};
use types::offer::{Offer, RawOffer};

use crate::buffer::EventBuffer;
use crate::config::BookOptions;
use crate::error::SemibookError;
use crate::events::{BookEvent, BookUpdate, RawEvent, TakerFill, UpdateKind};
use crate::store::OfferStore;

/// Where a book is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    /// Subscribed, reference block not yet fixed
    Arming,
    /// Snapshot read in progress at `reference`
    Loading { reference: BlockNumber },
    /// Applying events directly
    Active { reference: BlockNumber },
    /// Stopped by a fatal error
    Failed,
}

impl Lifecycle {
    pub fn label(&self) -> &'static str {
        match self {
            Lifecycle::Arming => "arming",
            Lifecycle::Loading { .. } => "loading",
            Lifecycle::Active { .. } => "active",
            Lifecycle::Failed => "failed",
        }
    }
}

/// Outcome of handling one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Applied {
    /// Structural change, forwarded to the consumer
    Update(BookUpdate),
    /// Configuration changed, store untouched
    Reconfigured,
    /// Insert outside the prefix, or removal of an untracked id
    Skipped,
    /// At or before the reference block; already in the snapshot
    Stale,
}

/// Event counters of one book.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BookStats {
    pub events_applied: u64,
    pub events_skipped: u64,
    pub events_stale: u64,
}

/// Cache state of one side of a market.
#[derive(Debug)]
pub struct BookState {
    market: Market,
    side: BookSide,
    lifecycle: Lifecycle,
    store: OfferStore,
    buffer: EventBuffer,
    offer_gasbase: u64,
    stats: BookStats,
}

impl BookState {
    /// Start a book in `Arming`; the caller has just subscribed.
    pub(crate) fn arm(market: Market, side: BookSide, options: &BookOptions) -> Self {
        debug!(side = %side, market = %market.id(), "Book arming");
        Self {
            market,
            side,
            lifecycle: Lifecycle::Arming,
            store: OfferStore::new(),
            buffer: EventBuffer::new(options.buffer_capacity),
            offer_gasbase: 0,
            stats: BookStats::default(),
        }
    }

    /// Fix the reference block the snapshot will be read at.
    pub(crate) fn begin_loading(
        &mut self,
        reference: BlockNumber,
        offer_gasbase: u64,
    ) -> Result<(), SemibookError> {
        if self.lifecycle != Lifecycle::Arming {
            return Err(self.misuse("begin loading"));
        }
        self.offer_gasbase = offer_gasbase;
        self.lifecycle = Lifecycle::Loading { reference };
        info!(side = %self.side, reference = %reference, offer_gasbase, "Book loading");
        Ok(())
    }

    /// Hold back an event that arrived before the book is active.
    pub(crate) fn buffer(&mut self, event: RawEvent) -> Result<(), SemibookError> {
        match self.lifecycle {
            Lifecycle::Arming | Lifecycle::Loading { .. } => self.buffer.push(event),
            _ => Err(self.misuse("buffer events")),
        }
    }

    /// Populate the store from the snapshot, turn active and replay the
    /// buffered events that are newer than the snapshot.
    ///
    /// Returns the updates produced by the replayed events, in order.
    pub(crate) fn complete_loading(
        &mut self,
        offers: Vec<RawOffer>,
    ) -> Result<Vec<BookUpdate>, SemibookError> {
        let reference = match self.lifecycle {
            Lifecycle::Loading { reference } => reference,
            _ => return Err(self.misuse("complete loading")),
        };

        let offers = offers
            .into_iter()
            .map(|raw| Offer::from_raw(raw, &self.market, self.side))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.fail(e.into()))?;
        self.store = OfferStore::from_prefix(offers);
        self.lifecycle = Lifecycle::Active { reference };

        let pending = self.buffer.drain_after(reference);
        self.stats.events_stale += self.buffer.events_stale();

        let mut updates = Vec::new();
        for event in pending {
            if let Applied::Update(update) = self.handle_event(event)? {
                updates.push(update);
            }
        }

        info!(
            side = %self.side,
            reference = %reference,
            offers = self.store.len(),
            buffered = self.buffer.events_buffered(),
            replayed = updates.len(),
            "Book active"
        );
        Ok(updates)
    }

    /// Apply one event to an active book.
    ///
    /// Fatal errors move the book to `Failed`; no further events are
    /// accepted afterwards.
    pub(crate) fn handle_event(&mut self, event: RawEvent) -> Result<Applied, SemibookError> {
        let reference = match self.lifecycle {
            Lifecycle::Active { reference } => reference,
            _ => return Err(self.misuse("apply events")),
        };

        if event.block_number <= reference {
            self.stats.events_stale += 1;
            debug!(side = %self.side, block = %event.block_number, "Ignoring event covered by snapshot");
            return Ok(Applied::Stale);
        }

        let block = event.block_number;
        let decoded = event.decode().map_err(|e| self.fail(e))?;
        debug!(
            side = %self.side,
            block = %block,
            event = decoded.name(),
            offer_id = ?decoded.offer_id(),
            "Applying event"
        );
        let applied = self.apply(decoded, block).map_err(|e| self.fail(e))?;

        match applied {
            Applied::Update(_) => self.stats.events_applied += 1,
            Applied::Skipped => self.stats.events_skipped += 1,
            Applied::Reconfigured | Applied::Stale => {}
        }
        Ok(applied)
    }

    fn apply(&mut self, event: BookEvent, block: BlockNumber) -> Result<Applied, SemibookError> {
        match event {
            BookEvent::OfferWrite {
                id,
                prev,
                maker,
                gives,
                wants,
                gasreq,
                gasprice,
            } => {
                // The offer may be outside the cache but enter it now; or
                // it may leave the cache. Remove first either way.
                self.store.remove(id);

                // The successor comes from the cache, not from the event:
                // the remote's view of it may be stale by now
                let next = match self.store.next_of(prev) {
                    Some(next) if prev != id => next,
                    _ => {
                        debug!(
                            side = %self.side,
                            offer_id = %id,
                            prev = %prev,
                            "Insertion point outside cached prefix; skipping"
                        );
                        return Ok(Applied::Skipped);
                    }
                };

                let raw = RawOffer {
                    id,
                    prev,
                    next,
                    maker,
                    gives,
                    wants,
                    gasreq,
                    gasprice,
                    offer_gasbase: self.offer_gasbase,
                };
                let offer = Offer::from_raw(raw, &self.market, self.side)?;
                if offer.price.is_none() {
                    debug!(side = %self.side, offer_id = %id, "Offer price outside decimal range");
                }
                self.store.insert(offer.clone());

                debug!(side = %self.side, offer_id = %id, prev = %prev, next = %next, "Offer written");
                Ok(Applied::Update(self.update(UpdateKind::OfferWrite, offer, None, block)))
            }

            BookEvent::OfferSuccess {
                id,
                taker,
                taker_wants,
                taker_gives,
            } => {
                let fill = self.taker_fill(taker, taker_wants, taker_gives, None)?;
                Ok(self.removal(UpdateKind::OfferSuccess, id, Some(fill), block))
            }

            BookEvent::OfferFail {
                id,
                taker,
                taker_wants,
                taker_gives,
                mgv_data,
            } => {
                let fill = self.taker_fill(taker, taker_wants, taker_gives, Some(mgv_data))?;
                Ok(self.removal(UpdateKind::OfferFail, id, Some(fill), block))
            }

            BookEvent::OfferRetract { id } => {
                Ok(self.removal(UpdateKind::OfferRetract, id, None, block))
            }

            BookEvent::SetGasbase { offer_gasbase } => {
                info!(side = %self.side, offer_gasbase, "Offer gasbase updated");
                self.offer_gasbase = offer_gasbase;
                Ok(Applied::Reconfigured)
            }
        }
    }

    fn removal(
        &mut self,
        kind: UpdateKind,
        id: OfferId,
        taker: Option<TakerFill>,
        block: BlockNumber,
    ) -> Applied {
        match self.store.remove(id) {
            Some(offer) => {
                debug!(side = %self.side, offer_id = %id, kind = ?kind, "Offer removed");
                Applied::Update(self.update(kind, offer, taker, block))
            }
            None => {
                debug!(side = %self.side, offer_id = %id, "Removal of untracked offer ignored");
                Applied::Skipped
            }
        }
    }

    fn taker_fill(
        &self,
        taker: Address,
        taker_wants: u128,
        taker_gives: u128,
        failure: Option<String>,
    ) -> Result<TakerFill, SemibookError> {
        let list = self.market.offer_list(self.side);
        Ok(TakerFill {
            taker,
            taker_wants: list.outbound.from_units(taker_wants)?,
            taker_gives: list.inbound.from_units(taker_gives)?,
            failure,
        })
    }

    fn update(
        &self,
        kind: UpdateKind,
        offer: Offer,
        taker: Option<TakerFill>,
        block: BlockNumber,
    ) -> BookUpdate {
        BookUpdate {
            kind,
            side: self.side,
            offer,
            taker,
            block,
        }
    }

    fn misuse(&self, operation: &'static str) -> SemibookError {
        SemibookError::Lifecycle {
            operation,
            state: self.lifecycle.label(),
        }
    }

    /// Record a fatal error and hand it back.
    pub(crate) fn fail(&mut self, err: SemibookError) -> SemibookError {
        if self.lifecycle != Lifecycle::Failed {
            error!(side = %self.side, error = %err, "Book failed");
        }
        self.lifecycle = Lifecycle::Failed;
        err
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle
    }

    /// Reference block, once fixed.
    pub fn reference(&self) -> Option<BlockNumber> {
        match self.lifecycle {
            Lifecycle::Loading { reference } | Lifecycle::Active { reference } => Some(reference),
            _ => None,
        }
    }

    pub fn store(&self) -> &OfferStore {
        &self.store
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    pub fn offer_gasbase(&self) -> u64 {
        self.offer_gasbase
    }

    pub fn stats(&self) -> BookStats {
        self.stats
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }
}
