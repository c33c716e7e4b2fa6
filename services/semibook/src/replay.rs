//! Offline replay of recorded activations
//!
//! A `Recording` captures everything one book saw while connecting: the
//! reference block, the list configuration, the snapshot prefix and every
//! event in arrival order. Replaying it drives the same Arming, Loading and
//! Active protocol synchronously, so a recorded session rebuilds the exact
//! book the live one held.
//!
//! Deterministic: same recording, same checksum.

use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{error, info};
use types::ids::BlockNumber;
use types::market::{BookSide, Market};
use types::offer::{Offer, RawOffer};

use crate::config::BookOptions;
use crate::error::SemibookError;
use crate::events::{BookUpdate, RawEvent};
use crate::state::{Applied, BookState};

/// A captured activation plus the live events that followed it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub market: Market,
    pub side: BookSide,
    pub reference: BlockNumber,
    #[serde(default)]
    pub offer_gasbase: u64,
    pub snapshot: Vec<RawOffer>,
    /// Every event delivered by the subscription, in arrival order,
    /// including those that raced the snapshot read
    #[serde(default)]
    pub events: Vec<RawEvent>,
}

impl Recording {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Metrics collected during replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayMetrics {
    /// Events that changed the store.
    pub events_applied: u64,
    /// Events outside the cached prefix.
    pub events_skipped: u64,
    /// Events already covered by the snapshot.
    pub events_stale: u64,
    pub duration_ms: u128,
    /// Book checksum after replay.
    pub checksum: String,
}

/// Result of a replay.
#[derive(Debug, Clone)]
pub struct ReplayResult {
    /// Linearized book, best first.
    pub offers: Vec<Offer>,
    /// Every consumer notification, in order.
    pub updates: Vec<BookUpdate>,
    pub metrics: ReplayMetrics,
}

/// Rebuilds books from recordings.
pub struct ReplayEngine {
    options: BookOptions,
    /// Expected book checksum for validation (if known).
    expected_checksum: Option<String>,
}

impl ReplayEngine {
    pub fn new(options: BookOptions) -> Self {
        Self {
            options,
            expected_checksum: None,
        }
    }

    /// Set the expected book checksum for post-replay validation.
    pub fn with_expected_checksum(mut self, checksum: impl Into<String>) -> Self {
        self.expected_checksum = Some(checksum.into());
        self
    }

    pub fn replay(&self, recording: &Recording) -> Result<ReplayResult, SemibookError> {
        self.options.validate()?;
        let start = Instant::now();

        info!(
            market = %recording.market.id(),
            side = %recording.side,
            reference = %recording.reference,
            offers = recording.snapshot.len(),
            events = recording.events.len(),
            "Starting replay"
        );

        let mut state = BookState::arm(recording.market.clone(), recording.side, &self.options);
        state.begin_loading(recording.reference, recording.offer_gasbase)?;

        // Everything is buffered up front; the buffer hands back what is
        // newer than the snapshot once it lands
        let mut events = recording.events.iter().cloned();
        for event in events.by_ref().take(self.options.buffer_capacity) {
            state.buffer(event)?;
        }

        let snapshot: Vec<RawOffer> = recording
            .snapshot
            .iter()
            .take(self.options.max_offers)
            .cloned()
            .collect();
        let mut updates = state.complete_loading(snapshot)?;

        for event in events {
            if let Applied::Update(update) = state.handle_event(event)? {
                updates.push(update);
            }
        }

        let checksum = state.store().checksum();
        if let Some(ref expected) = self.expected_checksum {
            if &checksum != expected {
                error!(
                    expected = %expected,
                    actual = %checksum,
                    "Book checksum mismatch after replay"
                );
                return Err(SemibookError::ChecksumMismatch {
                    expected: expected.clone(),
                    actual: checksum,
                });
            }
        }

        let stats = state.stats();
        let metrics = ReplayMetrics {
            events_applied: stats.events_applied,
            events_skipped: stats.events_skipped,
            events_stale: stats.events_stale,
            duration_ms: start.elapsed().as_millis(),
            checksum,
        };

        info!(
            events_applied = metrics.events_applied,
            events_skipped = metrics.events_skipped,
            events_stale = metrics.events_stale,
            duration_ms = metrics.duration_ms,
            "Replay completed successfully"
        );

        Ok(ReplayResult {
            offers: state.store().to_vec(),
            updates,
            metrics,
        })
    }
}

impl Default for ReplayEngine {
    fn default() -> Self {
        Self::new(BookOptions::default())
    }
}
