//! Activation buffer
//!
//! Holds events that arrive between subscribing and finishing the snapshot
//! read. The buffer is drained exactly once, when the book turns active;
//! events at or before the snapshot's reference block are already part of
//! the snapshot and are dropped at that point.
//!
//! Arrival order is preserved. Events are never re-sorted: the transport
//! delivers them in the order the remote emitted them, and that order is
//! what must be replayed.

use std::collections::VecDeque;

use tracing::{debug, error, info};
use types::ids::BlockNumber;

use crate::error::SemibookError;
use crate::events::RawEvent;

/// Queue of events held back during activation.
#[derive(Debug)]
pub struct EventBuffer {
    events: VecDeque<RawEvent>,
    capacity: usize,
    /// Total events buffered since creation.
    events_buffered: u64,
    /// Total events dropped as already covered by the snapshot.
    events_stale: u64,
}

impl EventBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            events: VecDeque::new(),
            capacity,
            events_buffered: 0,
            events_stale: 0,
        }
    }

    /// Queue one event.
    ///
    /// Events are never dropped here; a full buffer is an error.
    pub fn push(&mut self, event: RawEvent) -> Result<(), SemibookError> {
        if self.events.len() >= self.capacity {
            error!(
                capacity = self.capacity,
                block = %event.block_number,
                "Activation buffer overflow, rejecting event"
            );
            return Err(SemibookError::BufferOverflow {
                capacity: self.capacity,
            });
        }

        debug!(
            block = %event.block_number,
            name = %event.name,
            buffered = self.events.len() + 1,
            "Event buffered during activation"
        );

        self.events_buffered += 1;
        self.events.push_back(event);
        Ok(())
    }

    /// Take every buffered event strictly after `reference`, in arrival
    /// order, leaving the buffer empty.
    pub fn drain_after(&mut self, reference: BlockNumber) -> Vec<RawEvent> {
        let total = self.events.len();
        let fresh: Vec<RawEvent> = self
            .events
            .drain(..)
            .filter(|e| e.block_number > reference)
            .collect();
        let stale = (total - fresh.len()) as u64;
        self.events_stale += stale;

        info!(
            reference = %reference,
            released = fresh.len(),
            stale,
            "Activation buffer drained"
        );

        fresh
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn events_buffered(&self) -> u64 {
        self.events_buffered
    }

    pub fn events_stale(&self) -> u64 {
        self.events_stale
    }
}
