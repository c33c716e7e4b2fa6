//! Live cached book for one side of a market
//!
//! `Semibook::connect` is the only way to obtain a book. It runs the whole
//! activation sequence before returning:
//!
//! 1. subscribe to change events (from here on nothing is missed)
//! 2. fix the reference block `R`
//! 3. read the snapshot prefix as of `R`
//! 4. replay buffered events newer than `R`
//!
//! and then hands the event stream to a background task that applies each
//! event as it arrives. Events reaching the subscription during steps 2-3
//! are pulled into the activation buffer so they never sit unbounded in the
//! transport.
//!
//! Every mutation runs under the write lock and never awaits, so readers
//! always observe the store between two whole events.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use types::ids::{BlockNumber, OfferId};
use types::market::{BookSide, Market, OfferList};
use types::offer::Offer;

use crate::config::BookOptions;
use crate::error::SemibookError;
use crate::events::{BookUpdate, RawEvent};
use crate::snapshot;
use crate::source::{EventSubscriber, OfferListReader, SourceError, Subscription, SubscriptionId};
use crate::state::{Applied, BookState, BookStats, Lifecycle};

/// Consumer callback, invoked once per applied insert or removal.
pub type UpdateCallback = Box<dyn FnMut(BookUpdate) + Send>;

/// Handle to a live cached book.
///
/// Dropping the handle stops event processing and unsubscribes, like
/// `disconnect`, but discards any error the event task hit.
pub struct Semibook {
    market: Market,
    side: BookSide,
    reference: BlockNumber,
    /// Whether the snapshot reached the end of the remote list
    complete: bool,
    state: Arc<RwLock<BookState>>,
    subscriber: Arc<dyn EventSubscriber>,
    subscription: Option<SubscriptionId>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), SemibookError>>>,
}

impl Semibook {
    /// Subscribe, load the snapshot and start applying events.
    ///
    /// Transport failures during activation are returned as-is; the
    /// subscription is released before returning.
    pub async fn connect<F>(
        market: Market,
        side: BookSide,
        options: BookOptions,
        reader: Arc<dyn OfferListReader>,
        subscriber: Arc<dyn EventSubscriber>,
        on_update: F,
    ) -> Result<Self, SemibookError>
    where
        F: FnMut(BookUpdate) + Send + 'static,
    {
        options.validate()?;
        let list = market.offer_list(side);

        let Subscription { id, mut events } = subscriber.subscribe(&list).await?;
        let mut state = BookState::arm(market.clone(), side, &options);

        let (updates, complete) =
            match activate(&mut state, reader.as_ref(), &list, &options, &mut events).await {
                Ok(activated) => activated,
                Err(err) => {
                    if err.is_transport() {
                        warn!(side = %side, list = %list, error = %err, "Semibook activation interrupted by transport");
                    } else {
                        error!(side = %side, list = %list, error = %err, "Semibook activation failed");
                    }
                    subscriber.unsubscribe(id);
                    return Err(err);
                }
            };

        let reference = state.reference().unwrap_or_default();
        info!(
            side = %side,
            market = %market.id(),
            reference = %reference,
            offers = state.store().len(),
            complete,
            "Semibook connected"
        );

        let mut on_update: UpdateCallback = Box::new(on_update);
        for update in updates {
            on_update(update);
        }

        let state = Arc::new(RwLock::new(state));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(state.clone(), events, shutdown_rx, on_update));

        Ok(Self {
            market,
            side,
            reference,
            complete,
            state,
            subscriber,
            subscription: Some(id),
            shutdown: Some(shutdown_tx),
            task: Some(task),
        })
    }

    /// Cached offers from best to the end of the prefix.
    pub async fn offers(&self) -> Vec<Offer> {
        self.state.read().await.store().to_vec()
    }

    /// Best cached offer.
    pub async fn best(&self) -> Option<Offer> {
        let state = self.state.read().await;
        let store = state.store();
        store.get(store.best()).cloned()
    }

    pub async fn get(&self, id: OfferId) -> Option<Offer> {
        self.state.read().await.store().get(id).cloned()
    }

    /// Number of cached offers.
    pub async fn len(&self) -> usize {
        self.state.read().await.store().len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.store().is_empty()
    }

    pub async fn offer_gasbase(&self) -> u64 {
        self.state.read().await.offer_gasbase()
    }

    /// Current lifecycle state; `Failed` once the event task hit a fatal
    /// error.
    pub async fn state(&self) -> Lifecycle {
        self.state.read().await.lifecycle()
    }

    /// Whether events are still being applied.
    pub async fn is_live(&self) -> bool {
        matches!(self.state().await, Lifecycle::Active { .. })
    }

    pub async fn stats(&self) -> BookStats {
        self.state.read().await.stats()
    }

    /// SHA-256 of the cached prefix.
    pub async fn checksum(&self) -> String {
        self.state.read().await.store().checksum()
    }

    /// Block the snapshot was read at.
    pub fn reference_point(&self) -> BlockNumber {
        self.reference
    }

    /// Whether the whole remote list fit in the initial snapshot.
    ///
    /// When false, offers past the cached prefix exist remotely and writes
    /// landing behind the tail are skipped.
    pub fn snapshot_complete(&self) -> bool {
        self.complete
    }

    pub fn side(&self) -> BookSide {
        self.side
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Stop applying events and release the subscription.
    ///
    /// Returns the fatal error that stopped the event task, if any. The
    /// store keeps its last consistent state until the handle is dropped.
    pub async fn disconnect(mut self) -> Result<(), SemibookError> {
        if let Some(shutdown) = self.shutdown.take() {
            // The task may have exited already
            let _ = shutdown.send(());
        }
        let result = match self.task.take() {
            Some(task) => match task.await {
                Ok(result) => result,
                Err(e) => Err(SemibookError::TaskFailed(e.to_string())),
            },
            None => Ok(()),
        };
        if let Some(id) = self.subscription.take() {
            self.subscriber.unsubscribe(id);
        }
        info!(side = %self.side, market = %self.market.id(), "Semibook disconnected");
        result
    }
}

impl Drop for Semibook {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(id) = self.subscription.take() {
            self.subscriber.unsubscribe(id);
        }
    }
}

/// Steps 2-4 of activation. Returns the replayed updates and whether the
/// snapshot covers the whole list.
async fn activate(
    state: &mut BookState,
    reader: &dyn OfferListReader,
    list: &OfferList,
    options: &BookOptions,
    events: &mut mpsc::UnboundedReceiver<RawEvent>,
) -> Result<(Vec<BookUpdate>, bool), SemibookError> {
    let reference = buffering(state, events, reader.block_number()).await?;
    let config = buffering(state, events, reader.local_config(list, reference)).await?;
    state.begin_loading(reference, config.offer_gasbase)?;

    let snapshot = buffering(
        state,
        events,
        snapshot::read_prefix(reader, list, options, reference),
    )
    .await?;
    let complete = snapshot.complete;
    let updates = state.complete_loading(snapshot.offers)?;
    Ok((updates, complete))
}

/// Drive `fut` to completion, buffering every event that arrives meanwhile.
///
/// Events already delivered are buffered before `fut` is polled again.
async fn buffering<T, F>(
    state: &mut BookState,
    events: &mut mpsc::UnboundedReceiver<RawEvent>,
    fut: F,
) -> Result<T, SemibookError>
where
    F: Future<Output = Result<T, SourceError>>,
{
    tokio::pin!(fut);
    loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => state.buffer(event)?,
            result = &mut fut => return result.map_err(SemibookError::from),
        }
    }
}

/// Steady state: apply events one at a time until shut down or failed.
async fn run(
    state: Arc<RwLock<BookState>>,
    mut events: mpsc::UnboundedReceiver<RawEvent>,
    mut shutdown: oneshot::Receiver<()>,
    mut on_update: UpdateCallback,
) -> Result<(), SemibookError> {
    loop {
        let event = tokio::select! {
            biased;
            _ = &mut shutdown => {
                debug!("Semibook event task shutting down");
                return Ok(());
            }
            event = events.recv() => event,
        };

        let Some(event) = event else {
            let mut state = state.write().await;
            warn!(side = %state.side(), "Event stream closed by transport");
            return Err(state.fail(SourceError::SubscriptionClosed.into()));
        };

        // Guard is released before the consumer runs
        let applied = state.write().await.handle_event(event);
        match applied {
            Ok(Applied::Update(update)) => on_update(update),
            Ok(_) => {}
            Err(err) => {
                error!(error = %err, "Semibook stopped on fatal event");
                return Err(err);
            }
        }
    }
}
