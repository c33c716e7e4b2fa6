//! In-memory remote shared by the integration tests
//!
//! Serves offer lists page by page and fans events out to subscribers.
//! Events can be queued to fire while the book reads the block number or
//! its first snapshot page, to reproduce races with activation.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use semibook::events::{BookUpdate, RawEvent};
use semibook::semibook::Semibook;
use semibook::source::{
    EventSubscriber, LocalConfig, OfferListReader, OfferPage, SourceError, Subscription,
    SubscriptionId,
};
use semibook::state::{BookStats, Lifecycle};
use serde_json::json;
use tokio::sync::mpsc;
use types::ids::{Address, BlockNumber, OfferId};
use types::market::{Market, OfferList};
use types::numeric::Token;
use types::offer::RawOffer;

pub fn market() -> Market {
    Market::new(Token::new("WETH", 0).unwrap(), Token::new("USDC", 0).unwrap())
}

/// Offers linked in the given order, best first.
pub fn chain(ids: &[u32]) -> Vec<RawOffer> {
    ids.iter()
        .enumerate()
        .map(|(i, &id)| RawOffer {
            id: OfferId::new(id),
            prev: if i == 0 { OfferId::NONE } else { OfferId::new(ids[i - 1]) },
            next: ids.get(i + 1).map(|&n| OfferId::new(n)).unwrap_or(OfferId::NONE),
            maker: Address::new("0xmaker"),
            gives: 10,
            wants: 20,
            gasreq: 100_000,
            gasprice: 3,
            offer_gasbase: 0,
        })
        .collect()
}

pub fn write(block: u64, id: u32, prev: u32) -> RawEvent {
    RawEvent::new(
        block,
        "OfferWrite",
        json!({ "id": id, "prev": prev, "maker": "0xmaker", "gives": 10, "wants": 20,
                "gasreq": 100000, "gasprice": 3 }),
    )
}

pub fn retract(block: u64, id: u32) -> RawEvent {
    RawEvent::new(block, "OfferRetract", json!({ "id": id }))
}

pub fn success(block: u64, id: u32) -> RawEvent {
    RawEvent::new(
        block,
        "OfferSuccess",
        json!({ "id": id, "taker": "0xtaker", "taker_wants": 10, "taker_gives": 20 }),
    )
}

#[derive(Default)]
struct ListState {
    offers: Vec<RawOffer>,
    offer_gasbase: u64,
    pages_served: usize,
}

#[derive(Default)]
struct Inner {
    block: u64,
    lists: HashMap<OfferList, ListState>,
    subscriptions: BTreeMap<u64, (OfferList, mpsc::UnboundedSender<RawEvent>)>,
    next_subscription: u64,
    unsubscribed: Vec<SubscriptionId>,
    calls: Vec<String>,
    page_requests: Vec<usize>,
    config_reads: Vec<BlockNumber>,
    on_block_number: Vec<(OfferList, RawEvent)>,
    on_first_page: Vec<(OfferList, RawEvent)>,
    failing_lists: HashSet<OfferList>,
}

impl Inner {
    fn emit(&self, list: &OfferList, event: RawEvent) {
        for (subscribed, tx) in self.subscriptions.values() {
            if subscribed == list {
                let _ = tx.send(event.clone());
            }
        }
    }
}

/// Remote offer-list store answering reads and streaming events.
#[derive(Default)]
pub struct MockRemote {
    inner: Mutex<Inner>,
}

impl MockRemote {
    pub fn new(block: u64) -> Arc<Self> {
        let remote = Self::default();
        remote.inner.lock().unwrap().block = block;
        Arc::new(remote)
    }

    /// Set the list content as of the current block.
    pub fn set_list(&self, list: &OfferList, offers: Vec<RawOffer>, offer_gasbase: u64) {
        let mut inner = self.inner.lock().unwrap();
        let state = inner.lists.entry(list.clone()).or_default();
        state.offers = offers;
        state.offer_gasbase = offer_gasbase;
    }

    /// Deliver an event to every subscriber of `list` now.
    pub fn emit(&self, list: &OfferList, event: RawEvent) {
        self.inner.lock().unwrap().emit(list, event);
    }

    /// Deliver `event` while the book asks for the block number.
    pub fn emit_during_block_number(&self, list: &OfferList, event: RawEvent) {
        self.inner
            .lock()
            .unwrap()
            .on_block_number
            .push((list.clone(), event));
    }

    /// Deliver `event` while the book reads its first snapshot page.
    pub fn emit_during_snapshot(&self, list: &OfferList, event: RawEvent) {
        self.inner
            .lock()
            .unwrap()
            .on_first_page
            .push((list.clone(), event));
    }

    /// Make every snapshot read of `list` fail.
    pub fn fail_reads(&self, list: &OfferList) {
        self.inner.lock().unwrap().failing_lists.insert(list.clone());
    }

    /// Drop every event sender, as a transport losing its connection would.
    pub fn close_subscriptions(&self) {
        self.inner.lock().unwrap().subscriptions.clear();
    }

    pub fn active_subscriptions(&self) -> usize {
        self.inner.lock().unwrap().subscriptions.len()
    }

    pub fn unsubscribed(&self) -> Vec<SubscriptionId> {
        self.inner.lock().unwrap().unsubscribed.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn page_requests(&self) -> Vec<usize> {
        self.inner.lock().unwrap().page_requests.clone()
    }

    pub fn config_reads(&self) -> Vec<BlockNumber> {
        self.inner.lock().unwrap().config_reads.clone()
    }
}

#[async_trait]
impl OfferListReader for MockRemote {
    async fn block_number(&self) -> Result<BlockNumber, SourceError> {
        let (block, raced) = {
            let mut inner = self.inner.lock().unwrap();
            inner.calls.push("block_number".to_string());
            let racing = std::mem::take(&mut inner.on_block_number);
            let raced = !racing.is_empty();
            for (list, event) in racing {
                inner.emit(&list, event);
            }
            (inner.block, raced)
        };
        if raced {
            // Answer only after the book had a chance to see the events
            tokio::task::yield_now().await;
        }
        Ok(BlockNumber::new(block))
    }

    async fn local_config(
        &self,
        list: &OfferList,
        at: BlockNumber,
    ) -> Result<LocalConfig, SourceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("local_config".to_string());
        inner.config_reads.push(at);
        let offer_gasbase = inner.lists.get(list).map(|l| l.offer_gasbase).unwrap_or(0);
        Ok(LocalConfig { offer_gasbase })
    }

    async fn offer_list(
        &self,
        list: &OfferList,
        from: OfferId,
        page_size: usize,
        _at: BlockNumber,
    ) -> Result<OfferPage, SourceError> {
        let page = self.read_page(list, from, page_size);
        if let Ok((_, true)) = page {
            tokio::task::yield_now().await;
        }
        page.map(|(page, _)| page)
    }
}

impl MockRemote {
    /// Serve one page, reporting whether racing events were emitted.
    fn read_page(
        &self,
        list: &OfferList,
        from: OfferId,
        page_size: usize,
    ) -> Result<(OfferPage, bool), SourceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("offer_list".to_string());
        inner.page_requests.push(page_size);

        if inner.failing_lists.contains(list) {
            return Err(SourceError::Transport(format!("read of {} refused", list)));
        }

        let mut raced = false;
        let first = inner.lists.get(list).map(|l| l.pages_served == 0).unwrap_or(true);
        if first {
            let (racing, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut inner.on_first_page)
                .into_iter()
                .partition(|(l, _)| l == list);
            inner.on_first_page = rest;
            raced = !racing.is_empty();
            for (l, event) in racing {
                inner.emit(&l, event);
            }
        }

        let state = inner.lists.entry(list.clone()).or_default();
        state.pages_served += 1;
        let start = if from.is_none() {
            0
        } else {
            state
                .offers
                .iter()
                .position(|o| o.id == from)
                .unwrap_or(state.offers.len())
        };
        let offers: Vec<RawOffer> = state.offers.iter().skip(start).take(page_size).cloned().collect();
        let next = state
            .offers
            .get(start + offers.len())
            .map(|o| o.id)
            .unwrap_or(OfferId::NONE);
        Ok((OfferPage { next, offers }, raced))
    }
}

#[async_trait]
impl EventSubscriber for MockRemote {
    async fn subscribe(&self, list: &OfferList) -> Result<Subscription, SourceError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push("subscribe".to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        inner.next_subscription += 1;
        let id = inner.next_subscription;
        inner.subscriptions.insert(id, (list.clone(), tx));
        Ok(Subscription {
            id: SubscriptionId(id),
            events: rx,
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        let mut inner = self.inner.lock().unwrap();
        inner.subscriptions.remove(&id.0);
        inner.unsubscribed.push(id);
    }
}

/// Channel-backed consumer callback.
pub fn collector() -> (
    impl FnMut(BookUpdate) + Send + 'static,
    mpsc::UnboundedReceiver<BookUpdate>,
) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        move |update| {
            let _ = tx.send(update);
        },
        rx,
    )
}

/// Next consumer notification, failing the test after a second.
pub async fn next_update(rx: &mut mpsc::UnboundedReceiver<BookUpdate>) -> BookUpdate {
    tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for update")
        .expect("update channel closed")
}

/// Poll the book until `check` holds, failing the test after a second.
pub async fn wait_for<F>(book: &Semibook, check: F)
where
    F: Fn(&BookStats, Lifecycle) -> bool,
{
    for _ in 0..200 {
        if check(&book.stats().await, book.state().await) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached");
}
