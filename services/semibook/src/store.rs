//! In-memory linked offer store
//!
//! Holds a prefix of a remote offer list as an id-keyed map plus a head
//! pointer. Neighbors are referenced by id, never by owning pointer.
//! Uses `BTreeMap` for deterministic iteration.
//!
//! An id missing from the store is *unknown*: it may have been removed
//! remotely or may simply lie beyond the cached prefix. The store never
//! tries to tell the two apart.
//!
//! Invariants, after every mutation:
//! - `best != NONE` implies `offers[best].prev == NONE`
//! - `offers[x].next == y`, `y` cached implies `offers[y].prev == x`
//! - `offers[x].prev == y`, `y` cached implies `offers[y].next == x`

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};
use types::ids::OfferId;
use types::offer::Offer;

/// Linked prefix of one offer list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OfferStore {
    offers: BTreeMap<OfferId, Offer>,
    /// First offer of the list, `NONE` when empty
    best: OfferId,
}

impl OfferStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from consecutive offers in list order.
    ///
    /// The first offer becomes the head.
    pub fn from_prefix(offers: Vec<Offer>) -> Self {
        let best = offers.first().map(|o| o.id).unwrap_or(OfferId::NONE);
        let offers = offers.into_iter().map(|o| (o.id, o)).collect();
        Self { offers, best }
    }

    /// Id of the first offer, `NONE` when empty.
    pub fn best(&self) -> OfferId {
        self.best
    }

    pub fn get(&self, id: OfferId) -> Option<&Offer> {
        self.offers.get(&id)
    }

    pub fn contains(&self, id: OfferId) -> bool {
        self.offers.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }

    /// Id that follows `prev` according to the cache.
    ///
    /// `prev == NONE` asks for the head. Returns `None` when `prev` is not
    /// cached, i.e. the position lies outside the prefix. The returned id
    /// itself may be uncached.
    pub fn next_of(&self, prev: OfferId) -> Option<OfferId> {
        if prev.is_none() {
            Some(self.best)
        } else {
            self.offers.get(&prev).map(|o| o.next)
        }
    }

    /// Link `offer` in between its `prev` and `next`.
    ///
    /// The caller guarantees that `offer.id` is not cached, that
    /// `offer.prev` is `NONE` or cached, and that `offer.next` is what the
    /// cache has after `offer.prev`.
    pub fn insert(&mut self, offer: Offer) {
        let id = offer.id;
        if offer.prev.is_none() {
            self.best = id;
        } else if let Some(prev) = self.offers.get_mut(&offer.prev) {
            prev.next = id;
        }

        // The successor may lie beyond the prefix
        if let Some(next) = self.offers.get_mut(&offer.next) {
            next.prev = id;
        }

        self.offers.insert(id, offer);
    }

    /// Detach `id` and join its neighbors.
    ///
    /// Returns the removed offer as it was cached, or `None` (and changes
    /// nothing) when `id` is not cached.
    pub fn remove(&mut self, id: OfferId) -> Option<Offer> {
        let offer = self.offers.remove(&id)?;

        // prev == NONE means the offer is best; a missing prev means the
        // offer sits at the start of an uncached stretch
        if offer.prev.is_none() {
            self.best = offer.next;
        } else if let Some(prev) = self.offers.get_mut(&offer.prev) {
            prev.next = offer.next;
        }

        // A missing next covers both the end of the list and the end of
        // the prefix
        if let Some(next) = self.offers.get_mut(&offer.next) {
            next.prev = offer.prev;
        }

        Some(offer)
    }

    /// Offers from the head to the end of the cached prefix.
    pub fn iter(&self) -> PrefixIter<'_> {
        PrefixIter {
            store: self,
            cursor: self.best,
            remaining: self.offers.len(),
        }
    }

    /// Ordered copy of the cached prefix.
    pub fn to_vec(&self) -> Vec<Offer> {
        self.iter().cloned().collect()
    }

    /// Ids of the cached prefix in list order.
    pub fn ids(&self) -> Vec<OfferId> {
        self.iter().map(|o| o.id).collect()
    }

    /// Check the linkage invariants.
    ///
    /// Returns a description of the first violation found.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.best.is_some() {
            match self.offers.get(&self.best) {
                Some(head) if head.prev.is_some() => {
                    return Err(format!("head {} has prev {}", head.id, head.prev));
                }
                _ => {}
            }
        }
        for (id, offer) in &self.offers {
            if let Some(next) = self.offers.get(&offer.next) {
                if next.prev != *id {
                    return Err(format!("{}.next = {} but {}.prev = {}", id, next.id, next.id, next.prev));
                }
            }
            if let Some(prev) = self.offers.get(&offer.prev) {
                if prev.next != *id {
                    return Err(format!("{}.prev = {} but {}.next = {}", id, prev.id, prev.id, prev.next));
                }
            }
        }
        Ok(())
    }

    /// SHA-256 over the linearized prefix.
    ///
    /// Two stores with the same ordered contents hash the same regardless
    /// of how they were built.
    pub fn checksum(&self) -> String {
        let mut hasher = Sha256::new();
        for offer in self.iter() {
            hasher.update(offer.id.get().to_le_bytes());
            hasher.update(offer.prev.get().to_le_bytes());
            hasher.update(offer.next.get().to_le_bytes());
            hasher.update(offer.maker.as_str().as_bytes());
            hasher.update(b":");
            hasher.update(offer.gives.to_string().as_bytes());
            hasher.update(b":");
            hasher.update(offer.wants.to_string().as_bytes());
            hasher.update(offer.gasreq.to_le_bytes());
            hasher.update(offer.gasprice.to_le_bytes());
            hasher.update(offer.offer_gasbase.to_le_bytes());
            hasher.update(b"|");
        }
        format!("{:x}", hasher.finalize())
    }
}

/// Walks `next` pointers from the head until one leaves the cache.
pub struct PrefixIter<'a> {
    store: &'a OfferStore,
    cursor: OfferId,
    /// Bounds the walk even if remote data ever forms a cycle
    remaining: usize,
}

impl<'a> Iterator for PrefixIter<'a> {
    type Item = &'a Offer;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let offer = self.store.offers.get(&self.cursor)?;
        self.cursor = offer.next;
        self.remaining -= 1;
        Some(offer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use types::ids::Address;
    use types::numeric::{Price, Quantity};

    fn offer(id: u32, prev: u32, next: u32) -> Offer {
        let qty = Quantity::new(Decimal::ONE);
        Offer {
            id: OfferId::new(id),
            prev: OfferId::new(prev),
            next: OfferId::new(next),
            maker: Address::new("0xmaker"),
            gives: qty,
            wants: qty,
            volume: qty,
            price: Price::ratio(qty, qty),
            gasreq: 0,
            gasprice: 0,
            offer_gasbase: 0,
        }
    }

    /// 1(head) -> 2 -> 3, all cached
    fn three() -> OfferStore {
        OfferStore::from_prefix(vec![offer(1, 0, 2), offer(2, 1, 3), offer(3, 2, 0)])
    }

    fn ids(store: &OfferStore) -> Vec<u32> {
        store.ids().into_iter().map(OfferId::get).collect()
    }

    #[test]
    fn test_empty_linearization() {
        let store = OfferStore::new();
        assert!(store.best().is_none());
        assert!(store.to_vec().is_empty());
        assert_eq!(store.next_of(OfferId::NONE), Some(OfferId::NONE));
    }

    #[test]
    fn test_from_prefix_sets_head() {
        let store = three();
        assert_eq!(store.best(), OfferId::new(1));
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_middle() {
        let mut store = three();
        let removed = store.remove(OfferId::new(2)).unwrap();
        assert_eq!(removed.id, OfferId::new(2));
        assert_eq!(ids(&store), vec![1, 3]);
        assert_eq!(store.get(OfferId::new(1)).unwrap().next, OfferId::new(3));
        assert_eq!(store.get(OfferId::new(3)).unwrap().prev, OfferId::new(1));
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_head_promotes_successor() {
        let mut store = three();
        store.remove(OfferId::new(1));
        assert_eq!(store.best(), OfferId::new(2));
        assert!(store.get(OfferId::new(2)).unwrap().prev.is_none());
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_remove_unknown_is_noop() {
        let mut store = three();
        let before = store.clone();
        assert!(store.remove(OfferId::new(9)).is_none());
        assert_eq!(store, before);
    }

    #[test]
    fn test_remove_last_of_prefix() {
        // 1 -> 2 -> (5, not cached)
        let mut store = OfferStore::from_prefix(vec![offer(1, 0, 2), offer(2, 1, 5)]);
        store.remove(OfferId::new(2));
        assert_eq!(store.get(OfferId::new(1)).unwrap().next, OfferId::new(5));
        assert_eq!(ids(&store), vec![1]);
    }

    #[test]
    fn test_insert_into_empty() {
        let mut store = OfferStore::new();
        store.insert(offer(5, 0, 0));
        assert_eq!(store.best(), OfferId::new(5));
        assert_eq!(ids(&store), vec![5]);
    }

    #[test]
    fn test_insert_between() {
        let mut store = OfferStore::from_prefix(vec![offer(1, 0, 3), offer(3, 1, 0)]);
        let next = store.next_of(OfferId::new(1)).unwrap();
        store.insert(offer(2, 1, next.get()));
        assert_eq!(ids(&store), vec![1, 2, 3]);
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_insert_after_prefix_end_keeps_uncached_next() {
        let mut store = OfferStore::from_prefix(vec![offer(1, 0, 7)]);
        let next = store.next_of(OfferId::new(1)).unwrap();
        assert_eq!(next, OfferId::new(7));
        store.insert(offer(2, 1, next.get()));
        assert_eq!(ids(&store), vec![1, 2]);
        assert_eq!(store.get(OfferId::new(2)).unwrap().next, OfferId::new(7));
        assert!(store.check_invariants().is_ok());
    }

    #[test]
    fn test_next_of_uncached_prev() {
        assert_eq!(three().next_of(OfferId::new(42)), None);
    }

    #[test]
    fn test_checksum_depends_on_order_only() {
        let mut built = OfferStore::new();
        built.insert(offer(3, 0, 0));
        built.insert(offer(1, 0, 3));
        let next = built.next_of(OfferId::new(1)).unwrap();
        built.insert(offer(2, 1, next.get()));

        assert_eq!(built.checksum(), three().checksum());

        let mut shorter = three();
        shorter.remove(OfferId::new(3));
        assert_ne!(shorter.checksum(), three().checksum());
    }

    #[test]
    fn test_walk_is_bounded_on_cycle() {
        let store = OfferStore::from_prefix(vec![offer(1, 0, 2), offer(2, 1, 1)]);
        assert_eq!(store.iter().count(), 2);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert { id: u32, after: usize },
        Remove { pick: usize },
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (1u32..40, 0usize..40).prop_map(|(id, after)| Op::Insert { id, after }),
            (0usize..40).prop_map(|pick| Op::Remove { pick }),
        ]
    }

    /// Insert-or-replace as the reconciliation engine does it.
    fn write(store: &mut OfferStore, id: u32, prev: OfferId) {
        store.remove(OfferId::new(id));
        if let Some(next) = store.next_of(prev) {
            if prev != OfferId::new(id) {
                store.insert(offer(id, prev.get(), next.get()));
            }
        }
    }

    proptest! {
        #[test]
        fn prop_invariants_hold_after_every_mutation(ops in proptest::collection::vec(op(), 1..60)) {
            let mut store = OfferStore::new();
            for op in ops {
                match op {
                    Op::Insert { id, after } => {
                        let cached = store.ids();
                        let prev = if cached.is_empty() || after % (cached.len() + 1) == 0 {
                            OfferId::NONE
                        } else {
                            cached[after % (cached.len() + 1) - 1]
                        };
                        write(&mut store, id, prev);
                    }
                    Op::Remove { pick } => {
                        store.remove(OfferId::new(pick as u32));
                    }
                }
                prop_assert!(store.check_invariants().is_ok(), "{:?}", store.check_invariants());
                prop_assert_eq!(store.ids().len(), store.len());
            }
        }

        #[test]
        fn prop_insert_then_remove_restores_structure(len in 0u32..12, after in 0u32..13) {
            let offers: Vec<Offer> = (1..=len)
                .map(|i| offer(i, i - 1, if i == len { 0 } else { i + 1 }))
                .collect();
            let mut store = OfferStore::from_prefix(offers);
            let before = store.clone();

            let prev = OfferId::new(after.min(len));
            let next = store.next_of(prev).unwrap();
            store.insert(offer(100, prev.get(), next.get()));
            prop_assert!(store.check_invariants().is_ok());
            store.remove(OfferId::new(100));

            prop_assert_eq!(store, before);
        }
    }
}
