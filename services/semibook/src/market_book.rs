//! Both sides of one market
//!
//! Thin pairing of an asks and a bids `Semibook` sharing one reader, one
//! subscriber and one consumer callback.

use std::sync::Arc;

use tracing::{info, warn};
use types::market::{BookSide, Market};

use crate::config::BookOptions;
use crate::error::SemibookError;
use crate::events::BookUpdate;
use crate::semibook::Semibook;
use crate::source::{EventSubscriber, OfferListReader};

/// Asks and bids of a market, each cached independently.
pub struct MarketBook {
    market: Market,
    asks: Semibook,
    bids: Semibook,
}

impl MarketBook {
    /// Connect both sides concurrently.
    ///
    /// If either side fails to activate, the other is disconnected and the
    /// first error is returned.
    pub async fn connect<F>(
        market: Market,
        options: BookOptions,
        reader: Arc<dyn OfferListReader>,
        subscriber: Arc<dyn EventSubscriber>,
        on_update: F,
    ) -> Result<Self, SemibookError>
    where
        F: Fn(BookUpdate) + Send + Sync + 'static,
    {
        let on_update = Arc::new(on_update);
        let side = |side: BookSide| {
            let on_update = on_update.clone();
            Semibook::connect(
                market.clone(),
                side,
                options.clone(),
                reader.clone(),
                subscriber.clone(),
                move |update| on_update(update),
            )
        };

        // Both futures run to completion so a half-activated side never
        // leaks its subscription
        let (asks, bids) = tokio::join!(side(BookSide::Asks), side(BookSide::Bids));

        match (asks, bids) {
            (Ok(asks), Ok(bids)) => {
                info!(market = %market.id(), "Market book connected");
                Ok(Self { market, asks, bids })
            }
            (Ok(book), Err(err)) | (Err(err), Ok(book)) => {
                warn!(
                    market = %market.id(),
                    side = %book.side(),
                    error = %err,
                    "Other side failed to connect; disconnecting"
                );
                // The activation error is the one worth reporting
                let _ = book.disconnect().await;
                Err(err)
            }
            (Err(err), Err(_)) => Err(err),
        }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    pub fn asks(&self) -> &Semibook {
        &self.asks
    }

    pub fn bids(&self) -> &Semibook {
        &self.bids
    }

    pub fn side(&self, side: BookSide) -> &Semibook {
        match side {
            BookSide::Asks => &self.asks,
            BookSide::Bids => &self.bids,
        }
    }

    /// Disconnect both sides, returning the first error either reported.
    pub async fn disconnect(self) -> Result<(), SemibookError> {
        let asks = self.asks.disconnect().await;
        let bids = self.bids.disconnect().await;
        asks.and(bids)
    }
}
