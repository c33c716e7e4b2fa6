//! Paginated snapshot reads
//!
//! Reads the head of a remote offer list, page by page, as of one fixed
//! block. Stops when the remote cursor returns to `NONE` or the offer
//! budget is spent, whichever comes first. Hitting the budget yields a
//! valid prefix, not an error.

use tracing::{debug, info, warn};
use types::ids::{BlockNumber, OfferId};
use types::market::OfferList;
use types::offer::RawOffer;

use crate::config::BookOptions;
use crate::source::{OfferListReader, SourceError};

/// Consecutive offers from the head of a list, as of `reference`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub reference: BlockNumber,
    pub offers: Vec<RawOffer>,
    /// Whether the read reached the end of the remote list
    pub complete: bool,
}

impl Snapshot {
    pub fn len(&self) -> usize {
        self.offers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offers.is_empty()
    }
}

/// Read at most `options.max_offers` offers from the head of `list` as of
/// block `reference`.
pub async fn read_prefix(
    reader: &dyn OfferListReader,
    list: &OfferList,
    options: &BookOptions,
    reference: BlockNumber,
) -> Result<Snapshot, SourceError> {
    let budget = options.max_offers;
    let page_size = options.page_size();

    let mut offers: Vec<RawOffer> = Vec::with_capacity(budget);
    let mut cursor = OfferId::NONE;
    let mut pages = 0usize;

    let complete = loop {
        let remaining = budget - offers.len();
        let page = reader
            .offer_list(list, cursor, page_size.min(remaining), reference)
            .await?;
        pages += 1;

        debug!(
            list = %list,
            from = %cursor,
            received = page.offers.len(),
            next = %page.next,
            "Snapshot page read"
        );

        if page.offers.is_empty() && page.next.is_some() {
            warn!(
                list = %list,
                cursor = %page.next,
                "Empty snapshot page with live cursor; stopping read"
            );
            break false;
        }

        let take = page.offers.len().min(remaining);
        let truncated = take < page.offers.len();
        offers.extend(page.offers.into_iter().take(take));
        cursor = page.next;

        if cursor.is_none() && !truncated {
            break true;
        }
        if offers.len() >= budget {
            break false;
        }
    };

    info!(
        list = %list,
        reference = %reference,
        offers = offers.len(),
        pages,
        complete,
        "Snapshot read finished"
    );

    Ok(Snapshot {
        reference,
        offers,
        complete,
    })
}
