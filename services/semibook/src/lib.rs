//! Semibook Service
//!
//! Keeps a local, bounded prefix of a remote ordered offer list (one side
//! of a market's book) consistent with the remote, from:
//! - a paginated snapshot read as of a fixed reference block `R`
//! - the live stream of change events for that list
//!
//! Events arriving while the snapshot is read are buffered and replayed
//! once the snapshot lands, minus those at or before `R`.
//!
//! # Architecture
//!
//! ```text
//!   EventSubscriber            OfferListReader
//!        │ RawEvent                 │ OfferPage
//!    ┌───▼────┐               ┌─────▼────┐
//!    │ Buffer │               │ Snapshot │
//!    └───┬────┘               └─────┬────┘
//!        │    drain(block > R)      │
//!    ┌───▼──────────────────────────▼───┐
//!    │   BookState (Arming/Loading/     │
//!    │   Active/Failed)                 │
//!    └───────────────┬──────────────────┘
//!                ┌───▼───┐
//!                │ Store │──► BookUpdate callback
//!                └───────┘
//! ```

pub mod buffer;
pub mod config;
pub mod error;
pub mod events;
pub mod market_book;
pub mod replay;
pub mod semibook;
pub mod snapshot;
pub mod source;
pub mod state;
pub mod store;

pub use config::BookOptions;
pub use error::SemibookError;
pub use events::{BookUpdate, RawEvent, TakerFill, UpdateKind};
pub use market_book::MarketBook;
pub use semibook::Semibook;
pub use source::{EventSubscriber, OfferListReader, SourceError, Subscription, SubscriptionId};
pub use state::Lifecycle;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
