//! Error taxonomy for the semibook service
//!
//! Everything here except `Source` is a programming or protocol error and
//! is not retried. Transport failures are passed through untouched; retry
//! policy belongs to whoever owns the transport.

use types::errors::OfferError;
use types::ids::BlockNumber;

use crate::config::ConfigError;
use crate::source::SourceError;

/// Top-level semibook error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SemibookError {
    #[error("cannot {operation} while book is {state}")]
    Lifecycle {
        operation: &'static str,
        state: &'static str,
    },

    #[error("data integrity violation: {0}")]
    Offer(#[from] OfferError),

    #[error("unknown event {name} at block {block}")]
    UnknownEvent { name: String, block: BlockNumber },

    #[error("malformed {name} event: {reason}")]
    MalformedEvent { name: String, reason: String },

    #[error("activation buffer overflow: capacity {capacity}")]
    BufferOverflow { capacity: usize },

    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("book checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("event task failed: {0}")]
    TaskFailed(String),
}

impl SemibookError {
    /// Whether the error came from an external transport rather than from
    /// the book itself.
    pub fn is_transport(&self) -> bool {
        matches!(self, SemibookError::Source(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use types::ids::OfferId;

    #[test]
    fn test_lifecycle_display() {
        let err = SemibookError::Lifecycle {
            operation: "apply events",
            state: "loading",
        };
        assert_eq!(err.to_string(), "cannot apply events while book is loading");
    }

    #[test]
    fn test_from_offer_error() {
        let err: SemibookError = OfferError::ZeroVolume { id: OfferId::new(1) }.into();
        assert!(matches!(err, SemibookError::Offer(_)));
        assert!(!err.is_transport());
    }

    #[test]
    fn test_transport_classification() {
        let err: SemibookError = SourceError::Transport("timeout".to_string()).into();
        assert!(err.is_transport());
    }
}
