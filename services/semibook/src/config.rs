//! Book options
//!
//! Every field has a default so a partial JSON document is enough.

use serde::{Deserialize, Serialize};

/// Errors in user-supplied book options.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },

    #[error("invalid options document: {0}")]
    Parse(String),
}

/// Options controlling one cached book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BookOptions {
    /// Maximum number of offers read by the initial snapshot.
    pub max_offers: usize,
    /// Offers requested per page. Defaults to `max_offers`.
    pub chunk_size: Option<usize>,
    /// Maximum number of events held while the book is activating.
    pub buffer_capacity: usize,
}

impl Default for BookOptions {
    fn default() -> Self {
        Self {
            max_offers: 50,
            chunk_size: None,
            buffer_capacity: 100_000,
        }
    }
}

impl BookOptions {
    /// Parse options from JSON and validate them.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let options: BookOptions =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    pub fn with_max_offers(mut self, max_offers: usize) -> Self {
        self.max_offers = max_offers;
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }

    /// Page size actually used for snapshot reads.
    pub fn page_size(&self) -> usize {
        self.chunk_size.unwrap_or(self.max_offers)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_offers == 0 {
            return Err(ConfigError::Zero { field: "max_offers" });
        }
        if self.chunk_size == Some(0) {
            return Err(ConfigError::Zero { field: "chunk_size" });
        }
        if self.buffer_capacity == 0 {
            return Err(ConfigError::Zero {
                field: "buffer_capacity",
            });
        }
        Ok(())
    }
}
