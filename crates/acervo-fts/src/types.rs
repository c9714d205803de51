//! Identity strategy and lifecycle outcome types.

use acervo_core::Error;

/// How documents are identified, fixed for an indexer's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityStrategy {
    /// The indexer mints a UUID per record and stores it in `#id`.
    AutoGenerated,
    /// The record's key fields, stored verbatim, identify it.
    KeyFields,
}

impl IdentityStrategy {
    /// Maps the classic `auto_generate_ids` flag onto a strategy.
    pub fn from_auto_generate(auto_generate_ids: bool) -> Self {
        if auto_generate_ids {
            IdentityStrategy::AutoGenerated
        } else {
            IdentityStrategy::KeyFields
        }
    }

    /// Label used in logs and `StrategyMismatch` errors.
    pub fn label(&self) -> &'static str {
        match self {
            IdentityStrategy::AutoGenerated => "auto-generated",
            IdentityStrategy::KeyFields => "key-field",
        }
    }
}

impl std::fmt::Display for IdentityStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of [`Indexer::close`](crate::Indexer::close).
#[derive(Debug)]
#[non_exhaustive]
pub enum CloseStatus {
    /// Buffered work was committed and the write handle released.
    Closed,
    /// The indexer had already been closed.
    AlreadyClosed,
    /// The engine ran out of resources while closing. A fresh write handle
    /// was opened so the indexer stays usable; `cause` is the original
    /// failure, reported as a warning.
    Recovered {
        /// The failure raised while closing.
        cause: Error,
    },
}

impl CloseStatus {
    /// Whether the indexer still holds a write handle.
    pub fn is_open(&self) -> bool {
        matches!(self, CloseStatus::Recovered { .. })
    }
}
