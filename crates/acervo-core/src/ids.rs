//! Generated record identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of the reserved document field holding a generated identifier.
pub const ID_FIELD: &str = "#id";

/// Identifier minted for a record indexed with auto-generated ids.
///
/// Internally a UUID v4. Indexers using key fields return [`RecordId::nil`]
/// from `add`, since no identifier is minted in that mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Mints a new random identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use acervo_core::RecordId;
    ///
    /// let id = RecordId::new();
    /// assert!(!id.is_nil());
    /// ```
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The all-zero sentinel returned when no identifier was minted.
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Returns true for the sentinel value.
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Creates an identifier from a UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::nil()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Hyphenated lowercase, the form stored in `#id`.
        write!(f, "{}", self.0.hyphenated())
    }
}

impl From<Uuid> for RecordId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl From<RecordId> for Uuid {
    fn from(id: RecordId) -> Self {
        id.0
    }
}

impl std::str::FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}
