//! Key objects for indexes that identify records by their own fields.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The values of a record's key fields, matched verbatim against the index.
///
/// Built directly from `(field, value)` pairs or extracted from a record via
/// [`RecordSchema::key_of`](crate::RecordSchema::key_of).
///
/// ```
/// use acervo_core::KeyValues;
///
/// let key = KeyValues::new().with("cpf", "123.456.789-00");
/// assert_eq!(key.get("cpf"), Some("123.456.789-00"));
/// assert_eq!(key.to_string(), "cpf=123.456.789-00");
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValues {
    values: BTreeMap<String, String>,
}

impl KeyValues {
    /// Creates an empty key.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a field value, builder style.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(field, value);
        self
    }

    /// Adds or replaces a field value.
    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.values.insert(field.into(), value.into());
    }

    /// Value for a field.
    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    /// Field names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the key is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Display for KeyValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, value) in &self.values {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{field}={value}")?;
            first = false;
        }
        Ok(())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for KeyValues {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut key = KeyValues::new();
        for (field, value) in iter {
            key.insert(field, value);
        }
        key
    }
}
