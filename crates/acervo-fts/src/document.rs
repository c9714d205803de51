//! Index document representation.
//!
//! A [`Document`] is the engine-neutral form of an indexed record: field
//! name to stored string values, plus the optional reserved `#id`. It is
//! built fresh for every add or update and never edited once handed to the
//! engine.
//!
//! ```rust
//! use acervo_fts::Document;
//!
//! let mut doc = Document::new();
//! doc.add("city", "São Paulo");
//! assert_eq!(doc.get_first("city"), Some("São Paulo"));
//! assert!(doc.id().is_none());
//! ```

use std::collections::BTreeMap;

use acervo_core::{Error, ID_FIELD, Record, RecordId, RecordSchema, Result};
use serde::{Deserialize, Serialize};
use tantivy::TantivyDocument;
use tantivy::schema::Value;

use crate::schema::IndexSchema;

/// Field name to stored string values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, Vec<String>>,
}

impl Document {
    /// Creates an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Maps every field of a record onto a new document.
    pub fn from_record<R>(records: &RecordSchema<R>, record: &R) -> Result<Self> {
        let mut doc = Document::new();
        for (name, value) in records.to_stored_fields(record)? {
            doc.add(name, value);
        }
        Ok(doc)
    }

    /// Appends a value to a field.
    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(name.into()).or_default().push(value.into());
    }

    /// Replaces all values of a field.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(name.into(), vec![value.into()]);
    }

    /// First stored value of a field.
    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    /// All stored values of a field.
    pub fn get_all(&self, name: &str) -> &[String] {
        self.fields.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// Generated identifier, when present and well formed.
    pub fn id(&self) -> Option<RecordId> {
        self.get_first(ID_FIELD).and_then(|raw| raw.parse().ok())
    }

    /// Stores a generated identifier in `#id`.
    pub fn set_id(&mut self, id: RecordId) {
        self.set(ID_FIELD, id.to_string());
    }

    /// Iterates `(field, values)` in field-name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of distinct fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Overlays `other` onto this document.
    ///
    /// Every field present in `other` replaces the same field here; fields
    /// absent from `other` are kept. `#id` is never taken from `other`.
    pub fn merge_over(&mut self, other: Document) {
        for (name, values) in other.fields {
            if name != ID_FIELD {
                self.fields.insert(name, values);
            }
        }
    }

    /// Converts to a Tantivy document.
    ///
    /// Fails with a mapping failure if a field is not part of the index.
    pub fn to_tantivy(&self, schema: &IndexSchema) -> Result<TantivyDocument> {
        let mut doc = TantivyDocument::new();
        for (name, values) in &self.fields {
            let field = schema
                .field(name)
                .ok_or_else(|| Error::mapping(name.as_str(), "field is not part of the index"))?;
            for value in values {
                doc.add_text(field, value);
            }
        }
        Ok(doc)
    }

    /// Reads the stored values of a Tantivy document.
    pub fn from_tantivy(doc: &TantivyDocument, schema: &IndexSchema) -> Self {
        let mut out = Document::new();

        let id = schema.id_field();
        for value in doc.get_all(id).filter_map(|v| v.as_str()) {
            out.add(ID_FIELD, value);
        }
        for indexed in schema.fields() {
            for value in doc.get_all(indexed.field).filter_map(|v| v.as_str()) {
                out.add(indexed.name.as_str(), value);
            }
        }
        out
    }

    /// Reconstructs a typed record, parsing each field by its declared type.
    ///
    /// `#id` is skipped. Multi-valued fields contribute their first value.
    pub fn to_record<R: Record>(&self, records: &RecordSchema<R>) -> Result<R> {
        let mut record = R::default();
        for (name, values) in &self.fields {
            if name == ID_FIELD {
                continue;
            }
            if let Some(value) = values.first() {
                records.assign(&mut record, name, value)?;
            }
        }
        Ok(record)
    }
}
