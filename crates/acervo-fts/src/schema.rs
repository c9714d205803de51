//! Index schema derived from a record schema.
//!
//! The layout follows the identity strategy:
//!
//! | Field | Options | When |
//! |-------|---------|------|
//! | `#id` | STRING \| STORED | always present, filled in auto-generated mode |
//! | key fields | STRING \| STORED | key-field mode (exact match, no analysis) |
//! | other fields | TEXT(`pt_br`) \| STORED | analyzed, with positions |
//!
//! Key fields of an auto-generated index are analyzed like any other field.

use acervo_core::{Error, ID_FIELD, RecordId, RecordSchema, Result};
use tantivy::Term;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, FieldType, IndexRecordOption, STORED, STRING, Schema, SchemaBuilder, TextFieldIndexing,
    TextOptions,
};

use crate::analyzer::TOKENIZER_NAME;
use crate::types::IdentityStrategy;

/// Tokenizer Tantivy uses for `STRING` fields.
const RAW_TOKENIZER: &str = "raw";

/// One record field as laid out in the index.
#[derive(Debug, Clone)]
pub struct IndexedField {
    /// Record field name.
    pub name: String,
    /// Tantivy field handle.
    pub field: Field,
    /// Whether the field is matched verbatim.
    pub exact: bool,
}

/// Tantivy schema plus typed lookups for the record's fields.
#[derive(Clone)]
pub struct IndexSchema {
    schema: Schema,
    id: Field,
    fields: Vec<IndexedField>,
}

impl IndexSchema {
    /// Lays out a new index for a record type and identity strategy.
    pub fn build<R>(records: &RecordSchema<R>, strategy: IdentityStrategy) -> Self {
        let mut builder = SchemaBuilder::new();

        let text_options = TextOptions::default()
            .set_indexing_options(
                TextFieldIndexing::default()
                    .set_tokenizer(TOKENIZER_NAME)
                    .set_index_option(IndexRecordOption::WithFreqsAndPositions),
            )
            .set_stored();

        let id = builder.add_text_field(ID_FIELD, STRING | STORED);

        let fields = records
            .fields()
            .iter()
            .map(|descriptor| {
                let exact = strategy == IdentityStrategy::KeyFields && descriptor.is_key();
                let field = if exact {
                    builder.add_text_field(descriptor.name(), STRING | STORED)
                } else {
                    builder.add_text_field(descriptor.name(), text_options.clone())
                };
                IndexedField {
                    name: descriptor.name().to_string(),
                    field,
                    exact,
                }
            })
            .collect();

        Self {
            schema: builder.build(),
            id,
            fields,
        }
    }

    /// Resolves the record's fields against the schema of an existing index.
    ///
    /// Fails when the index lacks `#id` or any declared field.
    pub fn from_existing<R>(schema: Schema, records: &RecordSchema<R>) -> Result<Self> {
        let id = schema
            .get_field(ID_FIELD)
            .map_err(|_| Error::engine(format!("index has no `{ID_FIELD}` field")))?;

        let mut fields = Vec::with_capacity(records.fields().len());
        for descriptor in records.fields() {
            let field = schema.get_field(descriptor.name()).map_err(|_| {
                Error::engine(format!(
                    "index has no field `{}` for this record type",
                    descriptor.name()
                ))
            })?;
            let exact = match schema.get_field_entry(field).field_type() {
                FieldType::Str(options) => options
                    .get_indexing_options()
                    .is_some_and(|indexing| indexing.tokenizer() == RAW_TOKENIZER),
                _ => false,
            };
            fields.push(IndexedField {
                name: descriptor.name().to_string(),
                field,
                exact,
            });
        }

        Ok(Self { schema, id, fields })
    }

    /// The underlying Tantivy schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The reserved `#id` field.
    pub fn id_field(&self) -> Field {
        self.id
    }

    /// Record fields in declaration order.
    pub fn fields(&self) -> &[IndexedField] {
        &self.fields
    }

    /// Looks up a record field by name.
    pub fn get(&self, name: &str) -> Option<&IndexedField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Resolves a document field name, including `#id`.
    pub fn field(&self, name: &str) -> Option<Field> {
        if name == ID_FIELD {
            Some(self.id)
        } else {
            self.get(name).map(|f| f.field)
        }
    }

    /// Name of a Tantivy field.
    pub fn name_of(&self, field: Field) -> &str {
        self.schema.get_field_name(field)
    }

    /// Exact-match term on `#id`.
    pub fn id_term(&self, id: RecordId) -> Term {
        Term::from_field_text(self.id, &id.to_string())
    }

    /// Exact-match terms for resolved key values.
    ///
    /// Key fields of an auto-generated index are analyzed, so their stored
    /// values cannot be matched verbatim; that case is a strategy mismatch.
    pub fn key_terms(&self, operation: &'static str, resolved: &[(&str, &str)]) -> Result<Vec<Term>> {
        resolved
            .iter()
            .map(|(name, value)| match self.get(name) {
                Some(indexed) if indexed.exact => Ok(Term::from_field_text(indexed.field, value)),
                Some(_) => Err(Error::StrategyMismatch {
                    operation,
                    configured: IdentityStrategy::AutoGenerated.label(),
                }),
                None => Err(Error::invalid_key(format!("`{name}` is not part of the index"))),
            })
            .collect()
    }
}

/// Query matching documents that contain every term.
pub fn all_of(mut terms: Vec<Term>) -> Box<dyn Query> {
    if terms.len() == 1
        && let Some(term) = terms.pop()
    {
        return Box::new(TermQuery::new(term, IndexRecordOption::Basic));
    }

    let clauses: Vec<(Occur, Box<dyn Query>)> = terms
        .into_iter()
        .map(|term| {
            let query: Box<dyn Query> = Box::new(TermQuery::new(term, IndexRecordOption::Basic));
            (Occur::Must, query)
        })
        .collect();
    Box::new(BooleanQuery::new(clauses))
}

impl std::fmt::Debug for IndexSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexSchema")
            .field("field_count", &(self.fields.len() + 1))
            .field(
                "exact",
                &self
                    .fields
                    .iter()
                    .filter(|f| f.exact)
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>(),
            )
            .finish()
    }
}
