//! Read side: queries in, typed records out.
//!
//! A [`Searcher`] pins the segments that were committed when it was opened.
//! Later commits are invisible to it; open a new one to see them.

use std::path::Path;

use acervo_core::{
    Conjunction, Error, ID_FIELD, IndexConfig, KeyValues, Record, RecordId, RecordSchema, Result,
};
use tantivy::collector::{Count, TopDocs};
use tantivy::query::{Query, QueryParser, QueryParserError, TermQuery};
use tantivy::schema::IndexRecordOption;
use tantivy::{DocAddress, Index, IndexReader, ReloadPolicy, Score, TantivyDocument};

use crate::document::Document;
use crate::engine::{IndexStore, engine_error};
use crate::schema::{IndexSchema, all_of};

/// Read-only snapshot of an index, reconstructing records of type `R`.
pub struct Searcher<R: Record> {
    records: RecordSchema<R>,
    schema: IndexSchema,
    searcher: tantivy::Searcher,
    config: IndexConfig,
}

impl<R: Record> Searcher<R> {
    /// Opens a snapshot of the index at `path` with default configuration.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &IndexConfig::default())
    }

    /// Opens a snapshot of the index at `path`.
    ///
    /// `config` must carry the same analysis settings the index was
    /// written with, or query text will be analyzed differently.
    pub fn open_with(path: impl AsRef<Path>, config: &IndexConfig) -> Result<Self> {
        config.validate()?;
        let store = IndexStore::open_existing(path.as_ref(), config)?;
        log::debug!("Opening searcher at {}", path.as_ref().display());
        Self::snapshot(store.index().clone(), config)
    }

    /// Opens a snapshot over an index that is already open.
    pub(crate) fn from_index(index: Index, config: &IndexConfig) -> Result<Self> {
        let store = IndexStore::from_index(index, config);
        Self::snapshot(store.index().clone(), config)
    }

    fn snapshot(index: Index, config: &IndexConfig) -> Result<Self> {
        let records = R::schema();
        let schema = IndexSchema::from_existing(index.schema(), &records)?;

        let reader: IndexReader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| engine_error("open reader", e))?;

        Ok(Self {
            records,
            schema,
            searcher: reader.searcher(),
            config: config.clone(),
        })
    }

    /// Number of live documents in the snapshot.
    pub fn num_docs(&self) -> u64 {
        self.searcher.num_docs()
    }

    /// Stored document carrying `id`, including `#id` itself.
    pub fn get_document(&self, id: RecordId) -> Result<Document> {
        let query = TermQuery::new(self.schema.id_term(id), IndexRecordOption::Basic);
        self.first_match(&query)?
            .ok_or_else(|| Error::not_found(format!("{ID_FIELD}={id}")))
    }

    /// Record stored under `id`.
    ///
    /// Stored values are parsed by the record's declared field types and
    /// `id` is handed to the record's identifier setter, if it has one.
    pub fn get_by_id(&self, id: RecordId) -> Result<R> {
        let mut record = self.get_document(id)?.to_record(&self.records)?;
        self.records.assign_id(&mut record, id);
        Ok(record)
    }

    /// Record whose key fields equal `key`.
    ///
    /// Only meaningful for indexes built with key-field identity, where key
    /// fields are stored verbatim.
    pub fn get_by_key(&self, key: &KeyValues) -> Result<R> {
        let resolved = self.records.resolve_key(key)?;
        let query = all_of(self.schema.key_terms("get_by_key", &resolved)?);
        self.first_match(query.as_ref())?
            .ok_or_else(|| Error::not_found(key.to_string()))?
            .to_record(&self.records)
    }

    /// Runs `text` against `fields` and returns the matches by relevance.
    ///
    /// Query text goes through the same analyzer as the indexed fields and
    /// supports the query parser syntax (phrases, `+`/`-`, field prefixes).
    /// Records are reconstructed lazily as the results are iterated, so a
    /// stored value that fails to parse fails only its own item. Text that
    /// is all stop words matches nothing and is not an error.
    pub fn search(&self, text: &str, fields: &[&str]) -> Result<SearchResults<'_, R>> {
        if fields.is_empty() {
            return Err(Error::BadQuery {
                query: text.to_string(),
                message: "no search fields given".to_string(),
            });
        }

        let targets = fields
            .iter()
            .map(|name| {
                self.schema
                    .get(name)
                    .map(|indexed| indexed.field)
                    .ok_or_else(|| Error::UnknownField {
                        field: name.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut parser = QueryParser::for_index(self.searcher.index(), targets);
        if self.config.default_conjunction == Conjunction::And {
            parser.set_conjunction_by_default();
        }
        let hits = match parser.parse_query(text) {
            Ok(query) => self.collect(query.as_ref())?,
            // Nothing survived analysis, e.g. only stop words.
            Err(QueryParserError::AllButQueryForbidden) => Vec::new(),
            Err(e) => {
                return Err(Error::BadQuery {
                    query: text.to_string(),
                    message: e.to_string(),
                });
            }
        };
        log::debug!("Query {text:?} on {fields:?} matched {} documents", hits.len());
        Ok(SearchResults {
            searcher: self,
            hits: hits.into_iter(),
        })
    }

    /// Every match, best first, bounded by `max_results`.
    ///
    /// Equal scores keep the engine's document order.
    fn collect(&self, query: &dyn Query) -> Result<Vec<(Score, DocAddress)>> {
        let total = self
            .searcher
            .search(query, &Count)
            .map_err(|e| engine_error("search", e))?;
        if total == 0 {
            return Ok(Vec::new());
        }

        let limit = total.min(self.config.max_results);
        let mut hits = self
            .searcher
            .search(query, &TopDocs::with_limit(limit).order_by_score())
            .map_err(|e| engine_error("search", e))?;
        hits.sort_by(|a, b| b.0.total_cmp(&a.0).then(a.1.cmp(&b.1)));
        Ok(hits)
    }

    fn first_match(&self, query: &dyn Query) -> Result<Option<Document>> {
        match self.collect(query)?.first() {
            Some((_, address)) => self.load(*address).map(Some),
            None => Ok(None),
        }
    }

    fn load(&self, address: DocAddress) -> Result<Document> {
        let doc: TantivyDocument = self
            .searcher
            .doc(address)
            .map_err(|e| engine_error("fetch document", e))?;
        Ok(Document::from_tantivy(&doc, &self.schema))
    }

    fn reconstruct(&self, address: DocAddress) -> Result<R> {
        self.load(address)?.to_record(&self.records)
    }
}

impl<R: Record> std::fmt::Debug for Searcher<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Searcher")
            .field("schema", &self.schema)
            .field("num_docs", &self.searcher.num_docs())
            .finish()
    }
}

/// Matches of one query, best first.
///
/// Each item is reconstructed when it is reached. The sequence is finite
/// and cannot be restarted.
pub struct SearchResults<'s, R: Record> {
    searcher: &'s Searcher<R>,
    hits: std::vec::IntoIter<(Score, DocAddress)>,
}

impl<'s, R: Record> SearchResults<'s, R> {
    /// Pairs every remaining record with its relevance score.
    pub fn scored(self) -> impl Iterator<Item = (Score, Result<R>)> + 's {
        let searcher = self.searcher;
        self.hits
            .map(move |(score, address)| (score, searcher.reconstruct(address)))
    }
}

impl<R: Record> Iterator for SearchResults<'_, R> {
    type Item = Result<R>;

    fn next(&mut self) -> Option<Self::Item> {
        let (_, address) = self.hits.next()?;
        Some(self.searcher.reconstruct(address))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.hits.size_hint()
    }
}

impl<R: Record> ExactSizeIterator for SearchResults<'_, R> {}
