//! Write side: typed records in, index documents out.
//!
//! An [`Indexer`] holds the index's single write handle for its whole
//! lifetime. Writes are buffered until [`Indexer::commit`], which flushes,
//! compacts and swaps in a fresh handle. The identity strategy is fixed at
//! construction and every operation checks it before touching the engine.
//!
//! Engine failures that mean the handle ran out of memory or threads are
//! recovered by replacing the handle. The interrupted operation, and any
//! work buffered since the last commit, is then *not* applied and the caller
//! gets [`Error::ResourceExhausted`] with `recovered: true`.

use std::collections::HashMap;
use std::path::Path;

use acervo_core::{
    Error, ID_FIELD, IndexConfig, KeyValues, Record, RecordId, RecordSchema, Result,
};
use tantivy::{Index, TantivyError};

use crate::document::Document;
use crate::engine::{IndexStore, WriteHandle, engine_error, is_resource_exhausted, open_writer};
use crate::schema::{IndexSchema, all_of};
use crate::searcher::Searcher;
use crate::types::{CloseStatus, IdentityStrategy};

/// Mints write handles over an index.
pub(crate) type HandleOpener =
    Box<dyn Fn(&Index, &IndexConfig) -> tantivy::Result<Box<dyn WriteHandle>> + Send + Sync>;

/// Maps records of type `R` onto an index and manages its write handle.
///
/// ```rust,no_run
/// use acervo_core::{Record, RecordSchema};
/// use acervo_fts::{Indexer, Searcher};
///
/// #[derive(Debug, Default)]
/// struct Person {
///     name: String,
///     city: String,
/// }
///
/// impl Record for Person {
///     fn schema() -> RecordSchema<Self> {
///         RecordSchema::builder()
///             .field("name", |p: &Person| &p.name, |p, v| p.name = v)
///             .field("city", |p: &Person| &p.city, |p, v| p.city = v)
///             .build()
///             .expect("valid schema")
///     }
/// }
///
/// # fn main() -> acervo_core::Result<()> {
/// let mut indexer = Indexer::<Person>::open("/tmp/people", true)?;
/// let id = indexer.add(&Person {
///     name: "João".to_string(),
///     city: "São Paulo".to_string(),
/// })?;
/// indexer.commit()?;
///
/// let searcher = Searcher::<Person>::open("/tmp/people")?;
/// let person = searcher.get_by_id(id)?;
/// assert_eq!(person.city, "São Paulo");
/// # Ok(())
/// # }
/// ```
pub struct Indexer<R: Record> {
    records: RecordSchema<R>,
    schema: IndexSchema,
    store: IndexStore,
    config: IndexConfig,
    strategy: IdentityStrategy,
    handle: Option<Box<dyn WriteHandle>>,
    opener: HandleOpener,
    pending: usize,
    /// Ids refreshed (the buffered document) or removed (`None`) since the
    /// last commit.
    touched: HashMap<RecordId, Option<Document>>,
}

impl<R: Record> Indexer<R> {
    /// Opens or creates the index at `path` with default configuration.
    ///
    /// `auto_generate_ids` selects [`IdentityStrategy::AutoGenerated`];
    /// otherwise the record's key fields identify it.
    pub fn open(path: impl AsRef<Path>, auto_generate_ids: bool) -> Result<Self> {
        Self::open_with(
            path,
            IdentityStrategy::from_auto_generate(auto_generate_ids),
            &IndexConfig::default(),
        )
    }

    /// Opens or creates the index at `path`.
    ///
    /// Fails with [`Error::Config`] when key-field identity is requested
    /// for a record type without key fields, and with
    /// [`Error::IncompatibleIndex`] when the existing index was laid out for
    /// another record type or strategy.
    pub fn open_with(
        path: impl AsRef<Path>,
        strategy: IdentityStrategy,
        config: &IndexConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        let (records, schema) = Self::prepare(strategy, config)?;
        let store = IndexStore::open_or_create(path, schema.schema(), config)?;

        log::info!(
            "Opening {} indexer at {} (new index: {})",
            strategy,
            path.display(),
            store.is_new_index()
        );

        Self::start(records, schema, store, strategy, config, Box::new(open_writer))
    }

    /// Creates an indexer over a fresh RAM-backed index.
    pub fn in_memory(strategy: IdentityStrategy) -> Result<Self> {
        let config = IndexConfig::default();
        let (records, schema) = Self::prepare(strategy, &config)?;
        let store = IndexStore::in_memory(schema.schema(), &config);
        Self::start(records, schema, store, strategy, &config, Box::new(open_writer))
    }

    fn prepare(
        strategy: IdentityStrategy,
        config: &IndexConfig,
    ) -> Result<(RecordSchema<R>, IndexSchema)> {
        config.validate()?;

        let records = R::schema();
        if strategy == IdentityStrategy::KeyFields && !records.has_key_fields() {
            return Err(Error::config(format!(
                "key-field identity requires at least one key field on `{}`",
                std::any::type_name::<R>()
            )));
        }

        let schema = IndexSchema::build(&records, strategy);
        Ok((records, schema))
    }

    fn start(
        records: RecordSchema<R>,
        schema: IndexSchema,
        store: IndexStore,
        strategy: IdentityStrategy,
        config: &IndexConfig,
        opener: HandleOpener,
    ) -> Result<Self> {
        let handle = opener(store.index(), config).map_err(|e| engine_error("open writer", e))?;
        Ok(Self {
            records,
            schema,
            store,
            config: config.clone(),
            strategy,
            handle: Some(handle),
            opener,
            pending: 0,
            touched: HashMap::new(),
        })
    }

    /// Swaps the handle factory and reopens the handle with it.
    #[cfg(test)]
    pub(crate) fn with_opener(mut self, opener: HandleOpener) -> Result<Self> {
        self.handle = None;
        self.opener = opener;
        self.handle = Some(self.open_handle().map_err(|e| engine_error("open writer", e))?);
        Ok(self)
    }

    /// Identity strategy fixed at construction.
    pub fn strategy(&self) -> IdentityStrategy {
        self.strategy
    }

    /// True iff no index existed at the path when this indexer opened it.
    pub fn is_new_index(&self) -> bool {
        self.store.is_new_index()
    }

    /// Index directory, or `None` for a RAM-backed index.
    pub fn path(&self) -> Option<&Path> {
        self.store.path()
    }

    /// Operations buffered since the last commit.
    pub fn pending_operations(&self) -> usize {
        self.pending
    }

    /// Whether the write handle has been released.
    pub fn is_closed(&self) -> bool {
        self.handle.is_none()
    }

    /// Opens a read snapshot of what has been committed so far.
    pub fn searcher(&self) -> Result<Searcher<R>> {
        Searcher::from_index(self.store.index().clone(), &self.config)
    }

    /// Buffers a record for indexing.
    ///
    /// Returns the minted identifier in auto-generated mode and
    /// [`RecordId::nil`] in key-field mode.
    pub fn add(&mut self, record: &R) -> Result<RecordId> {
        self.ensure_open()?;

        let mut doc = Document::from_record(&self.records, record)?;
        let id = match self.strategy {
            IdentityStrategy::AutoGenerated => {
                let id = RecordId::new();
                doc.set_id(id);
                id
            }
            IdentityStrategy::KeyFields => RecordId::nil(),
        };
        let doc = doc.to_tantivy(&self.schema)?;

        self.apply("add", |handle| handle.add_document(doc))?;
        log::debug!("Buffered record {id}");
        Ok(id)
    }

    /// Buffers deletion of the document carrying `id`.
    ///
    /// Only available with auto-generated identifiers.
    pub fn remove(&mut self, id: RecordId) -> Result<()> {
        self.require(IdentityStrategy::AutoGenerated, "remove")?;

        let term = self.schema.id_term(id);
        self.apply("remove", |handle| handle.delete_term(term))?;
        self.touched.insert(id, None);
        log::debug!("Buffered removal of {id}");
        Ok(())
    }

    /// Buffers deletion of every document whose key fields equal `key`.
    ///
    /// Only available with key-field identity. The key must name exactly
    /// the declared key fields.
    pub fn remove_key(&mut self, key: &KeyValues) -> Result<()> {
        self.require(IdentityStrategy::KeyFields, "remove_key")?;

        let resolved = self.records.resolve_key(key)?;
        let mut terms = self.schema.key_terms("remove_key", &resolved)?;
        if terms.len() == 1
            && let Some(term) = terms.pop()
        {
            self.apply("remove_key", |handle| handle.delete_term(term))?;
        } else {
            let query = all_of(terms);
            self.apply("remove_key", |handle| handle.delete_query(query))?;
        }

        log::debug!("Buffered removal of key {key}");
        Ok(())
    }

    /// Re-indexes document `id` with the record's values.
    ///
    /// The current document is fetched, every field the record carries a
    /// value for replaces the stored one, fields without a value (an empty
    /// `Option`) keep their stored value, and the result replaces the whole
    /// document under the same `#id`. A refresh buffered since the last
    /// commit is the current document for the next one.
    ///
    /// Only available with auto-generated identifiers. Fails with
    /// [`Error::NotFound`] if `id` is not committed or was removed since
    /// the last commit.
    pub fn refresh(&mut self, record: &R, id: RecordId) -> Result<()> {
        self.require(IdentityStrategy::AutoGenerated, "refresh")?;

        let mut merged = match self.touched.get(&id) {
            Some(Some(buffered)) => buffered.clone(),
            Some(None) => return Err(Error::not_found(format!("{ID_FIELD}={id}"))),
            None => self.searcher()?.get_document(id)?,
        };
        merged.merge_over(Document::from_record(&self.records, record)?);
        let doc = merged.to_tantivy(&self.schema)?;
        let term = self.schema.id_term(id);

        self.apply("refresh", |handle| {
            handle.delete_term(term)?;
            handle.add_document(doc)
        })?;
        self.touched.insert(id, Some(merged));
        log::debug!("Buffered refresh of {id}");
        Ok(())
    }

    /// Replaces the document with the record's key, or adds it if absent.
    ///
    /// Only available with key-field identity.
    pub fn replace(&mut self, record: &R) -> Result<()> {
        self.require(IdentityStrategy::KeyFields, "replace")?;

        let key = self.records.key_of(record)?;
        let resolved = self.records.resolve_key(&key)?;
        let query = all_of(self.schema.key_terms("replace", &resolved)?);
        let doc = Document::from_record(&self.records, record)?.to_tantivy(&self.schema)?;

        self.apply("replace", |handle| {
            handle.delete_query(query)?;
            handle.add_document(doc)
        })?;
        log::debug!("Buffered replacement of key {key}");
        Ok(())
    }

    /// Flushes and compacts buffered work, then reopens the write handle.
    ///
    /// On return the indexer holds a fresh handle, whether or not the
    /// commit succeeded. A failed commit leaves the durability of the
    /// buffered batch unknown and is always reported. Compaction runs only
    /// after the batch is durable, so its failure is logged and the commit
    /// still succeeds.
    pub fn commit(&mut self) -> Result<()> {
        let mut handle = self.handle.take().ok_or(Error::Closed)?;
        let pending = std::mem::take(&mut self.pending);
        self.touched.clear();

        let flushed = flush(handle.as_mut(), self.config.merge_on_commit);
        let closed = handle.close();

        self.handle = Some(self.open_handle().map_err(|e| {
            log::error!("Failed to reopen write handle after commit: {e}");
            engine_error("reopen writer", e)
        })?);

        match flushed {
            Ok(()) => {
                if let Err(e) = closed {
                    log::warn!("Background merge did not finish cleanly: {e}");
                }
                log::debug!("Committed {pending} operations");
                Ok(())
            }
            Err(e) if is_resource_exhausted(&e) => {
                log::warn!("Commit of {pending} operations ran out of resources: {e}");
                Err(Error::ResourceExhausted {
                    operation: "commit",
                    recovered: true,
                    message: e.to_string(),
                })
            }
            Err(e) => Err(Error::engine(format!(
                "commit failed, durability of {pending} buffered operations is unknown: {e}"
            ))),
        }
    }

    /// Commits buffered work and releases the write handle.
    ///
    /// If the engine runs out of resources while committing, a fresh handle is
    /// opened instead and the failure comes back as
    /// [`CloseStatus::Recovered`].
    pub fn close(&mut self) -> Result<CloseStatus> {
        let Some(mut handle) = self.handle.take() else {
            return Ok(CloseStatus::AlreadyClosed);
        };
        let pending = std::mem::take(&mut self.pending);
        self.touched.clear();

        let flushed = flush(handle.as_mut(), self.config.merge_on_commit);
        let closed = handle.close();

        match flushed {
            Ok(()) => {
                if let Err(e) = closed {
                    log::warn!("Background merge did not finish cleanly: {e}");
                }
                log::debug!("Closed indexer after committing {pending} operations");
                Ok(CloseStatus::Closed)
            }
            Err(e) if is_resource_exhausted(&e) => {
                log::warn!("Close ran out of resources, reopening write handle: {e}");
                let handle = self.open_handle().map_err(|reopen| Error::ResourceExhausted {
                    operation: "close",
                    recovered: false,
                    message: format!("{e}; reopening failed: {reopen}"),
                })?;
                self.handle = Some(handle);
                Ok(CloseStatus::Recovered {
                    cause: Error::ResourceExhausted {
                        operation: "close",
                        recovered: true,
                        message: e.to_string(),
                    },
                })
            }
            Err(e) => Err(engine_error("close", e)),
        }
    }

    fn open_handle(&self) -> tantivy::Result<Box<dyn WriteHandle>> {
        (self.opener)(self.store.index(), &self.config)
    }

    fn ensure_open(&self) -> Result<()> {
        if self.handle.is_none() {
            return Err(Error::Closed);
        }
        Ok(())
    }

    fn require(&self, strategy: IdentityStrategy, operation: &'static str) -> Result<()> {
        if self.strategy != strategy {
            return Err(Error::StrategyMismatch {
                operation,
                configured: self.strategy.label(),
            });
        }
        self.ensure_open()
    }

    /// Runs one buffered operation against the handle.
    fn apply<F>(&mut self, operation: &'static str, op: F) -> Result<()>
    where
        F: FnOnce(&mut dyn WriteHandle) -> tantivy::Result<()>,
    {
        let handle = self.handle.as_mut().ok_or(Error::Closed)?;
        match op(handle.as_mut()) {
            Ok(()) => {
                self.pending += 1;
                Ok(())
            }
            Err(e) if is_resource_exhausted(&e) => Err(self.recover(operation, e)),
            Err(e) => Err(engine_error(operation, e)),
        }
    }

    /// Replaces a handle that ran out of resources.
    fn recover(&mut self, operation: &'static str, cause: TantivyError) -> Error {
        log::warn!(
            "{operation} ran out of resources, reopening write handle \
             ({} uncommitted operations discarded): {cause}",
            self.pending
        );

        // The old handle holds the index lock until dropped.
        self.handle = None;
        self.pending = 0;
        self.touched.clear();

        match self.open_handle() {
            Ok(handle) => {
                self.handle = Some(handle);
                Error::ResourceExhausted {
                    operation,
                    recovered: true,
                    message: cause.to_string(),
                }
            }
            Err(reopen) => {
                log::error!("Failed to reopen write handle: {reopen}");
                Error::ResourceExhausted {
                    operation,
                    recovered: false,
                    message: format!("{cause}; reopening failed: {reopen}"),
                }
            }
        }
    }
}

impl<R: Record> Drop for Indexer<R> {
    fn drop(&mut self) {
        if self.handle.is_none() {
            return;
        }
        match self.close() {
            Ok(CloseStatus::Recovered { cause }) => {
                log::warn!("Indexer dropped after recovering from a failed close: {cause}");
            }
            Ok(_) => {}
            Err(e) => log::error!("Failed to close indexer on drop: {e}"),
        }
    }
}

impl<R: Record> std::fmt::Debug for Indexer<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Indexer")
            .field("strategy", &self.strategy)
            .field("store", &self.store)
            .field("schema", &self.schema)
            .field("pending", &self.pending)
            .field("touched", &self.touched.len())
            .field("closed", &self.handle.is_none())
            .finish()
    }
}

/// Commits, then compacts. Only the commit decides the result.
fn flush(handle: &mut dyn WriteHandle, merge: bool) -> tantivy::Result<()> {
    handle.commit()?;
    if merge && let Err(e) = handle.merge_segments() {
        log::warn!("Batch is committed but compacting segments failed: {e}");
    }
    Ok(())
}
