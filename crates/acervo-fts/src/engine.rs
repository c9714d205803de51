//! Narrow seam over the search engine.
//!
//! [`IndexStore`] opens or creates the on-disk index; [`WriteHandle`] is
//! the only way the indexer mutates it. Engine failures come back as raw
//! `tantivy::TantivyError`s so the indexer can classify them in one place
//! with [`is_resource_exhausted`].

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use acervo_core::{Error, IndexConfig, Result};
use tantivy::directory::MmapDirectory;
use tantivy::merge_policy::NoMergePolicy;
use tantivy::query::Query;
use tantivy::schema::Schema;
use tantivy::{Index, IndexWriter, TantivyDocument, TantivyError, Term};

use crate::analyzer;

/// File Tantivy writes once an index exists in a directory.
const META_FILE: &str = "meta.json";

/// Write operations the indexer needs from the engine.
pub trait WriteHandle: Send {
    /// Buffers a document.
    fn add_document(&mut self, doc: TantivyDocument) -> tantivy::Result<()>;

    /// Buffers deletion of every document containing `term`.
    fn delete_term(&mut self, term: Term) -> tantivy::Result<()>;

    /// Buffers deletion of every document matching `query`.
    fn delete_query(&mut self, query: Box<dyn Query>) -> tantivy::Result<()>;

    /// Makes buffered work durable and visible to new readers.
    fn commit(&mut self) -> tantivy::Result<()>;

    /// Compacts all committed segments into one, purging deleted documents.
    fn merge_segments(&mut self) -> tantivy::Result<()>;

    /// Waits for background work and releases the index lock.
    fn close(self: Box<Self>) -> tantivy::Result<()>;
}

/// Tantivy's `IndexWriter` behind [`WriteHandle`].
pub struct TantivyWriter {
    writer: IndexWriter,
}

impl TantivyWriter {
    /// Acquires the index's single write handle.
    ///
    /// One indexing thread keeps document order equal to insertion order.
    /// When segments are merged on commit, background merging is disabled.
    pub fn open(index: &Index, config: &IndexConfig) -> tantivy::Result<Self> {
        let writer: IndexWriter = index.writer_with_num_threads(1, config.writer_memory_bytes)?;
        if config.merge_on_commit {
            writer.set_merge_policy(Box::new(NoMergePolicy));
        }
        Ok(Self { writer })
    }
}

impl WriteHandle for TantivyWriter {
    fn add_document(&mut self, doc: TantivyDocument) -> tantivy::Result<()> {
        self.writer.add_document(doc)?;
        Ok(())
    }

    fn delete_term(&mut self, term: Term) -> tantivy::Result<()> {
        self.writer.delete_term(term);
        Ok(())
    }

    fn delete_query(&mut self, query: Box<dyn Query>) -> tantivy::Result<()> {
        self.writer.delete_query(query)?;
        Ok(())
    }

    fn commit(&mut self) -> tantivy::Result<()> {
        self.writer.commit()?;
        Ok(())
    }

    fn merge_segments(&mut self) -> tantivy::Result<()> {
        let metas = self.writer.index().searchable_segment_metas()?;
        let compact = match metas.as_slice() {
            [] => false,
            [only] => only.has_deletes(),
            _ => true,
        };
        if compact {
            let segment_ids: Vec<_> = metas.iter().map(|meta| meta.id()).collect();
            log::debug!("Merging {} segments", segment_ids.len());
            self.writer.merge(&segment_ids).wait()?;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> tantivy::Result<()> {
        self.writer.wait_merging_threads()
    }
}

/// Opens a [`TantivyWriter`] as a boxed handle.
pub fn open_writer(index: &Index, config: &IndexConfig) -> tantivy::Result<Box<dyn WriteHandle>> {
    Ok(Box::new(TantivyWriter::open(index, config)?))
}

/// Whether an engine failure means memory or worker threads ran out.
///
/// These are the failures after which the write handle is unusable and
/// must be replaced.
pub fn is_resource_exhausted(err: &TantivyError) -> bool {
    match err {
        TantivyError::IoError(io) => io.kind() == ErrorKind::OutOfMemory,
        TantivyError::ErrorInThread(_) | TantivyError::Poisoned | TantivyError::SystemError(_) => {
            true
        }
        TantivyError::InternalError(message) => {
            let message = message.to_lowercase();
            message.contains("memory arena") || message.contains("out of memory")
        }
        _ => false,
    }
}

/// Converts an engine failure outside the recovery paths.
pub fn engine_error(operation: &'static str, err: TantivyError) -> Error {
    if is_resource_exhausted(&err) {
        Error::ResourceExhausted {
            operation,
            recovered: false,
            message: err.to_string(),
        }
    } else {
        Error::engine(format!("{operation} failed: {err}"))
    }
}

/// An opened index and where it lives.
pub struct IndexStore {
    index: Index,
    path: Option<PathBuf>,
    new_index: bool,
}

impl IndexStore {
    /// Opens the index at `path`, creating it with `schema` if none exists.
    ///
    /// An existing index must have been created with the same schema.
    pub fn open_or_create(path: &Path, schema: &Schema, config: &IndexConfig) -> Result<Self> {
        let new_index = !Self::exists(path);

        if new_index && !path.exists() {
            std::fs::create_dir_all(path).map_err(|e| Error::io_with_path(e, path))?;
        }

        let index = if new_index {
            Index::create_in_dir(path, schema.clone())
                .map_err(|e| engine_error("create index", e))?
        } else {
            let index = Self::open_dir(path)?;
            if index.schema() != *schema {
                return Err(Error::IncompatibleIndex {
                    path: path.to_path_buf(),
                    message: "index was created for a different record layout or identity strategy"
                        .to_string(),
                });
            }
            index
        };

        analyzer::register(&index, config);
        log::debug!(
            "Opened index at {} (new: {new_index})",
            path.display()
        );

        Ok(Self {
            index,
            path: Some(path.to_path_buf()),
            new_index,
        })
    }

    /// Opens an index that must already exist.
    pub fn open_existing(path: &Path, config: &IndexConfig) -> Result<Self> {
        if !Self::exists(path) {
            return Err(Error::IncompatibleIndex {
                path: path.to_path_buf(),
                message: "no index exists at this path".to_string(),
            });
        }

        let index = Self::open_dir(path)?;
        analyzer::register(&index, config);

        Ok(Self {
            index,
            path: Some(path.to_path_buf()),
            new_index: false,
        })
    }

    /// Creates a RAM-backed index (for testing).
    pub fn in_memory(schema: &Schema, config: &IndexConfig) -> Self {
        let index = Index::create_in_ram(schema.clone());
        analyzer::register(&index, config);
        Self {
            index,
            path: None,
            new_index: true,
        }
    }

    /// Wraps an already-open index, such as the indexer's own.
    pub fn from_index(index: Index, config: &IndexConfig) -> Self {
        analyzer::register(&index, config);
        Self {
            index,
            path: None,
            new_index: false,
        }
    }

    /// Whether an index exists at `path`.
    pub fn exists(path: &Path) -> bool {
        path.join(META_FILE).exists()
    }

    fn open_dir(path: &Path) -> Result<Index> {
        let directory = MmapDirectory::open(path)
            .map_err(|e| Error::engine(format!("failed to open index directory: {e}")))?;
        Index::open(directory).map_err(|e| engine_error("open index", e))
    }

    /// The Tantivy index.
    pub fn index(&self) -> &Index {
        &self.index
    }

    /// Directory of the index, if on disk.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// True iff no index existed before this store was opened.
    pub fn is_new_index(&self) -> bool {
        self.new_index
    }
}

impl std::fmt::Debug for IndexStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexStore")
            .field("path", &self.path)
            .field("new_index", &self.new_index)
            .finish()
    }
}
