//! Full-text indexing of typed records for Acervo.
//!
//! Records describe their fields once (see `acervo_core::Record`); this
//! crate maps them onto a Tantivy index analyzed for Brazilian Portuguese
//! and reconstructs them from search results.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       acervo-fts                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Indexer<R>   (write handle, identity strategy, commit)     │
//! │  Searcher<R>  (read snapshot, point lookup, ranked search)  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Document     (record <-> stored strings)                   │
//! │  IndexSchema  (exact key fields, analyzed text fields)      │
//! │  pt_br analyzer (stop words, Portuguese stemmer, folding)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  WriteHandle / IndexStore (engine seam over Tantivy)        │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Identity
//!
//! | Strategy | `add` returns | Delete with | Stored identity |
//! |----------|---------------|-------------|-----------------|
//! | `AutoGenerated` | fresh UUID | `remove(id)` | `#id` (exact) |
//! | `KeyFields` | nil UUID | `remove_key(key)` | key fields (exact) |
//!
//! Calling an operation of the other strategy fails with
//! `Error::StrategyMismatch`.
//!
//! # Example
//!
//! ```rust,no_run
//! use acervo_core::{Record, RecordSchema};
//! use acervo_fts::{Indexer, Searcher};
//!
//! #[derive(Debug, Default)]
//! struct Person {
//!     name: String,
//!     city: String,
//! }
//!
//! impl Record for Person {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::builder()
//!             .field("name", |p: &Person| &p.name, |p, v| p.name = v)
//!             .field("city", |p: &Person| &p.city, |p, v| p.city = v)
//!             .build()
//!             .expect("valid schema")
//!     }
//! }
//!
//! # fn main() -> acervo_core::Result<()> {
//! let mut indexer = Indexer::<Person>::open("/var/lib/acervo/people", true)?;
//! indexer.add(&Person {
//!     name: "João".to_string(),
//!     city: "São Paulo".to_string(),
//! })?;
//! indexer.commit()?;
//!
//! let searcher = Searcher::<Person>::open("/var/lib/acervo/people")?;
//! for person in searcher.search("paulo", &["city"])? {
//!     println!("{}", person?.name);
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod analyzer;
pub mod document;
pub mod engine;
pub mod indexer;
pub mod schema;
pub mod searcher;
pub mod types;

// Re-exports
pub use analyzer::{StopwordList, TOKENIZER_NAME};
pub use document::Document;
pub use engine::{IndexStore, WriteHandle};
pub use indexer::Indexer;
pub use schema::IndexSchema;
pub use searcher::{SearchResults, Searcher};
pub use types::{CloseStatus, IdentityStrategy};
