//! Brazilian-Portuguese text analysis.
//!
//! Every analyzed field, and the query text searched against it, goes
//! through the `pt_br` analyzer:
//!
//! SimpleTokenizer → RemoveLongFilter → LowerCaser → StopWordFilter →
//! Stemmer(Portuguese) → AsciiFoldingFilter
//!
//! Stop words come from the `stop-words` crate's Portuguese list, extended
//! with `IndexConfig::custom_stopwords` and minus `IndexConfig::allowlist`.
//! Folding runs after stemming so "joão" and "joao" meet on the same term.

use std::collections::BTreeSet;

use acervo_core::IndexConfig;
use stop_words::{LANGUAGE, get};
use tantivy::Index;
use tantivy::tokenizer::{
    AsciiFoldingFilter, Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer,
    StopWordFilter, TextAnalyzer,
};

/// Name under which the analyzer is registered with an index.
pub const TOKENIZER_NAME: &str = "pt_br";

/// Effective stop word list for the analyzer.
pub struct StopwordList {
    words: BTreeSet<String>,
    enabled: bool,
}

impl StopwordList {
    /// Builds the list from configuration.
    pub fn new(config: &IndexConfig) -> Self {
        let mut words: BTreeSet<String> = get(LANGUAGE::Portuguese)
            .iter()
            .map(|s| s.to_lowercase())
            .collect();

        for word in &config.custom_stopwords {
            words.insert(word.to_lowercase());
        }
        for word in &config.allowlist {
            words.remove(&word.to_lowercase());
        }

        Self {
            words,
            enabled: config.stopwords_enabled,
        }
    }

    /// Whether the (lowercased) word is dropped during analysis.
    pub fn is_stopword(&self, word: &str) -> bool {
        self.enabled && self.words.contains(&word.to_lowercase())
    }

    /// Number of words the filter removes.
    pub fn len(&self) -> usize {
        if self.enabled { self.words.len() } else { 0 }
    }

    /// Whether nothing is filtered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn into_filter(self) -> StopWordFilter {
        if self.enabled {
            StopWordFilter::remove(self.words)
        } else {
            StopWordFilter::remove(Vec::<String>::new())
        }
    }
}

impl std::fmt::Debug for StopwordList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StopwordList")
            .field("enabled", &self.enabled)
            .field("stopword_count", &self.words.len())
            .finish()
    }
}

/// Builds the `pt_br` analyzer.
pub fn build_analyzer(config: &IndexConfig) -> TextAnalyzer {
    TextAnalyzer::builder(SimpleTokenizer::default())
        .filter(RemoveLongFilter::limit(config.max_token_length))
        .filter(LowerCaser)
        .filter(StopwordList::new(config).into_filter())
        .filter(Stemmer::new(Language::Portuguese))
        .filter(AsciiFoldingFilter)
        .build()
}

/// Registers the analyzer with an index.
///
/// Must be called after creating or opening an index, since tokenizers are
/// not persisted with it.
pub fn register(index: &Index, config: &IndexConfig) {
    index
        .tokenizers()
        .register(TOKENIZER_NAME, build_analyzer(config));
}
