//! Index configuration.
//!
//! Every field has a default, so a partial TOML file (or none at all) is a
//! valid configuration.
//!
//! ```toml
//! max_results = 500
//! default_conjunction = "and"
//! custom_stopwords = ["ltda"]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How the terms of a query string are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Conjunction {
    /// Any term may match.
    #[default]
    Or,
    /// All terms must match.
    And,
}

/// Settings shared by the indexer and the searcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Memory budget of the write handle, in bytes.
    #[serde(default = "default_writer_memory")]
    pub writer_memory_bytes: usize,

    /// Upper bound on the number of hits a search collects.
    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Default combination of query terms.
    #[serde(default)]
    pub default_conjunction: Conjunction,

    /// Tokens of this many bytes or more are dropped by the analyzer.
    #[serde(default = "default_max_token_length")]
    pub max_token_length: usize,

    /// Merge all segments into one on every commit.
    #[serde(default = "default_true")]
    pub merge_on_commit: bool,

    /// Remove Portuguese stop words while analyzing.
    #[serde(default = "default_true")]
    pub stopwords_enabled: bool,

    /// Extra stop words.
    #[serde(default)]
    pub custom_stopwords: Vec<String>,

    /// Words kept even though they are on the stop word list.
    #[serde(default)]
    pub allowlist: Vec<String>,
}

/// Smallest write buffer the engine accepts for its single indexing thread.
pub const MIN_WRITER_MEMORY: usize = 15_000_000;

fn default_writer_memory() -> usize {
    50_000_000
}

fn default_max_results() -> usize {
    100_000
}

fn default_max_token_length() -> usize {
    40
}

fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            writer_memory_bytes: default_writer_memory(),
            max_results: default_max_results(),
            default_conjunction: Conjunction::default(),
            max_token_length: default_max_token_length(),
            merge_on_commit: default_true(),
            stopwords_enabled: default_true(),
            custom_stopwords: Vec::new(),
            allowlist: Vec::new(),
        }
    }
}

impl IndexConfig {
    /// Parses a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: IndexConfig =
            toml::from_str(text).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Loads a configuration file.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
        let config = Self::from_toml_str(&text)?;
        log::debug!("Loaded index configuration from {}", path.display());
        Ok(config)
    }

    /// Rejects values the engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_results == 0 {
            return Err(Error::config("max_results must be at least 1"));
        }
        if self.writer_memory_bytes < MIN_WRITER_MEMORY {
            return Err(Error::config(format!(
                "writer_memory_bytes must be at least {MIN_WRITER_MEMORY}"
            )));
        }
        if self.max_token_length == 0 {
            return Err(Error::config("max_token_length must be at least 1"));
        }
        Ok(())
    }
}
