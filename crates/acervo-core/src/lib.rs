//! Acervo Core: shared types, errors, and record descriptors.
//!
//! This crate has no search-engine dependency (dependency level 0).
//!
//! # Modules
//!
//! - [`error`]: Error taxonomy and Result alias
//! - [`ids`]: Generated record identifiers
//! - [`record`]: Field descriptors replacing runtime reflection
//! - [`key`]: Key objects for key-field identity
//! - [`config`]: Index configuration

#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod ids;
pub mod key;
pub mod record;

// Re-export key types at crate root for convenience
pub use config::{Conjunction, IndexConfig};
pub use error::{Error, Result};
pub use ids::{ID_FIELD, RecordId};
pub use key::KeyValues;
pub use record::{FieldDescriptor, FieldRole, Record, RecordSchema, RecordSchemaBuilder, StoredValue};
