//! Record field descriptors.
//!
//! A record type describes itself once with a [`RecordSchema`]: every field
//! gets a name, a [`FieldRole`], a getter and a setter. The declared Rust
//! type of the field (through [`StoredValue`]) decides how the value is
//! written to the index as a string and how that string is parsed back.
//!
//! ```rust
//! use acervo_core::{Record, RecordSchema};
//!
//! #[derive(Debug, Default, Clone, PartialEq)]
//! struct Person {
//!     cpf: String,
//!     name: String,
//!     age: u32,
//! }
//!
//! impl Record for Person {
//!     fn schema() -> RecordSchema<Self> {
//!         RecordSchema::builder()
//!             .key("cpf", |p: &Person| &p.cpf, |p, v| p.cpf = v)
//!             .field("name", |p: &Person| &p.name, |p, v| p.name = v)
//!             .field("age", |p: &Person| &p.age, |p, v| p.age = v)
//!             .build()
//!             .expect("valid schema")
//!     }
//! }
//!
//! let schema = Person::schema();
//! assert_eq!(schema.key_fields().count(), 1);
//! ```

use std::collections::HashSet;
use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::ids::{ID_FIELD, RecordId};
use crate::key::KeyValues;

/// How a field participates in identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldRole {
    /// Part of the caller-declared key; indexed verbatim in key-field mode.
    Key,
    /// Regular content; analyzed for full-text search.
    Ordinary,
}

/// A value that has a string form in the index.
///
/// `to_stored` returns `Ok(None)` when there is nothing to store (an empty
/// `Option`). Errors are plain messages; the descriptor adds field context.
pub trait StoredValue: Sized {
    /// Encodes the value as its stored string.
    fn to_stored(&self) -> std::result::Result<Option<String>, String>;

    /// Parses a stored string back into the value.
    fn from_stored(raw: &str) -> std::result::Result<Self, String>;

    /// Human-readable name of the declared type, used in error reports.
    fn type_name() -> &'static str {
        std::any::type_name::<Self>()
    }
}

macro_rules! stored_via_str {
    ($($t:ty),* $(,)?) => {
        $(
            impl StoredValue for $t {
                fn to_stored(&self) -> std::result::Result<Option<String>, String> {
                    Ok(Some(self.to_string()))
                }

                fn from_stored(raw: &str) -> std::result::Result<Self, String> {
                    raw.parse::<$t>().map_err(|e| e.to_string())
                }

                fn type_name() -> &'static str {
                    stringify!($t)
                }
            }
        )*
    };
}

stored_via_str!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, NaiveDate
);

macro_rules! stored_float {
    ($($t:ty),*) => {
        $(
            impl StoredValue for $t {
                fn to_stored(&self) -> std::result::Result<Option<String>, String> {
                    if !self.is_finite() {
                        return Err(format!("{self} has no stable stored form"));
                    }
                    Ok(Some(self.to_string()))
                }

                fn from_stored(raw: &str) -> std::result::Result<Self, String> {
                    raw.trim().parse::<$t>().map_err(|e| e.to_string())
                }

                fn type_name() -> &'static str {
                    stringify!($t)
                }
            }
        )*
    };
}

stored_float!(f32, f64);

impl StoredValue for String {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        Ok(Some(self.clone()))
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        Ok(raw.to_string())
    }

    fn type_name() -> &'static str {
        "String"
    }
}

impl StoredValue for Uuid {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        Ok(Some(self.hyphenated().to_string()))
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        Uuid::parse_str(raw).map_err(|e| e.to_string())
    }

    fn type_name() -> &'static str {
        "Uuid"
    }
}

impl StoredValue for RecordId {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        Ok(Some(self.to_string()))
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        raw.parse().map_err(|e: uuid::Error| e.to_string())
    }

    fn type_name() -> &'static str {
        "RecordId"
    }
}

impl StoredValue for NaiveDateTime {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        Ok(Some(self.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        raw.parse::<NaiveDateTime>().map_err(|e| e.to_string())
    }

    fn type_name() -> &'static str {
        "NaiveDateTime"
    }
}

impl StoredValue for DateTime<Utc> {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        Ok(Some(self.to_rfc3339()))
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| e.to_string())
    }

    fn type_name() -> &'static str {
        "DateTime<Utc>"
    }
}

impl<T: StoredValue> StoredValue for Option<T> {
    fn to_stored(&self) -> std::result::Result<Option<String>, String> {
        match self {
            Some(value) => value.to_stored(),
            None => Ok(None),
        }
    }

    fn from_stored(raw: &str) -> std::result::Result<Self, String> {
        T::from_stored(raw).map(Some)
    }

    fn type_name() -> &'static str {
        T::type_name()
    }
}

type Getter<R> = Box<dyn Fn(&R) -> Result<Option<String>> + Send + Sync>;
type Setter<R> = Box<dyn Fn(&mut R, &str) -> Result<()> + Send + Sync>;

/// Name, role, type and accessors of one record field.
pub struct FieldDescriptor<R> {
    name: String,
    role: FieldRole,
    type_name: &'static str,
    get: Getter<R>,
    set: Setter<R>,
}

impl<R: 'static> FieldDescriptor<R> {
    /// Describes a field from a plain getter and setter.
    pub fn new<T>(
        name: impl Into<String>,
        role: FieldRole,
        get: fn(&R) -> &T,
        set: fn(&mut R, T),
    ) -> Self
    where
        T: StoredValue + 'static,
    {
        let name = name.into();
        let get_name = name.clone();
        let set_name = name.clone();

        Self {
            role,
            type_name: T::type_name(),
            get: Box::new(move |record| {
                get(record)
                    .to_stored()
                    .map_err(|message| Error::mapping(get_name.as_str(), message))
            }),
            set: Box::new(move |record, raw| {
                let value = T::from_stored(raw).map_err(|message| Error::ConversionFailure {
                    field: set_name.clone(),
                    type_name: T::type_name(),
                    value: raw.to_string(),
                    message,
                })?;
                set(record, value);
                Ok(())
            }),
            name,
        }
    }
}

impl<R> FieldDescriptor<R> {
    /// Field name, used verbatim as the document field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Role of the field.
    pub fn role(&self) -> FieldRole {
        self.role
    }

    /// Returns true for key fields.
    pub fn is_key(&self) -> bool {
        self.role == FieldRole::Key
    }

    /// Declared type name.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Reads the stored string of this field from a record.
    pub fn read(&self, record: &R) -> Result<Option<String>> {
        (self.get)(record)
    }

    /// Parses `raw` into the declared type and writes it onto the record.
    pub fn write(&self, record: &mut R, raw: &str) -> Result<()> {
        (self.set)(record, raw)
    }
}

impl<R> fmt::Debug for FieldDescriptor<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("role", &self.role)
            .field("type_name", &self.type_name)
            .finish()
    }
}

/// The complete, validated field layout of a record type.
pub struct RecordSchema<R> {
    fields: Vec<FieldDescriptor<R>>,
    id_setter: Option<fn(&mut R, RecordId)>,
}

impl<R: 'static> RecordSchema<R> {
    /// Starts a schema builder.
    pub fn builder() -> RecordSchemaBuilder<R> {
        RecordSchemaBuilder {
            fields: Vec::new(),
            id_setter: None,
        }
    }
}

impl<R> RecordSchema<R> {
    /// All fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor<R>] {
        &self.fields
    }

    /// Looks up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<R>> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Fields declared with [`FieldRole::Key`].
    pub fn key_fields(&self) -> impl Iterator<Item = &FieldDescriptor<R>> {
        self.fields.iter().filter(|f| f.is_key())
    }

    /// Whether any key field is declared.
    pub fn has_key_fields(&self) -> bool {
        self.fields.iter().any(FieldDescriptor::is_key)
    }

    /// Encodes every field of a record as `(name, stored string)` pairs.
    ///
    /// Fields whose value has no stored form (an empty `Option`) are left
    /// out.
    pub fn to_stored_fields(&self, record: &R) -> Result<Vec<(&str, String)>> {
        let mut out = Vec::with_capacity(self.fields.len());
        for field in &self.fields {
            if let Some(value) = field.read(record)? {
                out.push((field.name(), value));
            }
        }
        Ok(out)
    }

    /// Writes one stored value onto the record, parsing it by declared type.
    pub fn assign(&self, record: &mut R, name: &str, raw: &str) -> Result<()> {
        match self.field(name) {
            Some(field) => field.write(record, raw),
            None => Err(Error::ConversionFailure {
                field: name.to_string(),
                type_name: "<undeclared>",
                value: raw.to_string(),
                message: "record type declares no such field".to_string(),
            }),
        }
    }

    /// Hands a generated identifier to the record, if it accepts one.
    pub fn assign_id(&self, record: &mut R, id: RecordId) {
        if let Some(set) = self.id_setter {
            set(record, id);
        }
    }

    /// Extracts the key of a record.
    pub fn key_of(&self, record: &R) -> Result<KeyValues> {
        let mut key = KeyValues::new();
        for field in self.key_fields() {
            let value = field
                .read(record)?
                .ok_or_else(|| Error::mapping(field.name(), "key field has no value"))?;
            key.insert(field.name(), value);
        }
        Ok(key)
    }

    /// Checks that a key names exactly the declared key fields.
    ///
    /// Returns the `(field, value)` pairs in declaration order.
    pub fn resolve_key<'k>(&self, key: &'k KeyValues) -> Result<Vec<(&str, &'k str)>> {
        if key.is_empty() {
            return Err(Error::invalid_key("key has no fields"));
        }

        let mut resolved = Vec::new();
        for field in self.key_fields() {
            let value = key.get(field.name()).ok_or_else(|| {
                Error::invalid_key(format!("missing value for key field `{}`", field.name()))
            })?;
            resolved.push((field.name(), value));
        }

        if let Some(extra) = key
            .names()
            .find(|name| self.field(name).is_none_or(|f| !f.is_key()))
        {
            return Err(Error::invalid_key(format!("`{extra}` is not a key field")));
        }

        Ok(resolved)
    }
}

impl<R> fmt::Debug for RecordSchema<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordSchema")
            .field("fields", &self.fields)
            .field("accepts_id", &self.id_setter.is_some())
            .finish()
    }
}

/// Builder for [`RecordSchema`].
pub struct RecordSchemaBuilder<R> {
    fields: Vec<FieldDescriptor<R>>,
    id_setter: Option<fn(&mut R, RecordId)>,
}

impl<R: 'static> RecordSchemaBuilder<R> {
    /// Adds a key field.
    pub fn key<T>(self, name: &str, get: fn(&R) -> &T, set: fn(&mut R, T)) -> Self
    where
        T: StoredValue + 'static,
    {
        self.descriptor(FieldDescriptor::new(name, FieldRole::Key, get, set))
    }

    /// Adds an ordinary, full-text field.
    pub fn field<T>(self, name: &str, get: fn(&R) -> &T, set: fn(&mut R, T)) -> Self
    where
        T: StoredValue + 'static,
    {
        self.descriptor(FieldDescriptor::new(name, FieldRole::Ordinary, get, set))
    }

    /// Adds a pre-built descriptor.
    pub fn descriptor(mut self, descriptor: FieldDescriptor<R>) -> Self {
        self.fields.push(descriptor);
        self
    }

    /// Lets point lookups hand the stored `#id` back to the record.
    pub fn identifier(mut self, set: fn(&mut R, RecordId)) -> Self {
        self.id_setter = Some(set);
        self
    }

    /// Validates and finishes the schema.
    ///
    /// Fails on an empty schema, duplicate names, empty names, names
    /// starting with `-`, and the reserved `#id` name.
    pub fn build(self) -> Result<RecordSchema<R>> {
        if self.fields.is_empty() {
            return Err(Error::config("record schema declares no fields"));
        }

        let mut seen = HashSet::new();
        for field in &self.fields {
            if field.name.trim().is_empty() {
                return Err(Error::config("record field names must not be empty"));
            }
            // The index refuses these; in query text they read as exclusions.
            if field.name.starts_with('-') {
                return Err(Error::config(format!(
                    "field `{}` must not start with `-`",
                    field.name
                )));
            }
            if field.name == ID_FIELD {
                return Err(Error::config(format!("`{ID_FIELD}` is a reserved field name")));
            }
            if !seen.insert(field.name.as_str()) {
                return Err(Error::config(format!(
                    "field `{}` is declared twice",
                    field.name
                )));
            }
        }

        Ok(RecordSchema {
            fields: self.fields,
            id_setter: self.id_setter,
        })
    }
}

/// A type that can be stored in and reconstructed from the index.
///
/// Reconstruction starts from `Default::default()` and assigns every stored
/// field through its descriptor.
pub trait Record: Default + 'static {
    /// Describes the record's fields.
    fn schema() -> RecordSchema<Self>;
}
