/// Record Declaration Module
///
/// The original reflection contract ("derive a schema from a type") is
/// kept, but evaluated at registration time instead of runtime: a type
/// implements [`Record`] to declare its attributes in a stable order,
/// convert itself into storage values, and rebuild itself from a fetched
/// row. The trait is what a derive macro would generate; writing it by
/// hand keeps the mapping explicit.
use crate::core::Result;
use crate::value::{StorageType, StorageValue};
use serde::de::DeserializeOwned;
use std::collections::HashMap;

/// Semantic kind of a declared attribute. Each kind maps to exactly one
/// storage class, so classification is total by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    /// String-like attributes, stored as TEXT
    Text,
    /// Booleans, stored as INTEGER 0/1
    Bool,
    /// Any integer width, stored as INTEGER (64-bit signed)
    Integer,
    /// Any floating-point width, stored as REAL
    Real,
    /// Raw byte buffers, stored as BLOB
    Blob,
    /// Compound values, stored as TEXT holding their JSON encoding
    Json,
}

impl AttrKind {
    /// Storage class an attribute of this kind lands in.
    pub fn storage_type(self) -> StorageType {
        match self {
            AttrKind::Text | AttrKind::Json => StorageType::Text,
            AttrKind::Bool | AttrKind::Integer => StorageType::Integer,
            AttrKind::Real => StorageType::Real,
            AttrKind::Blob => StorageType::Blob,
        }
    }
}

/// A declared attribute: name plus semantic kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttrKind,
}

impl Attribute {
    pub const fn new(name: &'static str, kind: AttrKind) -> Self {
        Attribute { name, kind }
    }
}

/// A data type that can be mapped to a table.
///
/// `attributes()` must return the same sequence on every call (schema
/// derivation and row materialization both rely on it), and `to_values()`
/// must emit one entry per declared attribute, keyed by attribute name.
pub trait Record: Sized {
    /// Default table name for this type, used when the caller does not
    /// choose one.
    fn table_name() -> &'static str;

    /// Declared attributes in a stable, reproducible order.
    fn attributes() -> &'static [Attribute];

    /// Converts the object into named storage values. Fails only if a
    /// compound attribute cannot be JSON-encoded.
    fn to_values(&self) -> Result<Vec<(&'static str, StorageValue)>>;

    /// Rebuilds an object from a fetched row. Attributes absent from the
    /// row (dropped columns, NULLs, schema evolution) should fall back to
    /// a default rather than fail.
    fn from_row(row: &Row) -> Result<Self>;
}

/// One fetched row, keyed by column name. NULL columns are absent.
///
/// The getters perform the storage-to-native coercions. Absent columns
/// fall back to the type's default value, which is what makes additive
/// schema evolution tolerable: an object type can gain or lose attributes
/// without old rows becoming unreadable.
///
/// Integer narrowing is the caller's move: `integer` always returns the
/// full 64-bit value, and a narrowing `as` cast in a `from_row`
/// implementation truncates with two's-complement wraparound (Rust's
/// defined `as` semantics). That truncation is intentional, matching how
/// the store widens every integer to 64 bits on the way in.
#[derive(Debug, Clone, Default)]
pub struct Row {
    values: HashMap<String, StorageValue>,
}

impl Row {
    pub fn from_values(values: HashMap<String, StorageValue>) -> Self {
        Row { values }
    }

    /// Raw storage value of a column, if present and non-NULL.
    pub fn storage(&self, column: &str) -> Option<&StorageValue> {
        self.values.get(column)
    }

    /// The synthetic primary key assigned by the store, if selected.
    pub fn pk(&self) -> Option<i64> {
        match self.values.get(crate::schema::PRIMARY_KEY) {
            Some(StorageValue::Integer(i)) => Some(*i),
            _ => None,
        }
    }

    /// Text attribute; empty string when absent or of another kind.
    pub fn text(&self, column: &str) -> String {
        match self.values.get(column) {
            Some(StorageValue::Text(s)) => s.clone(),
            _ => String::new(),
        }
    }

    /// Integer attribute as the full stored width; 0 when absent.
    pub fn integer(&self, column: &str) -> i64 {
        match self.values.get(column) {
            Some(StorageValue::Integer(i)) => *i,
            _ => 0,
        }
    }

    /// Boolean attribute, decoded from INTEGER 0/1; false when absent.
    pub fn boolean(&self, column: &str) -> bool {
        match self.values.get(column) {
            Some(StorageValue::Integer(i)) => *i != 0,
            _ => false,
        }
    }

    /// Real attribute; integers widen, 0.0 when absent.
    pub fn real(&self, column: &str) -> f64 {
        match self.values.get(column) {
            Some(StorageValue::Real(f)) => *f,
            Some(StorageValue::Integer(i)) => *i as f64,
            _ => 0.0,
        }
    }

    /// Blob attribute; empty buffer when absent.
    pub fn blob(&self, column: &str) -> Vec<u8> {
        match self.values.get(column) {
            Some(StorageValue::Blob(b)) => b.clone(),
            _ => Vec::new(),
        }
    }

    /// Compound attribute, JSON-decoded from its TEXT storage form.
    ///
    /// Returns `Ok(None)` when the column is absent, and a decode error
    /// when the stored text is malformed for the target type.
    pub fn json<T: DeserializeOwned>(&self, column: &str) -> Result<Option<T>> {
        match self.values.get(column) {
            Some(StorageValue::Text(s)) => Ok(Some(crate::value::decode_from_text(s)?)),
            _ => Ok(None),
        }
    }
}
