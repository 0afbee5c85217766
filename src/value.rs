/// Value Coercion Module
///
/// This module converts between an attribute's native value and the four
/// storage primitives the store supports (TEXT, INTEGER, REAL, BLOB), and
/// binds those primitives as SQL parameters. Every caller-supplied value
/// crosses this boundary as a bound parameter, never as interpolated SQL
/// text. Column and table names cannot be parameterized in SQL, so they
/// are validated against an identifier allow-list instead.
use crate::core::{ModeliteError, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::{ToSql, ToSqlOutput, Value, ValueRef};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;

/// The four column storage classes supported by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageType {
    Text,
    Integer,
    Real,
    Blob,
}

impl StorageType {
    /// SQL type name used in CREATE TABLE / ALTER TABLE statements.
    pub fn sql_name(self) -> &'static str {
        match self {
            StorageType::Text => "TEXT",
            StorageType::Integer => "INTEGER",
            StorageType::Real => "REAL",
            StorageType::Blob => "BLOB",
        }
    }

    /// Parses the declared type of an existing column, as reported by
    /// PRAGMA table_info. Unknown declarations map to TEXT, mirroring
    /// SQLite's own affinity fallback.
    pub fn from_declared(decl: &str) -> StorageType {
        match decl.trim().to_uppercase().as_str() {
            "INTEGER" => StorageType::Integer,
            "REAL" => StorageType::Real,
            "BLOB" => StorageType::Blob,
            _ => StorageType::Text,
        }
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.sql_name())
    }
}

/// A value in storage form, ready to be bound as a SQL parameter.
///
/// Booleans are stored as `Integer` 0/1. Compound values are stored as
/// `Text` holding their JSON encoding (see [`encode_to_text`]). SQL NULL
/// has no variant here: a NULL column in a fetched row is surfaced as an
/// absent value instead.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageValue {
    Text(String),
    Integer(i64),
    Real(f64),
    Blob(Vec<u8>),
}

impl StorageValue {
    /// The storage class this value belongs to.
    pub fn storage_type(&self) -> StorageType {
        match self {
            StorageValue::Text(_) => StorageType::Text,
            StorageValue::Integer(_) => StorageType::Integer,
            StorageValue::Real(_) => StorageType::Real,
            StorageValue::Blob(_) => StorageType::Blob,
        }
    }

    /// Converts a fetched column value into storage form. NULL becomes
    /// `None`; the caller treats the column as absent.
    pub fn from_sql_ref(value: ValueRef<'_>) -> Option<StorageValue> {
        match value {
            ValueRef::Null => None,
            ValueRef::Integer(i) => Some(StorageValue::Integer(i)),
            ValueRef::Real(f) => Some(StorageValue::Real(f)),
            ValueRef::Text(t) => Some(StorageValue::Text(String::from_utf8_lossy(t).to_string())),
            ValueRef::Blob(b) => Some(StorageValue::Blob(b.to_vec())),
        }
    }

    /// Textual form of the value, used when a LIKE pattern is built from
    /// it at bind time. Blobs have no textual form.
    pub fn text_form(&self) -> Result<String> {
        match self {
            StorageValue::Text(s) => Ok(s.clone()),
            StorageValue::Integer(i) => Ok(i.to_string()),
            StorageValue::Real(f) => Ok(f.to_string()),
            StorageValue::Blob(_) => Err(ModeliteError::Coercion(
                "blob values have no textual form".to_string(),
            )),
        }
    }
}

impl fmt::Display for StorageValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageValue::Text(s) => write!(f, "{}", s),
            StorageValue::Integer(i) => write!(f, "{}", i),
            StorageValue::Real(r) => write!(f, "{}", r),
            StorageValue::Blob(b) => write!(f, "<BLOB: {} bytes>", b.len()),
        }
    }
}

impl ToSql for StorageValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            StorageValue::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            StorageValue::Integer(i) => ToSqlOutput::Owned(Value::Integer(*i)),
            StorageValue::Real(f) => ToSqlOutput::Owned(Value::Real(*f)),
            StorageValue::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<&str> for StorageValue {
    fn from(v: &str) -> Self {
        StorageValue::Text(v.to_string())
    }
}

impl From<String> for StorageValue {
    fn from(v: String) -> Self {
        StorageValue::Text(v)
    }
}

impl From<i64> for StorageValue {
    fn from(v: i64) -> Self {
        StorageValue::Integer(v)
    }
}

impl From<i32> for StorageValue {
    fn from(v: i32) -> Self {
        StorageValue::Integer(v as i64)
    }
}

impl From<u32> for StorageValue {
    fn from(v: u32) -> Self {
        StorageValue::Integer(v as i64)
    }
}

impl From<bool> for StorageValue {
    fn from(v: bool) -> Self {
        StorageValue::Integer(v as i64)
    }
}

impl From<f64> for StorageValue {
    fn from(v: f64) -> Self {
        StorageValue::Real(v)
    }
}

impl From<f32> for StorageValue {
    fn from(v: f32) -> Self {
        StorageValue::Real(v as f64)
    }
}

impl From<Vec<u8>> for StorageValue {
    fn from(v: Vec<u8>) -> Self {
        StorageValue::Blob(v)
    }
}

impl From<&[u8]> for StorageValue {
    fn from(v: &[u8]) -> Self {
        StorageValue::Blob(v.to_vec())
    }
}

/// Allow-list for table and column identifiers: ASCII letters, digits and
/// underscore, not starting with a digit. Identifiers are the one part of
/// a statement that cannot be bound as a parameter, so everything that
/// ends up in SQL text must pass this check.
static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("identifier pattern is valid"));

/// Validates a table or column identifier against the allow-list.
///
/// # Arguments
///
/// * `kind` - What the identifier names ("table name", "column name"),
///   used in the error message.
/// * `name` - The identifier to validate.
pub fn validate_identifier(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(ModeliteError::Config(format!("{} must not be empty", kind)));
    }
    if !IDENTIFIER_RE.is_match(name) {
        return Err(ModeliteError::Config(format!(
            "invalid {} '{}': identifiers are letters, digits and underscore, not starting with a digit",
            kind, name
        )));
    }
    Ok(())
}

/// Encodes a compound value to its JSON text form for TEXT storage.
///
/// Fails only if JSON encoding itself fails (e.g. a map with non-string
/// keys).
pub fn encode_to_text<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Decodes a compound value from its JSON text form.
///
/// Fails with a decode error if the text is malformed for the target
/// type.
pub fn decode_from_text<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}
