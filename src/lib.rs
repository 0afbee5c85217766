// Core infrastructure modules
pub mod core;

// Mapping-layer modules
pub mod config;
pub mod database;
pub mod predicate;
pub mod record;
pub mod schema;
pub mod value;

mod executor;

// Re-export the types most callers touch
pub use self::core::{ModeliteError, Result};
pub use database::{Database, MathOp, Session, DEFAULT_STORE_NAME};
pub use predicate::{CompareOp, OrderDirection, Predicate};
pub use record::{AttrKind, Attribute, Record, Row};
pub use schema::{derive_schema, ColumnDef, TableSchema, PRIMARY_KEY};
pub use value::{decode_from_text, encode_to_text, StorageType, StorageValue};
