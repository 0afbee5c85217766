/// Schema Descriptor Module
///
/// This module derives a column schema from a [`Record`] type's declared
/// attributes: enumerate attributes in declaration order, drop the
/// excluded ones, map each to its storage class, and prepend the
/// synthetic autoincrement primary key. The derived schema drives table
/// creation and is compared against the live table on repeat
/// registration.
use crate::core::{ModeliteError, Result};
use crate::record::Record;
use crate::value::{validate_identifier, StorageType};

/// Reserved name of the synthetic primary-key column present on every
/// mapped table. Invisible to a type's own attributes; an attribute with
/// this name is a configuration error.
pub const PRIMARY_KEY: &str = "pk_id";

/// One column of a mapped table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDef {
    /// Column name (matches the attribute name except for the primary key)
    pub name: String,
    /// Storage class of the column
    pub storage: StorageType,
    /// Whether this is the synthetic primary key
    pub primary_key: bool,
}

/// Derived schema of one mapped table: the primary key followed by the
/// data columns in attribute declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub table: String,
    pub columns: Vec<ColumnDef>,
}

impl TableSchema {
    /// Data columns, i.e. everything except the synthetic primary key.
    pub fn data_columns(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| !c.primary_key)
    }

    /// Renders the CREATE TABLE statement for this schema. Identifiers
    /// were validated at derivation time, so plain interpolation is safe
    /// here.
    pub fn create_table_sql(&self) -> String {
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| {
                if c.primary_key {
                    format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", c.name)
                } else {
                    format!("{} {}", c.name, c.storage.sql_name())
                }
            })
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} ({})",
            self.table,
            columns.join(", ")
        )
    }
}

/// Derives the table schema for a record type.
///
/// # Arguments
///
/// * `table` - Table name; must pass identifier validation.
/// * `excluded` - Attribute names to leave out of the table.
///
/// # Errors
///
/// Fails with `ModeliteError::Config` if the table name is invalid, if an
/// attribute name fails identifier validation or collides with the
/// reserved primary-key name, or if the exclusion set leaves no data
/// columns (a table holding only its primary key is useless).
pub fn derive_schema<T: Record>(table: &str, excluded: &[&str]) -> Result<TableSchema> {
    validate_identifier("table name", table)?;

    let mut columns = vec![ColumnDef {
        name: PRIMARY_KEY.to_string(),
        storage: StorageType::Integer,
        primary_key: true,
    }];

    for attr in T::attributes() {
        if excluded.contains(&attr.name) {
            continue;
        }
        validate_identifier("column name", attr.name)?;
        if attr.name == PRIMARY_KEY {
            return Err(ModeliteError::Config(format!(
                "attribute name '{}' collides with the reserved primary key",
                PRIMARY_KEY
            )));
        }
        columns.push(ColumnDef {
            name: attr.name.to_string(),
            storage: attr.kind.storage_type(),
            primary_key: false,
        });
    }

    if columns.len() == 1 {
        return Err(ModeliteError::Config(format!(
            "table '{}' would have no data columns after exclusion",
            table
        )));
    }

    Ok(TableSchema {
        table: table.to_string(),
        columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{AttrKind, Attribute, Row};
    use crate::value::StorageValue;

    struct Person;

    impl Record for Person {
        fn table_name() -> &'static str {
            "Person"
        }

        fn attributes() -> &'static [Attribute] {
            const ATTRS: &[Attribute] = &[
                Attribute::new("name", AttrKind::Text),
                Attribute::new("age", AttrKind::Integer),
            ];
            ATTRS
        }

        fn to_values(&self) -> crate::core::Result<Vec<(&'static str, StorageValue)>> {
            Ok(vec![])
        }

        fn from_row(_row: &Row) -> crate::core::Result<Self> {
            Ok(Person)
        }
    }

    struct BadName;

    impl Record for BadName {
        fn table_name() -> &'static str {
            "BadName"
        }

        fn attributes() -> &'static [Attribute] {
            const ATTRS: &[Attribute] = &[Attribute::new("pk_id", AttrKind::Integer)];
            ATTRS
        }

        fn to_values(&self) -> crate::core::Result<Vec<(&'static str, StorageValue)>> {
            Ok(vec![])
        }

        fn from_row(_row: &Row) -> crate::core::Result<Self> {
            Ok(BadName)
        }
    }

    #[test]
    fn test_derive_schema_shape() {
        let schema = derive_schema::<Person>("Person", &[]).unwrap();
        assert_eq!(schema.table, "Person");
        assert_eq!(schema.columns.len(), 3);

        assert_eq!(schema.columns[0].name, PRIMARY_KEY);
        assert!(schema.columns[0].primary_key);
        assert_eq!(schema.columns[0].storage, StorageType::Integer);

        assert_eq!(schema.columns[1].name, "name");
        assert_eq!(schema.columns[1].storage, StorageType::Text);
        assert_eq!(schema.columns[2].name, "age");
        assert_eq!(schema.columns[2].storage, StorageType::Integer);
    }

    #[test]
    fn test_exclusion_drops_columns() {
        let schema = derive_schema::<Person>("Person", &["age"]).unwrap();
        let names: Vec<&str> = schema.columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec![PRIMARY_KEY, "name"]);
    }

    #[test]
    fn test_excluding_everything_fails() {
        let result = derive_schema::<Person>("Person", &["name", "age"]);
        match result.unwrap_err() {
            ModeliteError::Config(msg) => assert!(msg.contains("no data columns")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_table_name_fails() {
        assert!(derive_schema::<Person>("", &[]).is_err());
        assert!(derive_schema::<Person>("2people", &[]).is_err());
        assert!(derive_schema::<Person>("people; --", &[]).is_err());
    }

    #[test]
    fn test_primary_key_collision_fails() {
        let result = derive_schema::<BadName>("BadName", &[]);
        match result.unwrap_err() {
            ModeliteError::Config(msg) => assert!(msg.contains("reserved primary key")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_create_table_sql() {
        let schema = derive_schema::<Person>("Person", &[]).unwrap();
        assert_eq!(
            schema.create_table_sql(),
            "CREATE TABLE IF NOT EXISTS Person (pk_id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT, age INTEGER)"
        );
    }
}
