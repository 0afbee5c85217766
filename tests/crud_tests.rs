//! Integration tests driving the full engine against real stores:
//! temporary file stores for persistence and registry behavior,
//! in-memory stores for the CRUD surface.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;

use modelite::{
    AttrKind, Attribute, CompareOp, Database, MathOp, ModeliteError, Predicate, Record, Result,
    Row, StorageValue, PRIMARY_KEY,
};
use tempfile::TempDir;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
struct Person {
    name: String,
    age: i64,
}

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

    fn to_values(&self) -> Result<Vec<(&'static str, StorageValue)>> {
        Ok(vec![
            ("name", StorageValue::from(self.name.as_str())),
            ("age", StorageValue::from(self.age)),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Person {
            name: row.text("name"),
            age: row.integer("age"),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Note {
    title: String,
    starred: bool,
    tags: Vec<String>,
    extras: HashMap<String, i64>,
}

impl Record for Note {
    fn table_name() -> &'static str {
        "Note"
    }

    fn attributes() -> &'static [Attribute] {
        const ATTRS: &[Attribute] = &[
            Attribute::new("title", AttrKind::Text),
            Attribute::new("starred", AttrKind::Bool),
            Attribute::new("tags", AttrKind::Json),
            Attribute::new("extras", AttrKind::Json),
        ];
        ATTRS
    }

    fn to_values(&self) -> Result<Vec<(&'static str, StorageValue)>> {
        Ok(vec![
            ("title", StorageValue::from(self.title.as_str())),
            ("starred", StorageValue::from(self.starred)),
            ("tags", StorageValue::Text(modelite::encode_to_text(&self.tags)?)),
            (
                "extras",
                StorageValue::Text(modelite::encode_to_text(&self.extras)?),
            ),
        ])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Note {
            title: row.text("title"),
            starred: row.boolean("starred"),
            tags: row.json("tags")?.unwrap_or_default(),
            extras: row.json("extras")?.unwrap_or_default(),
        })
    }
}

/// Record whose coercion can be made to fail on demand, for exercising
/// the all-or-nothing batch path.
#[derive(Debug, Clone)]
struct Fallible {
    name: String,
    poisoned: bool,
}

impl Record for Fallible {
    fn table_name() -> &'static str {
        "Fallible"
    }

    fn attributes() -> &'static [Attribute] {
        const ATTRS: &[Attribute] = &[Attribute::new("name", AttrKind::Text)];
        ATTRS
    }

    fn to_values(&self) -> Result<Vec<(&'static str, StorageValue)>> {
        if self.poisoned {
            return Err(ModeliteError::Coercion(
                "deliberately unencodable value".to_string(),
            ));
        }
        Ok(vec![("name", StorageValue::from(self.name.as_str()))])
    }

    fn from_row(row: &Row) -> Result<Self> {
        Ok(Fallible {
            name: row.text("name"),
            poisoned: false,
        })
    }
}

fn unique_name() -> String {
    format!("test_{}.sqlite", Uuid::new_v4().simple())
}

fn person(name: &str, age: i64) -> Person {
    Person {
        name: name.to_string(),
        age,
    }
}

#[test]
fn test_spec_scenario_end_to_end() {
    let db = Database::in_memory().unwrap();

    // Registering {name: string, age: integer} yields [pk, name, age]
    db.create_table::<Person>(&[], "Person").unwrap();
    assert_eq!(
        db.list_columns("Person").unwrap(),
        vec![PRIMARY_KEY, "name", "age"]
    );

    // Insert then query with age > 18 returns exactly the inserted object
    let ann = person("Ann", 30);
    db.insert(&ann, "Person").unwrap();
    let found: Vec<Person> = db
        .query(
            "Person",
            Predicate::new().and_where("age", 18i64, CompareOp::Gt),
        )
        .unwrap();
    assert_eq!(found, vec![ann]);

    // Partial update changes only the named column
    db.update(
        "Person",
        vec![("age".to_string(), StorageValue::from(31i64))],
        Predicate::new().and_where("name", "Ann", CompareOp::Eq),
    )
    .unwrap();
    let found: Vec<Person> = db.query("Person", Predicate::new()).unwrap();
    assert_eq!(found, vec![person("Ann", 31)]);

    // Delete by name, then count over an empty predicate reaches zero
    db.delete_from(
        "Person",
        Predicate::new().and_where("name", "Ann", CompareOp::Eq),
    )
    .unwrap();
    assert_eq!(db.count("Person", Predicate::new()).unwrap(), 0);
}

#[test]
fn test_shared_returns_same_instance() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();

    let first = Database::shared(Some(&name), Some(dir.path())).unwrap();
    let second = Database::shared(Some(&name), Some(dir.path())).unwrap();
    assert!(Arc::ptr_eq(&first, &second));
}

#[test]
fn test_shared_same_name_different_path_is_refused() {
    let dir_a = TempDir::new().unwrap();
    let dir_b = TempDir::new().unwrap();
    let name = unique_name();

    let _first = Database::shared(Some(&name), Some(dir_a.path())).unwrap();
    let result = Database::shared(Some(&name), Some(dir_b.path()));
    match result {
        Err(ModeliteError::Config(msg)) => assert!(msg.contains("already open")),
        other => panic!("Expected Config error, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_data_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();

    {
        let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
        db.create_table::<Person>(&[], "Person").unwrap();
        db.insert(&person("Ann", 30), "Person").unwrap();
    }

    // All handles are gone; reopening the name reads the same file
    let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
    let found: Vec<Person> = db.query("Person", Predicate::new()).unwrap();
    assert_eq!(found, vec![person("Ann", 30)]);
}

#[test]
fn test_store_path_is_exposed() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();

    let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
    let path = db.path().unwrap().to_path_buf();
    assert_eq!(path, dir.path().join(&name));
    assert!(path.exists());

    assert!(Database::in_memory().unwrap().path().is_none());
}

#[test]
fn test_remove_store_file() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();

    let path = {
        let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
        db.create_table::<Person>(&[], "Person").unwrap();
        db.path().unwrap().to_path_buf()
    };

    Database::remove_store_file(&path).unwrap();
    assert!(!path.exists());
}

#[test]
fn test_insert_many_all_or_nothing() {
    let db = Database::in_memory().unwrap();
    db.create_table::<Fallible>(&[], "Fallible").unwrap();

    let mut batch: Vec<Fallible> = (0..5)
        .map(|i| Fallible {
            name: format!("row{}", i),
            poisoned: false,
        })
        .collect();
    batch[3].poisoned = true;

    assert!(db.insert_many(&batch, "Fallible").is_err());
    assert_eq!(db.count("Fallible", Predicate::new()).unwrap(), 0);

    // The same batch without the poisoned row lands in full
    batch[3].poisoned = false;
    db.insert_many(&batch, "Fallible").unwrap();
    assert_eq!(db.count("Fallible", Predicate::new()).unwrap(), 5);
}

#[test]
fn test_transaction_rollback_persists_nothing() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();
    let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();

    db.in_transaction(|session, rollback| {
        session.insert(&person("Ann", 30), "Person")?;
        session.insert(&person("Bob", 25), "Person")?;
        *rollback = true;
        Ok(())
    })
    .unwrap();

    assert_eq!(db.count("Person", Predicate::new()).unwrap(), 0);
}

#[test]
fn test_compound_values_round_trip() {
    let db = Database::in_memory().unwrap();
    db.create_table::<Note>(&[], "Note").unwrap();

    let mut extras = HashMap::new();
    extras.insert("views".to_string(), 12i64);
    let note = Note {
        title: "groceries".to_string(),
        starred: true,
        tags: vec!["home".to_string(), "errands".to_string()],
        extras,
    };
    db.insert(&note, "Note").unwrap();

    let found: Vec<Note> = db.query("Note", Predicate::new()).unwrap();
    assert_eq!(found, vec![note]);
}

#[test]
fn test_like_and_contains_queries() {
    let db = Database::in_memory().unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();
    for (name, age) in [("Ann", 30), ("Anna", 25), ("Bob", 40)] {
        db.insert(&person(name, age), "Person").unwrap();
    }

    let contains: Vec<Person> = db
        .query(
            "Person",
            Predicate::new().and_where("name", "nn", CompareOp::Contains),
        )
        .unwrap();
    assert_eq!(contains.len(), 2);

    let like: Vec<Person> = db
        .query(
            "Person",
            Predicate::new().and_where("name", "Ann_", CompareOp::Like),
        )
        .unwrap();
    assert_eq!(like.len(), 1);
    assert_eq!(like[0].name, "Anna");
}

#[test]
fn test_aggregate_over_predicate() {
    let db = Database::in_memory().unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();
    for (name, age) in [("Ann", 30), ("Bob", 20), ("Cid", 40)] {
        db.insert(&person(name, age), "Person").unwrap();
    }

    let adults = Predicate::new().and_where("age", 25i64, CompareOp::Ge);
    let avg = db.aggregate(MathOp::Avg, "Person", "age", adults).unwrap();
    assert_eq!(avg, 35.0);
}

#[test]
fn test_schema_evolution_tolerates_added_column() {
    let db = Database::in_memory().unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();
    db.insert(&person("Ann", 30), "Person").unwrap();

    // A column the object type does not know about is ignored on read
    db.alter_table("Person", "nickname", modelite::StorageType::Text)
        .unwrap();
    let found: Vec<Person> = db.query("Person", Predicate::new()).unwrap();
    assert_eq!(found, vec![person("Ann", 30)]);
}

#[test]
fn test_concurrent_callers_serialize_on_one_store() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();
    let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();

    let mut handles = Vec::new();
    for t in 0..8 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for i in 0..10 {
                db.insert(&person(&format!("p{}_{}", t, i), i), "Person")
                    .unwrap();
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.count("Person", Predicate::new()).unwrap(), 80);
}

#[test]
fn test_batch_runs_without_interleaving() {
    let dir = TempDir::new().unwrap();
    let name = unique_name();
    let db = Database::shared(Some(&name), Some(dir.path())).unwrap();
    db.create_table::<Person>(&[], "Person").unwrap();

    // One writer keeps checking that its two-step batch is never split
    // by the other writer's inserts
    let mut handles = Vec::new();
    for _ in 0..4 {
        let db = Arc::clone(&db);
        handles.push(thread::spawn(move || {
            for _ in 0..10 {
                let observed: (i64, i64) = db
                    .in_database(|session| {
                        let before = session.count("Person", &Predicate::new())?;
                        session.insert(&person("x", 1), "Person")?;
                        let after = session.count("Person", &Predicate::new())?;
                        Ok((before, after))
                    })
                    .unwrap();
                assert_eq!(observed.1, observed.0 + 1);
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(db.count("Person", Predicate::new()).unwrap(), 40);
}

#[test]
fn test_in_memory_stores_are_independent() {
    let a = Database::in_memory().unwrap();
    let b = Database::in_memory().unwrap();

    a.create_table::<Person>(&[], "Person").unwrap();
    a.insert(&person("Ann", 30), "Person").unwrap();

    assert!(!b.exist_table("Person").unwrap());
}
