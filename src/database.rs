/// Database Façade Module
///
/// This module ties schema derivation, value coercion, and predicate
/// rendering into safe statement execution. A [`Database`] is the public
/// blocking surface: every call is packaged as one unit of work for the
/// serial worker that owns the connection. The worker-side [`Session`]
/// does the actual statement construction and is also what callers see
/// inside `in_database` / `in_transaction` batches.
///
/// Engine instances are registered process-wide by store name: opening
/// the same name at the same path returns the same shared instance, and
/// the same name at a different path is refused, so one name can never
/// point two schema caches at one physical file.
use crate::core::{ModeliteError, Result};
use crate::executor::{Core, SerialExecutor, StoreLocation};
use crate::predicate::Predicate;
use crate::record::{Record, Row};
use crate::schema::{derive_schema, ColumnDef, TableSchema, PRIMARY_KEY};
use crate::value::{validate_identifier, StorageType, StorageValue};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};
use tracing::{debug, error};

/// Store name used when the caller does not choose one.
pub const DEFAULT_STORE_NAME: &str = "modelite.sqlite";

/// Journal modes accepted from configuration. The pragma value ends up
/// in SQL text, so it is checked against this list rather than trusted.
const JOURNAL_MODES: &[&str] = &["DELETE", "TRUNCATE", "PERSIST", "MEMORY", "WAL", "OFF"];

/// Aggregate operation applied over a column under a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MathOp {
    Sum,
    Avg,
    Max,
    Min,
}

impl MathOp {
    fn sql_name(self) -> &'static str {
        match self {
            MathOp::Sum => "SUM",
            MathOp::Avg => "AVG",
            MathOp::Max => "MAX",
            MathOp::Min => "MIN",
        }
    }
}

struct RegistryEntry {
    path: PathBuf,
    handle: Weak<Database>,
}

// One live engine per store name, process-wide
static REGISTRY: Lazy<Mutex<HashMap<String, RegistryEntry>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

fn default_store_dir() -> PathBuf {
    dirs::data_local_dir().unwrap_or_else(|| PathBuf::from("."))
}

fn pragma_batch(journal_mode: &str, foreign_keys: bool) -> Result<String> {
    let mode = journal_mode.to_uppercase();
    if !JOURNAL_MODES.contains(&mode.as_str()) {
        return Err(ModeliteError::Config(format!(
            "unknown journal mode '{}'",
            journal_mode
        )));
    }
    Ok(format!(
        "PRAGMA foreign_keys = {};\nPRAGMA journal_mode = {};\n",
        if foreign_keys { "ON" } else { "OFF" },
        mode
    ))
}

/// The object mapping engine: one store, one worker, one schema cache.
pub struct Database {
    name: String,
    path: Option<PathBuf>,
    debug_sql: Arc<AtomicBool>,
    executor: SerialExecutor,
}

impl Database {
    /// Returns the shared engine for the given store name, opening it on
    /// first use. `name` defaults to [`DEFAULT_STORE_NAME`], `dir` to the
    /// platform data directory. Re-requesting an open name returns the
    /// same instance; the same name against a different directory is a
    /// configuration error.
    pub fn shared(name: Option<&str>, dir: Option<&Path>) -> Result<Arc<Database>> {
        Database::shared_opts(name, dir, "WAL", true)
    }

    fn shared_opts(
        name: Option<&str>,
        dir: Option<&Path>,
        journal_mode: &str,
        foreign_keys: bool,
    ) -> Result<Arc<Database>> {
        let name = match name {
            Some(n) if !n.is_empty() => n.to_string(),
            _ => DEFAULT_STORE_NAME.to_string(),
        };
        let dir = dir.map(Path::to_path_buf).unwrap_or_else(default_store_dir);
        let path = dir.join(&name);

        let mut registry = REGISTRY
            .lock()
            .map_err(|_| ModeliteError::Execution("registry lock poisoned".to_string()))?;

        if let Some(entry) = registry.get(&name) {
            if let Some(existing) = entry.handle.upgrade() {
                if entry.path != path {
                    return Err(ModeliteError::Config(format!(
                        "store '{}' is already open at {}",
                        name,
                        entry.path.display()
                    )));
                }
                return Ok(existing);
            }
        }

        std::fs::create_dir_all(&dir)?;
        let db = Arc::new(Database::open_at(
            name.clone(),
            StoreLocation::File(path.clone()),
            Some(path.clone()),
            false,
            journal_mode,
            foreign_keys,
        )?);
        registry.insert(
            name,
            RegistryEntry {
                path,
                handle: Arc::downgrade(&db),
            },
        );
        Ok(db)
    }

    /// Shared engine with all defaults, matching the original
    /// parameterless constructor.
    pub fn shared_default() -> Result<Arc<Database>> {
        Database::shared(None, None)
    }

    /// Shared engine configured from a loaded [`Config`](crate::config::Config).
    /// Journal mode and foreign-key enforcement only take effect when
    /// this call is the one that opens the store.
    pub fn shared_with_config(config: &crate::config::Config) -> Result<Arc<Database>> {
        let db = Database::shared_opts(
            config.name.as_deref(),
            config.directory.as_deref(),
            config.journal_mode.as_deref().unwrap_or("WAL"),
            config.foreign_keys.unwrap_or(true),
        )?;
        if let Some(debug_sql) = config.debug_sql {
            db.set_debug_sql(debug_sql);
        }
        Ok(db)
    }

    /// Opens an ephemeral in-memory store, bypassing the registry: every
    /// in-memory connection is its own physical store, so the one-name
    /// one-store rule has nothing to protect.
    pub fn in_memory() -> Result<Database> {
        Database::open_at(
            ":memory:".to_string(),
            StoreLocation::Memory,
            None,
            false,
            "MEMORY",
            true,
        )
    }

    fn open_at(
        name: String,
        location: StoreLocation,
        path: Option<PathBuf>,
        debug_sql: bool,
        journal_mode: &str,
        foreign_keys: bool,
    ) -> Result<Database> {
        let flag = Arc::new(AtomicBool::new(debug_sql));
        let executor =
            SerialExecutor::spawn(location, pragma_batch(journal_mode, foreign_keys)?, flag.clone())?;
        Ok(Database {
            name,
            path,
            debug_sql: flag,
            executor,
        })
    }

    /// Store name this engine was registered under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved path of the store file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Opts statement logging in or out. When enabled, every statement
    /// and its bound parameters are logged at debug level, and failures
    /// at error level, through `tracing`.
    pub fn set_debug_sql(&self, enabled: bool) {
        self.debug_sql.store(enabled, Ordering::Relaxed);
    }

    /// Removes a closed store's file along with its WAL sidecars. The
    /// caller is responsible for dropping every handle first; removing a
    /// live store's file is undefined behavior on the store's side.
    pub fn remove_store_file(path: &Path) -> Result<()> {
        std::fs::remove_file(path)?;
        for suffix in ["-wal", "-shm"] {
            let mut sidecar = path.as_os_str().to_os_string();
            sidecar.push(suffix);
            let _ = std::fs::remove_file(PathBuf::from(sidecar));
        }
        Ok(())
    }

    /// Creates the table for a record type, excluding the named
    /// attributes. A second call with an identical derived schema is a
    /// no-op; an existing table with a conflicting schema is an error.
    /// Use `T::table_name()` as `table` for the type's default name.
    pub fn create_table<T: Record>(&self, excluded: &[&str], table: &str) -> Result<()> {
        let schema = derive_schema::<T>(table, excluded)?;
        self.executor
            .dispatch(move |core| Session::new(core).create_table_from(schema))
    }

    /// Whether a table of this name exists in the store.
    pub fn exist_table(&self, table: &str) -> Result<bool> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).exist_table(&table))
    }

    /// Adds one column to an existing table. Fails if the column is
    /// already present.
    pub fn alter_table(&self, table: &str, column: &str, storage: StorageType) -> Result<()> {
        let table = table.to_string();
        let column = column.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).alter_table(&table, &column, storage))
    }

    /// Drops a table and forgets its cached schema.
    pub fn drop_table(&self, table: &str) -> Result<()> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).drop_table(&table))
    }

    /// Column names of a table, primary key included, in definition
    /// order.
    pub fn list_columns(&self, table: &str) -> Result<Vec<String>> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).list_columns(&table))
    }

    /// Inserts one object. The primary key is assigned by the store.
    pub fn insert<T: Record>(&self, record: &T, table: &str) -> Result<()> {
        let values = record.to_values()?;
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).insert_values(values, &table))
    }

    /// Inserts a batch of objects inside one transaction. Any failure
    /// rolls the whole batch back: the table ends up with either all of
    /// the rows or none of them.
    pub fn insert_many<T: Record>(&self, records: &[T], table: &str) -> Result<()> {
        let mut batches = Vec::with_capacity(records.len());
        for record in records {
            batches.push(record.to_values()?);
        }
        let table = table.to_string();
        self.executor.dispatch(move |core| {
            in_transaction_scope(core, move |session, _rollback| {
                for values in batches {
                    session.insert_values(values, &table)?;
                }
                Ok(())
            })
        })
    }

    /// Fetches all objects matching the predicate. An empty predicate
    /// matches every row.
    pub fn query<T: Record>(&self, table: &str, predicate: Predicate) -> Result<Vec<T>> {
        let table = table.to_string();
        let rows = self
            .executor
            .dispatch(move |core| Session::new(core).select_rows(&table, &predicate))?;
        rows.iter().map(T::from_row).collect()
    }

    /// Fetches the newest `limit` rows (descending on `order_by`, or the
    /// primary key when `None`), returned in ascending order. The
    /// predicate's own ordering and limit are ignored by this variant.
    pub fn query_inverted<T: Record>(
        &self,
        table: &str,
        order_by: Option<&str>,
        limit: u32,
        predicate: Predicate,
    ) -> Result<Vec<T>> {
        let mut items = self.fetch_latest::<T>(table, order_by, limit, predicate)?;
        items.reverse();
        Ok(items)
    }

    /// Fetches the newest `count` rows, returned in ascending order.
    /// Convenience spelling of [`Database::query_inverted`].
    pub fn recent<T: Record>(
        &self,
        table: &str,
        count: u32,
        order_by: Option<&str>,
        predicate: Predicate,
    ) -> Result<Vec<T>> {
        self.query_inverted(table, order_by, count, predicate)
    }

    /// Fetches the newest `count` rows, returned newest-first. Identical
    /// to [`Database::recent`] except for the post-fetch reversal.
    pub fn recent_desc<T: Record>(
        &self,
        table: &str,
        count: u32,
        order_by: Option<&str>,
        predicate: Predicate,
    ) -> Result<Vec<T>> {
        self.fetch_latest(table, order_by, count, predicate)
    }

    fn fetch_latest<T: Record>(
        &self,
        table: &str,
        order_by: Option<&str>,
        limit: u32,
        predicate: Predicate,
    ) -> Result<Vec<T>> {
        let table = table.to_string();
        let order_by = order_by.map(str::to_string);
        let rows = self.executor.dispatch(move |core| {
            Session::new(core).select_latest_rows(&table, order_by.as_deref(), limit, &predicate)
        })?;
        rows.iter().map(T::from_row).collect()
    }

    /// Applies a partial update: only the supplied columns change, under
    /// the predicate's WHERE clause. Returns the affected row count.
    pub fn update(
        &self,
        table: &str,
        values: Vec<(String, StorageValue)>,
        predicate: Predicate,
    ) -> Result<usize> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).update(&table, values, &predicate))
    }

    /// Deletes rows matching the predicate, returning the count. An
    /// empty predicate deletes every row, same as [`Database::delete_all`]:
    /// scoping a delete takes an explicit non-empty predicate.
    pub fn delete_from(&self, table: &str, predicate: Predicate) -> Result<usize> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).delete_from(&table, &predicate))
    }

    /// Deletes every row of the table.
    pub fn delete_all(&self, table: &str) -> Result<usize> {
        self.delete_from(table, Predicate::new())
    }

    /// Counts rows matching the predicate.
    pub fn count(&self, table: &str, predicate: Predicate) -> Result<i64> {
        let table = table.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).count(&table, &predicate))
    }

    /// Applies one SQL aggregate over a column under the predicate.
    /// Returns 0.0 when no rows match.
    pub fn aggregate(
        &self,
        op: MathOp,
        table: &str,
        column: &str,
        predicate: Predicate,
    ) -> Result<f64> {
        let table = table.to_string();
        let column = column.to_string();
        self.executor
            .dispatch(move |core| Session::new(core).aggregate(op, &table, &column, &predicate))
    }

    /// Runs a batch of operations as one unit of work on the serial
    /// worker: nothing from another caller interleaves mid-batch. The
    /// batch is not transactional; see [`Database::in_transaction`].
    pub fn in_database<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session) -> Result<T> + Send + 'static,
    {
        self.executor.dispatch(move |core| f(&mut Session::new(core)))
    }

    /// Runs a batch inside one transaction. The closure receives a
    /// rollback flag; setting it to `true` rolls the whole batch back
    /// after the closure returns, as does returning an error. Otherwise
    /// the batch commits as one unit.
    pub fn in_transaction<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Session, &mut bool) -> Result<T> + Send + 'static,
    {
        self.executor
            .dispatch(move |core| in_transaction_scope(core, f))
    }
}

fn in_transaction_scope<T, F>(core: &mut Core, f: F) -> Result<T>
where
    F: FnOnce(&mut Session, &mut bool) -> Result<T>,
{
    core.conn.execute_batch("BEGIN")?;
    let mut rollback = false;
    let result = {
        let mut session = Session::new(core);
        f(&mut session, &mut rollback)
    };
    let finish = if result.is_ok() && !rollback {
        "COMMIT"
    } else {
        "ROLLBACK"
    };
    match (result, core.conn.execute_batch(finish)) {
        (Ok(value), Ok(())) => Ok(value),
        // The caller's error outranks a failed rollback
        (Err(e), _) => Err(e),
        (Ok(_), Err(e)) => Err(e.into()),
    }
}

/// Worker-side view of the store: the statement construction behind
/// every public operation, and the interface handed to `in_database` /
/// `in_transaction` closures.
pub struct Session<'a> {
    core: &'a mut Core,
}

impl<'a> Session<'a> {
    pub(crate) fn new(core: &'a mut Core) -> Self {
        Session { core }
    }

    fn log_sql(&self, sql: &str, params: &[StorageValue]) {
        if self.core.debug_sql.load(Ordering::Relaxed) {
            let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
            debug!("sql: {} params: [{}]", sql, rendered.join(", "));
        }
    }

    fn run_sql(&mut self, sql: &str, params: &[StorageValue]) -> Result<usize> {
        self.log_sql(sql, params);
        match self
            .core
            .conn
            .execute(sql, rusqlite::params_from_iter(params.iter()))
        {
            Ok(count) => Ok(count),
            Err(e) => {
                if self.core.debug_sql.load(Ordering::Relaxed) {
                    let rendered: Vec<String> = params.iter().map(ToString::to_string).collect();
                    error!("sql failed: {} params: [{}] error: {}", sql, rendered.join(", "), e);
                }
                Err(e.into())
            }
        }
    }

    fn query_rows(&mut self, sql: &str, params: &[StorageValue]) -> Result<Vec<Row>> {
        self.log_sql(sql, params);
        let mut stmt = self.core.conn.prepare(sql)?;
        let column_names: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let rows = stmt
            .query_map(rusqlite::params_from_iter(params.iter()), |row| {
                let mut values = HashMap::new();
                for (i, name) in column_names.iter().enumerate() {
                    if let Some(value) = StorageValue::from_sql_ref(row.get_ref(i)?) {
                        values.insert(name.clone(), value);
                    }
                }
                Ok(Row::from_values(values))
            })?
            .collect::<rusqlite::Result<Vec<Row>>>()?;
        Ok(rows)
    }

    /// Schema of an existing table, from the cache or PRAGMA table_info.
    fn load_schema(&mut self, table: &str) -> Result<TableSchema> {
        if let Some(schema) = self.core.schema_cache.get(table) {
            return Ok(schema.clone());
        }
        let columns = {
            let mut stmt = self
                .core
                .conn
                .prepare(&format!("PRAGMA table_info('{}')", table))?;
            let columns = stmt
                .query_map([], |row| {
                    Ok(ColumnDef {
                        name: row.get(1)?,
                        storage: StorageType::from_declared(&row.get::<_, String>(2)?),
                        primary_key: row.get(5)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<ColumnDef>>>()?;
            columns
        };
        if columns.is_empty() {
            return Err(ModeliteError::Config(format!(
                "table '{}' does not exist",
                table
            )));
        }
        let schema = TableSchema {
            table: table.to_string(),
            columns,
        };
        self.core
            .schema_cache
            .insert(table.to_string(), schema.clone());
        Ok(schema)
    }

    /// Creates the table for a record type. See
    /// [`Database::create_table`].
    pub fn create_table<T: Record>(&mut self, excluded: &[&str], table: &str) -> Result<()> {
        let schema = derive_schema::<T>(table, excluded)?;
        self.create_table_from(schema)
    }

    pub(crate) fn create_table_from(&mut self, schema: TableSchema) -> Result<()> {
        if self.exist_table(&schema.table)? {
            let existing = self.load_schema(&schema.table)?;
            if existing.columns != schema.columns {
                return Err(ModeliteError::Config(format!(
                    "table '{}' already exists with a different schema",
                    schema.table
                )));
            }
            return Ok(());
        }
        let sql = schema.create_table_sql();
        self.run_sql(&sql, &[])?;
        self.core
            .schema_cache
            .insert(schema.table.clone(), schema);
        Ok(())
    }

    /// Whether a table of this name exists.
    pub fn exist_table(&mut self, table: &str) -> Result<bool> {
        validate_identifier("table name", table)?;
        let count: i64 = self.core.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [table],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Adds one column to an existing table.
    pub fn alter_table(&mut self, table: &str, column: &str, storage: StorageType) -> Result<()> {
        validate_identifier("table name", table)?;
        validate_identifier("column name", column)?;
        if column == PRIMARY_KEY {
            return Err(ModeliteError::Config(format!(
                "column name '{}' is reserved",
                PRIMARY_KEY
            )));
        }
        let columns = self.list_columns(table)?;
        if columns.iter().any(|c| c == column) {
            return Err(ModeliteError::Config(format!(
                "column '{}' already exists on table '{}'",
                column, table
            )));
        }
        let sql = format!("ALTER TABLE {} ADD COLUMN {} {}", table, column, storage.sql_name());
        self.run_sql(&sql, &[])?;
        self.core.schema_cache.remove(table);
        Ok(())
    }

    /// Drops a table. Fails with a store error if the table is missing.
    pub fn drop_table(&mut self, table: &str) -> Result<()> {
        validate_identifier("table name", table)?;
        let sql = format!("DROP TABLE {}", table);
        self.run_sql(&sql, &[])?;
        self.core.schema_cache.remove(table);
        Ok(())
    }

    /// Column names of a table, in definition order.
    pub fn list_columns(&mut self, table: &str) -> Result<Vec<String>> {
        validate_identifier("table name", table)?;
        let schema = self.load_schema(table)?;
        Ok(schema.columns.into_iter().map(|c| c.name).collect())
    }

    /// Inserts one object. See [`Database::insert`].
    pub fn insert<T: Record>(&mut self, record: &T, table: &str) -> Result<()> {
        let values = record.to_values()?;
        self.insert_values(values, table)
    }

    pub(crate) fn insert_values(
        &mut self,
        values: Vec<(&'static str, StorageValue)>,
        table: &str,
    ) -> Result<()> {
        validate_identifier("table name", table)?;
        let schema = self.load_schema(table)?;
        let table_columns: Vec<&str> = schema.data_columns().map(|c| c.name.as_str()).collect();

        // Attributes without a matching column are skipped, so a type
        // can carry attributes an older table never had
        let mut names = Vec::new();
        let mut params = Vec::new();
        for (name, value) in values {
            if table_columns.contains(&name) {
                names.push(name);
                params.push(value);
            }
        }
        if names.is_empty() {
            return Err(ModeliteError::Config(format!(
                "no attributes map to columns of table '{}'",
                table
            )));
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            table,
            names.join(", "),
            placeholders
        );
        self.run_sql(&sql, &params)?;
        Ok(())
    }

    /// Inserts a batch inside one transaction. See
    /// [`Database::insert_many`]. Must not be called from within
    /// `in_transaction` (transactions do not nest).
    pub fn insert_many<T: Record>(&mut self, records: &[T], table: &str) -> Result<()> {
        let mut batches = Vec::with_capacity(records.len());
        for record in records {
            batches.push(record.to_values()?);
        }
        in_transaction_scope(self.core, move |session, _rollback| {
            for values in batches {
                session.insert_values(values, table)?;
            }
            Ok(())
        })
    }

    pub(crate) fn select_rows(&mut self, table: &str, predicate: &Predicate) -> Result<Vec<Row>> {
        validate_identifier("table name", table)?;
        let rendered = predicate.render()?;
        let sql = if rendered.sql.is_empty() {
            format!("SELECT * FROM {}", table)
        } else {
            format!("SELECT * FROM {} {}", table, rendered.sql)
        };
        self.query_rows(&sql, &rendered.params)
    }

    pub(crate) fn select_latest_rows(
        &mut self,
        table: &str,
        order_by: Option<&str>,
        limit: u32,
        predicate: &Predicate,
    ) -> Result<Vec<Row>> {
        validate_identifier("table name", table)?;
        let order_column = order_by.unwrap_or(PRIMARY_KEY);
        validate_identifier("column name", order_column)?;

        let rendered = predicate.render_where()?;
        let mut sql = format!("SELECT * FROM {}", table);
        if !rendered.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&rendered.sql);
        }
        sql.push_str(&format!(" ORDER BY {} DESC", order_column));
        if limit > 0 {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        self.query_rows(&sql, &rendered.params)
    }

    /// Fetches all objects matching the predicate.
    pub fn query<T: Record>(&mut self, table: &str, predicate: &Predicate) -> Result<Vec<T>> {
        let rows = self.select_rows(table, predicate)?;
        rows.iter().map(T::from_row).collect()
    }

    /// Applies a partial update. See [`Database::update`].
    pub fn update(
        &mut self,
        table: &str,
        values: Vec<(String, StorageValue)>,
        predicate: &Predicate,
    ) -> Result<usize> {
        validate_identifier("table name", table)?;
        if values.is_empty() {
            return Err(ModeliteError::Config(
                "update requires at least one column".to_string(),
            ));
        }

        let mut sets = Vec::with_capacity(values.len());
        let mut params = Vec::with_capacity(values.len());
        for (column, value) in values {
            validate_identifier("column name", &column)?;
            if column == PRIMARY_KEY {
                return Err(ModeliteError::Config(format!(
                    "column '{}' is assigned by the store and cannot be updated",
                    PRIMARY_KEY
                )));
            }
            sets.push(format!("{} = ?", column));
            params.push(value);
        }

        let rendered = predicate.render_where()?;
        params.extend(rendered.params);

        let mut sql = format!("UPDATE {} SET {}", table, sets.join(", "));
        if !rendered.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&rendered.sql);
        }
        self.run_sql(&sql, &params)
    }

    /// Deletes rows matching the predicate. An empty predicate deletes
    /// every row.
    pub fn delete_from(&mut self, table: &str, predicate: &Predicate) -> Result<usize> {
        validate_identifier("table name", table)?;
        let rendered = predicate.render_where()?;
        let mut sql = format!("DELETE FROM {}", table);
        if !rendered.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&rendered.sql);
        }
        self.run_sql(&sql, &rendered.params)
    }

    /// Deletes every row of the table.
    pub fn delete_all(&mut self, table: &str) -> Result<usize> {
        self.delete_from(table, &Predicate::new())
    }

    /// Counts rows matching the predicate.
    pub fn count(&mut self, table: &str, predicate: &Predicate) -> Result<i64> {
        validate_identifier("table name", table)?;
        let rendered = predicate.render_where()?;
        let mut sql = format!("SELECT COUNT(*) FROM {}", table);
        if !rendered.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&rendered.sql);
        }
        self.log_sql(&sql, &rendered.params);
        let count: i64 = self.core.conn.query_row(
            &sql,
            rusqlite::params_from_iter(rendered.params.iter()),
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Applies one SQL aggregate over a column under the predicate.
    pub fn aggregate(
        &mut self,
        op: MathOp,
        table: &str,
        column: &str,
        predicate: &Predicate,
    ) -> Result<f64> {
        validate_identifier("table name", table)?;
        validate_identifier("column name", column)?;
        let rendered = predicate.render_where()?;
        let mut sql = format!("SELECT {}({}) FROM {}", op.sql_name(), column, table);
        if !rendered.sql.is_empty() {
            sql.push(' ');
            sql.push_str(&rendered.sql);
        }
        self.log_sql(&sql, &rendered.params);
        let value: Option<f64> = self.core.conn.query_row(
            &sql,
            rusqlite::params_from_iter(rendered.params.iter()),
            |row| row.get(0),
        )?;
        Ok(value.unwrap_or(0.0))
    }
}
