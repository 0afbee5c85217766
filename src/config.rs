use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::Result;

/// Engine configuration parsed from a TOML file.
///
/// Every field is optional; absent fields fall back to the engine
/// defaults (default store name, platform data directory, WAL journal,
/// foreign keys on, debug logging off).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Store file name, e.g. "app.sqlite"
    pub name: Option<String>,
    /// Directory the store file lives in
    pub directory: Option<PathBuf>,
    /// Opt-in statement logging
    pub debug_sql: Option<bool>,
    /// SQLite journal mode; checked against the engine's allow-list
    pub journal_mode: Option<String>,
    /// Whether to enforce foreign keys at the connection level
    pub foreign_keys: Option<bool>,
}

/// Loads engine configuration from a TOML file at the given path.
///
/// # Arguments
///
/// * `path` - The file path to the TOML configuration file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = fs::read_to_string(path)?;
    toml::from_str(&content).map_err(|e| crate::core::ModeliteError::Config(e.to_string()))
}
