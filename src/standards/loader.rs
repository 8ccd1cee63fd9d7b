//! TOML loading for the standards table.
//!
//! Provides two loading methods:
//! - `default_standards()` - Loads the table compiled into the binary
//! - `load_standards(path)` - Loads a custom table from a file path

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use super::table::StandardsTable;
use crate::config::default_config_dir;

/// File name looked up in the metalgrade config directory.
pub const STANDARDS_FILE_NAME: &str = "standards.toml";

/// Default limits embedded in the binary at compile time.
/// These are loaded from `config/standards.toml`.
const DEFAULT_STANDARDS: &str = include_str!("../../config/standards.toml");

/// Load a standards table from a TOML file at the given path.
///
/// # Returns
/// * `Ok(StandardsTable)` - Parsed and validated table
/// * `Err` - If the file cannot be read, the TOML is invalid, or validation fails
///
/// # Example
/// ```ignore
/// let table = load_standards(Path::new("/path/to/plant_standards.toml"))?;
/// ```
pub fn load_standards(path: &Path) -> Result<StandardsTable> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read standards table {:?}", path))?;
    let table = StandardsTable::from_toml_str(&content)
        .with_context(|| format!("Failed to load standards table {:?}", path))?;
    info!(
        "Loaded standards table '{}' from {:?} ({} entries)",
        table.standard(),
        path,
        table.len()
    );
    Ok(table)
}

/// Get the standards table embedded in the binary.
///
/// Covers the four supported metals across four thickness brackets.
///
/// # Panics
/// Panics if the embedded TOML is invalid (this would be a compile-time bug).
pub fn default_standards() -> StandardsTable {
    StandardsTable::from_toml_str(DEFAULT_STANDARDS)
        .expect("embedded standards.toml must be a valid standards table")
}

impl StandardsTable {
    /// Load `<config dir>/metalgrade/standards.toml` if present, otherwise
    /// the embedded table.
    pub fn load_or_default() -> Result<Self> {
        match default_config_dir() {
            Some(dir) => Self::load_or_default_in(&dir),
            None => {
                debug!("No platform config directory, using embedded standards table");
                Ok(default_standards())
            }
        }
    }

    /// Load `standards.toml` from `dir` if present, otherwise the embedded table.
    pub fn load_or_default_in(dir: &Path) -> Result<Self> {
        let path = dir.join(STANDARDS_FILE_NAME);
        if path.exists() {
            load_standards(&path)
        } else {
            debug!("No standards file at {:?}, using embedded table", path);
            Ok(default_standards())
        }
    }
}
