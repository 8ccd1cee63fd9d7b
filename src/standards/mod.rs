//! Defect size standards keyed by material parameters.
//!
//! A [`StandardsTable`] maps (metal, thickness bracket, grade, defect kind) to
//! the maximum permissible defect size. Tables are loaded from TOML, validated
//! once, and shared read-only.

mod loader;
mod table;
mod types;

pub use loader::{default_standards, load_standards, STANDARDS_FILE_NAME};
pub use table::StandardsTable;
pub use types::*;
