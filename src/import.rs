//! JSON catalog import
//!
//! A catalog file holds any of `goods`, `facilities` and `modifiers`:
//!
//! ```json
//! {
//!   "goods": [{"name": "Grain", "is_raw": true}],
//!   "facilities": [{"name": "Mill", "cycle_time_secs": 30,
//!                   "base_recipe": {"inputs": {"Grain": 2.0}, "outputs": {"Flour": 1.5}}}],
//!   "modifiers": [{"name": "Electricity", "target_tags": ["Production"],
//!                  "effects": [{"type": "productivity", "bonus": 0.5}]}]
//! }
//! ```
//!
//! A directory is walked recursively and every `*.json` file is imported
//! in path order.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use rusqlite::Connection;
use serde::Deserialize;
use tracing::{info, warn};
use walkdir::WalkDir;

use crate::catalog::Catalog;
use crate::db;
use crate::models::{Facility, Good, Modifier};

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CatalogFile {
    #[serde(default)]
    pub goods: Vec<Good>,
    #[serde(default)]
    pub facilities: Vec<Facility>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
}

/// Find all catalog files under `path`, or `path` itself if it is a file
pub fn find_catalog_files(path: &Path) -> Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        anyhow::bail!("{} is neither a file nor a directory", path.display());
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let file = entry.path();
        if file.is_file() && file.extension().is_some_and(|ext| ext == "json") {
            files.push(file.to_path_buf());
        }
    }
    Ok(files)
}

/// Parse a single catalog file
fn parse_catalog_file(filepath: &Path) -> Result<CatalogFile> {
    let content = fs::read_to_string(filepath)
        .with_context(|| format!("Failed to read {}", filepath.display()))?;
    let file: CatalogFile = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", filepath.display()))?;
    Ok(file)
}

/// Check a parsed file against the catalog rules before anything is written
fn validate(file: &CatalogFile) -> Result<()> {
    let mut scratch = Catalog::new();
    for facility in &file.facilities {
        scratch.register_facility(facility.clone())?;
    }
    Ok(())
}

/// Import catalog data from a file or directory into the database
pub fn import_to_database(conn: &Connection, path: &Path) -> Result<ImportStats> {
    let mut stats = ImportStats::default();

    let files = find_catalog_files(path)?;
    info!("Found {} catalog files under {}", files.len(), path.display());

    for filepath in &files {
        let file = match parse_catalog_file(filepath).and_then(|file| {
            validate(&file)?;
            Ok(file)
        }) {
            Ok(file) => file,
            Err(e) => {
                warn!("Skipping {}: {:#}", filepath.display(), e);
                stats.errors += 1;
                continue;
            }
        };

        for good in &file.goods {
            db::insert_good(conn, good)?;
        }
        for facility in &file.facilities {
            db::insert_facility(conn, facility)?;
        }
        for modifier in &file.modifiers {
            db::insert_modifier(conn, modifier)?;
        }

        stats.files += 1;
        stats.goods += file.goods.len();
        stats.facilities += file.facilities.len();
        stats.modifiers += file.modifiers.len();

        info!(
            "  Imported {} ({} goods, {} buildings, {} modifiers)",
            filepath.display(),
            file.goods.len(),
            file.facilities.len(),
            file.modifiers.len()
        );
    }

    Ok(stats)
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportStats {
    pub files: usize,
    pub goods: usize,
    pub facilities: usize,
    pub modifiers: usize,
    pub errors: usize,
}

impl std::fmt::Display for ImportStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Imported {} files ({} goods, {} buildings, {} modifiers). Errors: {}",
            self.files, self.goods, self.facilities, self.modifiers, self.errors
        )
    }
}
