// Database bootstrap and on-disk layout

use crate::config::DatabaseConfig;
use eyre::{Context, Result};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

const CURRENT_VERSION: u32 = 1;

/// Handle to a database directory: `{root_path}/{name}/collections/...`
///
/// Cloning is cheap; all clones share the same immutable config.
#[derive(Debug, Clone)]
pub struct Database {
    config: Arc<DatabaseConfig>,
}

impl Database {
    /// Open or create a database
    ///
    /// Validates the config, creates the `collections` directory and writes a
    /// `.version` marker the first time.
    pub fn open(config: DatabaseConfig) -> Result<Self> {
        config.validate()?;

        let db = Self {
            config: Arc::new(config),
        };

        let collections_path = db.collections_path();
        if !collections_path.exists() {
            info!(path = ?collections_path, "Creating database directory");
        }
        fs::create_dir_all(&collections_path).context("Failed to create database directory")?;

        db.write_version()?;

        Ok(db)
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// `{root_path}/{name}`
    pub fn path(&self) -> PathBuf {
        self.config.root_path.join(&self.config.name)
    }

    /// `{root_path}/{name}/collections`
    pub fn collections_path(&self) -> PathBuf {
        self.path().join("collections")
    }

    /// Ids of every collection present on disk, sorted
    pub fn list_collections(&self) -> Result<Vec<String>> {
        let collections_path = self.collections_path();
        if !collections_path.exists() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        for entry in fs::read_dir(&collections_path).context("Failed to list collections")? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(id) => ids.push(id),
                Err(name) => warn!(?name, "Skipping collection with non UTF-8 name"),
            }
        }

        ids.sort();
        debug!(count = ids.len(), "Listed collections");
        Ok(ids)
    }

    fn write_version(&self) -> Result<()> {
        let version_path = self.path().join(".version");
        if !version_path.exists() {
            fs::write(&version_path, CURRENT_VERSION.to_string()).context("Failed to write version file")?;
        }
        Ok(())
    }
}
