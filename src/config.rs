// Database configuration and name validation

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Maximum length for database names and collection ids
const MAX_NAME_LEN: usize = 64;

/// Maximum length for document ids
const MAX_ID_LEN: usize = 256;

/// Location and name of a database on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Directory that holds one or more databases
    pub root_path: PathBuf,
    /// Database name; the database lives at `{root_path}/{name}`
    pub name: String,
}

impl DatabaseConfig {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(root_path: P, name: S) -> Self {
        Self {
            root_path: root_path.into(),
            name: name.into(),
        }
    }

    /// Load a config from a YAML file
    ///
    /// ```yaml
    /// root_path: /var/lib/docstore
    /// name: inventory
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).wrap_err_with(|| format!("Failed to read config file {:?}", path))?;
        let config: Self =
            serde_yaml::from_str(&content).wrap_err_with(|| format!("Failed to parse config file {:?}", path))?;
        config.validate()?;
        Ok(config)
    }

    /// Default root directory for databases
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .map(|d| d.join("docstore"))
            .unwrap_or_else(|| PathBuf::from(".docstore"))
    }

    pub fn validate(&self) -> Result<()> {
        if self.root_path.as_os_str().is_empty() {
            return Err(eyre!("Database root path cannot be empty"));
        }
        validate_name("Database name", &self.name)
    }
}

/// Validate a collection id before building a reference from untrusted input
pub fn validate_collection_id(id: &str) -> Result<()> {
    validate_name("Collection id", id)
}

/// Validate a document id before building a reference from untrusted input
pub fn validate_document_id(id: &str) -> Result<()> {
    // Check not empty or whitespace-only
    if id.trim().is_empty() {
        return Err(eyre!("Document id cannot be empty or whitespace-only"));
    }

    if id.len() > MAX_ID_LEN {
        return Err(eyre!("Document id too long: {} chars (max {})", id.len(), MAX_ID_LEN));
    }

    if id == "." || id == ".." || id.contains('/') || id.contains('\\') {
        return Err(eyre!("Invalid document id: {} (must not be a path)", id));
    }

    Ok(())
}

fn validate_name(kind: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(eyre!("{} cannot be empty", kind));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(eyre!("{} too long: {} (max {} chars)", kind, name, MAX_NAME_LEN));
    }
    if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        return Err(eyre!("Invalid {}: {} (must be alphanumeric with _/-)", kind.to_lowercase(), name));
    }
    Ok(())
}
