// Path-resolving handles for collections and documents

use crate::database::Database;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

/// Anything addressable in the database
///
/// `path()` is derived from the identity chain on every call and performs no I/O.
pub trait Reference {
    fn id(&self) -> &str;

    fn path(&self) -> PathBuf;
}

/// Handle to `{db}/collections/{id}`
#[derive(Debug, Clone)]
pub struct CollectionReference {
    db: Database,
    id: String,
}

impl CollectionReference {
    /// Build the reference and make sure `documents/` and `indexes/` exist
    ///
    /// Directory creation is idempotent. A failure is logged, not returned; the
    /// next read or write against the collection surfaces it.
    pub fn new<S: Into<String>>(db: &Database, id: S) -> Self {
        let reference = Self {
            db: db.clone(),
            id: id.into(),
        };
        reference.ensure_layout();
        reference
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    /// `{collection}/documents`
    pub fn documents_path(&self) -> PathBuf {
        self.path().join("documents")
    }

    /// `{collection}/indexes` (reserved)
    pub fn indexes_path(&self) -> PathBuf {
        self.path().join("indexes")
    }

    fn ensure_layout(&self) {
        for dir in [self.documents_path(), self.indexes_path()] {
            if dir.is_dir() {
                continue;
            }
            debug!(collection = %self.id, path = ?dir, "Creating collection directory");
            if let Err(e) = fs::create_dir_all(&dir) {
                warn!(collection = %self.id, path = ?dir, error = %e, "Failed to create collection directory");
            }
        }
    }
}

impl Reference for CollectionReference {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> PathBuf {
        self.db.collections_path().join(&self.id)
    }
}

/// Handle to `{collection}/documents/{id}.json`
#[derive(Debug, Clone)]
pub struct DocumentReference {
    parent: CollectionReference,
    id: String,
}

impl DocumentReference {
    pub fn new<S: Into<String>>(parent: &CollectionReference, id: S) -> Self {
        Self {
            parent: parent.clone(),
            id: id.into(),
        }
    }

    /// Owning collection
    pub fn parent(&self) -> &CollectionReference {
        &self.parent
    }
}

impl Reference for DocumentReference {
    fn id(&self) -> &str {
        &self.id
    }

    fn path(&self) -> PathBuf {
        self.parent.documents_path().join(format!("{}.json", self.id))
    }
}

/// Reference a collection, creating its directories if needed
pub fn collection<S: Into<String>>(db: &Database, id: S) -> CollectionReference {
    CollectionReference::new(db, id)
}
