// Point-in-time read results with deferred parsing

use crate::record::{DocumentData, DocumentMetadata, StoredRecord};
use crate::reference::{DocumentReference, Reference};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::OnceLock;
use tracing::debug;

/// Result of reading one document
///
/// The raw file content is parsed at most once, on the first accessor call.
/// Malformed content is indistinguishable from a missing file: `exists()` is
/// false and `data()`/`metadata()` return `None`.
#[derive(Debug)]
pub struct DocumentSnapshot {
    reference: DocumentReference,
    raw: Option<String>,
    read_time: DateTime<Utc>,
    // unset = not parsed yet, Some(None) = absent, Some(Some(_)) = present
    parsed: OnceLock<Option<StoredRecord>>,
}

impl DocumentSnapshot {
    /// `raw` is `None` when the file did not exist or could not be read
    pub fn new(reference: DocumentReference, raw: Option<String>) -> Self {
        Self {
            reference,
            raw,
            read_time: Utc::now(),
            parsed: OnceLock::new(),
        }
    }

    pub fn id(&self) -> &str {
        self.reference.id()
    }

    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    /// When the snapshot was taken
    pub fn read_time(&self) -> DateTime<Utc> {
        self.read_time
    }

    pub fn exists(&self) -> bool {
        self.record().is_some()
    }

    pub fn data(&self) -> Option<&DocumentData> {
        self.record().map(|r| &r.data)
    }

    pub fn metadata(&self) -> Option<&DocumentMetadata> {
        self.record().map(|r| &r.meta)
    }

    /// Deserialize the stored data into `T`
    ///
    /// Returns `None` if the document is absent or the data does not fit `T`.
    pub fn data_as<T: DeserializeOwned>(&self) -> Option<T> {
        let data = Value::Object(self.data()?.clone());
        T::deserialize(data).ok()
    }

    /// The whole parsed record
    pub fn record(&self) -> Option<&StoredRecord> {
        self.parsed.get_or_init(|| self.parse()).as_ref()
    }

    fn parse(&self) -> Option<StoredRecord> {
        let raw = self.raw.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!(id = self.id(), error = %e, "Document content did not parse, treating as absent");
                None
            }
        }
    }
}
