// Persisted document format: one JSON object per file

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Field map stored in a document
pub type DocumentData = Map<String, Value>;

/// The full persisted unit for one document
///
/// On disk: `{"data": ..., "id": "...", "meta": {"createdAt": "...", "updatedAt": "..."}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Caller-supplied field map; anything other than a JSON object is rejected
    pub data: DocumentData,
    /// Document id; expected to equal the file stem but never checked on read
    pub id: String,
    pub meta: DocumentMetadata,
}

/// Creation and update timestamps, as ISO-8601 strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    pub created_at: String,
    pub updated_at: String,
}

impl DocumentMetadata {
    /// Both timestamps set to now
    pub fn now() -> Self {
        let ts = timestamp();
        Self {
            created_at: ts.clone(),
            updated_at: ts,
        }
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }
}

/// Current time as `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.with_timezone(&Utc))
}
