// DocStore - Local JSON document store with a Firestore-like API

pub mod config;
pub mod database;
pub mod filter;
pub mod pool;
pub mod query;
pub mod record;
pub mod reference;
pub mod snapshot;
pub mod store;

// Re-export main types for convenience
pub use config::{DatabaseConfig, validate_collection_id, validate_document_id};
pub use database::Database;
pub use filter::{Filter, FilterOp, parse_where, where_};
pub use query::{Query, query};
pub use record::{DocumentData, DocumentMetadata, StoredRecord, timestamp};
pub use reference::{CollectionReference, DocumentReference, Reference, collection};
pub use snapshot::DocumentSnapshot;
pub use store::{
    MAX_DOCUMENTS, READ_CONCURRENCY, add_doc, compare_ids, delete_doc, doc, get_doc, get_docs, new_document_id,
    set_doc, update_doc,
};
