// Document access API: reads, writes and bulk listing over the file layout

use crate::pool::run_bounded;
use crate::query::Query;
use crate::record::{DocumentData, DocumentMetadata, StoredRecord, timestamp};
use crate::reference::{CollectionReference, DocumentReference, Reference};
use crate::snapshot::DocumentSnapshot;
use eyre::{Context, Result, eyre};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// Most documents `get_docs` will read from one collection
pub const MAX_DOCUMENTS: usize = 100;

/// Number of files `get_docs` reads at once
pub const READ_CONCURRENCY: usize = 10;

/// Reference a document in `collection`; no I/O
pub fn doc<S: Into<String>>(collection: &CollectionReference, id: S) -> DocumentReference {
    DocumentReference::new(collection, id)
}

/// Read one document
///
/// A missing or unreadable file yields a snapshot whose `exists()` is false.
pub fn get_doc(reference: &DocumentReference) -> DocumentSnapshot {
    let raw = read_document(&reference.path(), reference.id());
    DocumentSnapshot::new(reference.clone(), raw)
}

/// Write `data` to the document, replacing whatever was there
///
/// `data` must serialize to a JSON object. Both `createdAt` and `updatedAt` are
/// set to now on every call.
pub fn set_doc<T: Serialize + ?Sized>(reference: &DocumentReference, data: &T) -> Result<()> {
    let data = match serde_json::to_value(data).context("Failed to serialize document data")? {
        Value::Object(fields) => fields,
        other => {
            return Err(eyre!(
                "Document {} data must be a JSON object, got {}",
                reference.id(),
                json_kind(&other)
            ));
        }
    };
    write_record(
        reference,
        &StoredRecord {
            data,
            id: reference.id().to_string(),
            meta: DocumentMetadata::now(),
        },
    )
}

/// Store `data` under a fresh random id and return its reference
pub fn add_doc<T: Serialize + ?Sized>(collection: &CollectionReference, data: &T) -> Result<DocumentReference> {
    let reference = doc(collection, new_document_id());
    set_doc(&reference, data)?;
    Ok(reference)
}

/// Merge top-level `fields` into an existing document
///
/// Keeps `createdAt` and refreshes `updatedAt`. Fails if the document does not
/// exist or `fields` is not a JSON object.
pub fn update_doc(reference: &DocumentReference, fields: &Value) -> Result<()> {
    let fields = fields
        .as_object()
        .ok_or_else(|| eyre!("Update for document {} must be a JSON object", reference.id()))?;

    let snapshot = get_doc(reference);
    let Some(existing) = snapshot.record() else {
        return Err(eyre!("Cannot update document {}: it does not exist", reference.id()));
    };

    let mut data: DocumentData = existing.data.clone();
    for (key, value) in fields {
        data.insert(key.clone(), value.clone());
    }

    write_record(
        reference,
        &StoredRecord {
            data,
            id: reference.id().to_string(),
            meta: DocumentMetadata {
                created_at: existing.meta.created_at.clone(),
                updated_at: timestamp(),
            },
        },
    )
}

/// Remove the document's file
///
/// Deleting a document that does not exist only logs a warning.
pub fn delete_doc(reference: &DocumentReference) -> Result<()> {
    match fs::remove_file(reference.path()) {
        Ok(()) => {
            debug!(id = reference.id(), "Deleted document");
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            warn!(id = reference.id(), collection = reference.parent().id(), "Document to delete does not exist");
            Ok(())
        }
        Err(e) => Err(eyre!("Failed to delete document {}: {}", reference.id(), e)),
    }
}

/// Read the documents of a collection, optionally filtered
///
/// Lists at most [`MAX_DOCUMENTS`] ids in [`compare_ids`] order, reads them
/// [`READ_CONCURRENCY`] at a time, then applies the query's clauses in memory.
/// Documents past the cap are never read, even if they would match. Without
/// filters, unparseable documents are still returned (as absent snapshots).
pub fn get_docs<Q: Into<Query>>(source: Q) -> Vec<DocumentSnapshot> {
    let query = source.into();
    let collection = query.collection();

    let mut ids = match list_document_ids(collection) {
        Ok(ids) => ids,
        Err(e) => {
            error!(collection = collection.id(), error = ?e, "Failed to list documents");
            return Vec::new();
        }
    };

    ids.sort_by(|a, b| compare_ids(a, b));
    ids.truncate(MAX_DOCUMENTS);

    let snapshots = run_bounded(&ids, READ_CONCURRENCY, |id| get_doc(&doc(collection, id.as_str())));

    debug!(
        collection = collection.id(),
        read = snapshots.len(),
        filters = query.filters().len(),
        "Read documents"
    );

    if query.filters().is_empty() {
        return snapshots;
    }

    snapshots.into_iter().filter(|snap| query.matches(snap.data())).collect()
}

/// Natural order for document ids
///
/// Ids are split into runs of ASCII digits and runs of everything else, and
/// compared run by run: digit runs by numeric value, other runs
/// case-insensitively, and a digit run sorts before a text run. Ids that are
/// still equal are ordered by their bytes with lowercase before uppercase.
/// This is a total order, so `"2" < "10" < "abc"` and `"1a" < "2" < "10"`.
pub fn compare_ids(a: &str, b: &str) -> Ordering {
    let x = id_runs(a);
    let y = id_runs(b);

    x.iter()
        .zip(&y)
        .map(|(p, q)| compare_runs(p, q))
        .find(|ord| ord.is_ne())
        .unwrap_or_else(|| x.len().cmp(&y.len()))
        .then_with(|| a.bytes().map(swap_case).cmp(b.bytes().map(swap_case)))
}

/// Fresh random document id (UUID v4)
pub fn new_document_id() -> String {
    Uuid::new_v4().to_string()
}

fn id_runs(id: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = 0;
    let mut prev_digit = None;

    for (i, c) in id.char_indices() {
        let digit = c.is_ascii_digit();
        if prev_digit.is_some_and(|p| p != digit) {
            runs.push(&id[start..i]);
            start = i;
        }
        prev_digit = Some(digit);
    }
    if start < id.len() {
        runs.push(&id[start..]);
    }

    runs
}

fn compare_runs(a: &str, b: &str) -> Ordering {
    let a_digits = a.starts_with(|c: char| c.is_ascii_digit());
    let b_digits = b.starts_with(|c: char| c.is_ascii_digit());

    match (a_digits, b_digits) {
        (true, true) => {
            let a = a.trim_start_matches('0');
            let b = b.trim_start_matches('0');
            a.len().cmp(&b.len()).then_with(|| a.cmp(b))
        }
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        (false, false) => a
            .chars()
            .flat_map(char::to_lowercase)
            .cmp(b.chars().flat_map(char::to_lowercase)),
    }
}

// Lowercase letters sort ahead of their uppercase forms
fn swap_case(b: u8) -> u8 {
    if b.is_ascii_uppercase() {
        b.to_ascii_lowercase()
    } else if b.is_ascii_lowercase() {
        b.to_ascii_uppercase()
    } else {
        b
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn write_record(reference: &DocumentReference, record: &StoredRecord) -> Result<()> {
    let json = serde_json::to_string(record).context("Failed to serialize document")?;
    fs::write(reference.path(), json).wrap_err_with(|| format!("Failed to write document {}", reference.id()))?;
    debug!(id = reference.id(), collection = reference.parent().id(), "Wrote document");
    Ok(())
}

fn read_document(path: &Path, id: &str) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) if e.kind() == ErrorKind::NotFound => None,
        Err(e) => {
            warn!(id, file = ?path, error = %e, "Failed to read document, treating as absent");
            None
        }
    }
}

fn list_document_ids(collection: &CollectionReference) -> Result<Vec<String>> {
    let mut ids = Vec::new();

    for entry in fs::read_dir(collection.documents_path()).context("Failed to read documents directory")? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        match path.file_stem().and_then(|s| s.to_str()) {
            Some(id) => ids.push(id.to_string()),
            None => warn!(file = ?path, "Skipping document with non UTF-8 name"),
        }
    }

    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;
    use crate::database::Database;
    use crate::filter::{FilterOp, where_};
    use crate::reference::collection;
    use serde::Deserialize;
    use serde_json::json;
    use std::collections::HashSet;
    use std::thread;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup() -> (TempDir, CollectionReference) {
        let temp = TempDir::new().unwrap();
        let db = Database::open(DatabaseConfig::new(temp.path(), "main")).unwrap();
        let people = collection(&db, "people");
        (temp, people)
    }

    fn ids(snapshots: &[DocumentSnapshot]) -> Vec<&str> {
        snapshots.iter().map(|s| s.id()).collect()
    }

    #[test]
    fn test_set_then_get() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");
        let payload = json!({"name": "Alice", "age": 30, "tags": ["a", "b"]});

        set_doc(&alice, &payload).unwrap();

        let snap = get_doc(&alice);
        assert!(snap.exists());
        assert_eq!(snap.data(), payload.as_object());
        assert!(snap.metadata().is_some());
    }

    #[test]
    fn test_set_writes_record_format() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");
        set_doc(&alice, &json!({"name": "Alice"})).unwrap();

        let on_disk: Value = serde_json::from_str(&fs::read_to_string(alice.path()).unwrap()).unwrap();
        assert_eq!(on_disk["id"], "alice");
        assert_eq!(on_disk["data"], json!({"name": "Alice"}));
        assert_eq!(on_disk["meta"]["createdAt"], on_disk["meta"]["updatedAt"]);
    }

    #[test]
    fn test_set_typed_struct() {
        #[derive(Debug, Serialize, Deserialize, PartialEq)]
        struct Person {
            name: String,
            age: u32,
        }

        let (_temp, people) = setup();
        let bob = doc(&people, "bob");
        let person = Person {
            name: "Bob".to_string(),
            age: 41,
        };
        set_doc(&bob, &person).unwrap();

        assert_eq!(get_doc(&bob).data_as::<Person>(), Some(person));
    }

    #[test]
    fn test_get_missing_document() {
        let (_temp, people) = setup();
        let snap = get_doc(&doc(&people, "nobody"));

        assert!(!snap.exists());
        assert!(snap.data().is_none());
        assert!(snap.metadata().is_none());
    }

    #[test]
    fn test_get_unreadable_document_is_absent() {
        let (_temp, people) = setup();
        let broken = doc(&people, "broken");
        // A directory where the file should be cannot be read as text
        fs::create_dir_all(broken.path()).unwrap();

        assert!(!get_doc(&broken).exists());
    }

    #[test]
    fn test_get_malformed_document_is_absent() {
        let (_temp, people) = setup();
        let bad = doc(&people, "bad");
        fs::write(bad.path(), "{oops").unwrap();

        let snap = get_doc(&bad);
        assert!(!snap.exists());
        assert!(snap.data().is_none());
    }

    // Known limitation: overwriting resets createdAt
    #[test]
    fn test_set_twice_overwrites_created_at() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");

        set_doc(&alice, &json!({"version": 1, "extra": true})).unwrap();
        let first = get_doc(&alice);
        let first_created = first.metadata().unwrap().created_at.clone();

        thread::sleep(Duration::from_millis(5));
        set_doc(&alice, &json!({"version": 2})).unwrap();
        let second = get_doc(&alice);

        assert_eq!(second.data(), json!({"version": 2}).as_object());
        assert_ne!(second.metadata().unwrap().created_at, first_created);
    }

    #[test]
    fn test_set_propagates_write_failure() {
        let (_temp, people) = setup();
        fs::remove_dir_all(people.documents_path()).unwrap();

        let err = set_doc(&doc(&people, "alice"), &json!({})).unwrap_err();
        assert!(format!("{:#}", err).contains("alice"));
    }

    #[test]
    fn test_set_rejects_non_object_data() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");

        for payload in [json!(5), json!("text"), json!([1, 2]), json!(null)] {
            let err = set_doc(&alice, &payload).unwrap_err();
            assert!(err.to_string().contains("must be a JSON object"));
        }
        assert!(!alice.path().exists());
    }

    #[test]
    fn test_add_doc_generates_distinct_ids() {
        let (_temp, people) = setup();

        let mut seen = HashSet::new();
        for i in 0..50 {
            let reference = add_doc(&people, &json!({"n": i})).unwrap();
            assert!(get_doc(&reference).exists());
            assert!(seen.insert(reference.id().to_string()));
        }
    }

    #[test]
    fn test_new_document_id_uniqueness() {
        let ids: HashSet<String> = (0..10_000).map(|_| new_document_id()).collect();
        assert_eq!(ids.len(), 10_000);
    }

    #[test]
    fn test_delete_doc() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");
        set_doc(&alice, &json!({"name": "Alice"})).unwrap();

        delete_doc(&alice).unwrap();

        assert!(!get_doc(&alice).exists());
        assert!(!alice.path().exists());
    }

    #[test]
    fn test_delete_missing_is_ok() {
        let (_temp, people) = setup();
        let ghost = doc(&people, "ghost");

        delete_doc(&ghost).unwrap();
        delete_doc(&ghost).unwrap();
    }

    #[test]
    fn test_delete_failure_names_document() {
        let (_temp, people) = setup();
        let stuck = doc(&people, "stuck");
        fs::create_dir_all(stuck.path()).unwrap();

        let err = delete_doc(&stuck).unwrap_err();
        assert!(err.to_string().contains("stuck"));
    }

    #[test]
    fn test_update_doc_merges_and_keeps_created_at() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");
        set_doc(&alice, &json!({"name": "Alice", "age": 30})).unwrap();
        let created = get_doc(&alice).metadata().unwrap().clone();

        thread::sleep(Duration::from_millis(5));
        update_doc(&alice, &json!({"age": 31, "city": "Oslo"})).unwrap();

        let snap = get_doc(&alice);
        assert_eq!(snap.data(), json!({"name": "Alice", "age": 31, "city": "Oslo"}).as_object());
        assert_eq!(snap.metadata().unwrap().created_at, created.created_at);
        assert_ne!(snap.metadata().unwrap().updated_at, created.updated_at);
    }

    #[test]
    fn test_update_missing_doc_fails() {
        let (_temp, people) = setup();
        assert!(update_doc(&doc(&people, "nobody"), &json!({"a": 1})).is_err());
    }

    #[test]
    fn test_update_requires_object() {
        let (_temp, people) = setup();
        let alice = doc(&people, "alice");
        set_doc(&alice, &json!({"a": 1})).unwrap();
        assert!(update_doc(&alice, &json!([1, 2])).is_err());
    }

    #[test]
    fn test_compare_ids() {
        assert_eq!(compare_ids("2", "10"), Ordering::Less);
        assert_eq!(compare_ids("10", "abc"), Ordering::Less);
        assert_eq!(compare_ids("2", "abc"), Ordering::Less);
        assert_eq!(compare_ids("007", "7"), Ordering::Less);
        assert_eq!(compare_ids("apple", "Banana"), Ordering::Less);
        assert_eq!(compare_ids("x", "x"), Ordering::Equal);
        assert_eq!(compare_ids("1a", "2"), Ordering::Less);
        assert_eq!(compare_ids("1a", "10"), Ordering::Less);
        assert_eq!(compare_ids("file2", "file10"), Ordering::Less);

        let mut ids = vec!["abc", "10", "2"];
        ids.sort_by(|a, b| compare_ids(a, b));
        assert_eq!(ids, vec!["2", "10", "abc"]);
    }

    #[test]
    fn test_compare_ids_lowercase_first() {
        assert_eq!(compare_ids("a", "A"), Ordering::Less);
        assert_eq!(compare_ids("A", "a"), Ordering::Greater);
        assert_eq!(compare_ids("A", "b"), Ordering::Less);
    }

    fn mixed_ids() -> Vec<String> {
        (0..60).flat_map(|n| [n.to_string(), format!("{}a", n)]).collect()
    }

    #[test]
    fn test_compare_ids_is_total_order() {
        let ids = mixed_ids();

        for a in &ids {
            assert_eq!(compare_ids(a, a), Ordering::Equal);
            for b in &ids {
                let ab = compare_ids(a, b);
                assert_eq!(ab, compare_ids(b, a).reverse(), "{} vs {}", a, b);
                if ab != Ordering::Less {
                    continue;
                }
                for c in &ids {
                    if compare_ids(b, c) == Ordering::Less {
                        assert_eq!(compare_ids(a, c), Ordering::Less, "{} < {} < {}", a, b, c);
                    }
                }
            }
        }
    }

    #[test]
    fn test_sort_mixed_ids_from_any_order() {
        let mut expected = mixed_ids();
        expected.sort_by(|a, b| compare_ids(a, b));
        assert_eq!(&expected[..5], ["0", "0a", "1", "1a", "2"]);
        assert_eq!(&expected[expected.len() - 2..], ["59", "59a"]);

        // xorshift-driven Fisher-Yates shuffles
        let mut state: u64 = 0x9E37_79B9_7F4A_7C15;
        for _ in 0..200 {
            let mut ids = mixed_ids();
            for i in (1..ids.len()).rev() {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ids.swap(i, (state % (i as u64 + 1)) as usize);
            }
            ids.sort_by(|a, b| compare_ids(a, b));
            assert_eq!(ids, expected);
        }
    }

    #[test]
    fn test_get_docs_caps_at_max() {
        let (_temp, people) = setup();
        for i in 0..150 {
            set_doc(&doc(&people, i.to_string()), &json!({"n": i})).unwrap();
        }

        let snapshots = get_docs(&people);
        assert_eq!(snapshots.len(), MAX_DOCUMENTS);

        let expected: Vec<String> = (0..100).map(|i| i.to_string()).collect();
        assert_eq!(ids(&snapshots), expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn test_get_docs_filters_after_cap() {
        let (_temp, people) = setup();
        for i in 0..120 {
            set_doc(&doc(&people, i.to_string()), &json!({"n": i})).unwrap();
        }

        // Document 110 matches but sits beyond the cap
        let q = Query::new(&people).filter(where_("n", FilterOp::Gte, 95));
        let snapshots = get_docs(&q);

        assert_eq!(ids(&snapshots), vec!["95", "96", "97", "98", "99"]);
    }

    #[test]
    fn test_get_docs_ordering_and_concurrency() {
        let (_temp, people) = setup();
        let mut expected: Vec<String> = (0..30).map(|i| i.to_string()).collect();
        expected.extend(["a", "B", "c", "d1", "E", "f", "g"].map(String::from));
        for id in expected.iter().rev() {
            set_doc(&doc(&people, id.as_str()), &json!({"id": id})).unwrap();
        }

        let snapshots = get_docs(&people);
        assert_eq!(snapshots.len(), 37);
        assert_eq!(ids(&snapshots), expected.iter().map(String::as_str).collect::<Vec<_>>());
        assert!(snapshots.iter().all(|s| s.exists()));
    }

    #[test]
    fn test_get_docs_with_query() {
        let (_temp, people) = setup();
        set_doc(&doc(&people, "a"), &json!({"age": 17})).unwrap();
        set_doc(&doc(&people, "b"), &json!({"age": 18})).unwrap();
        set_doc(&doc(&people, "c"), &json!({"age": 25})).unwrap();

        let q = Query::new(&people).filter(where_("age", FilterOp::Gte, 18));
        let snapshots = get_docs(&q);

        assert_eq!(ids(&snapshots), vec!["b", "c"]);
    }

    #[test]
    fn test_get_docs_malformed_only_in_unfiltered() {
        let (_temp, people) = setup();
        set_doc(&doc(&people, "good"), &json!({"age": 40})).unwrap();
        fs::write(doc(&people, "bad").path(), "not json").unwrap();

        let all = get_docs(&people);
        assert_eq!(ids(&all), vec!["bad", "good"]);
        assert!(!all[0].exists());

        let filtered = get_docs(Query::new(&people).filter(where_("age", FilterOp::Ne, 0)));
        assert_eq!(ids(&filtered), vec!["good"]);
    }

    #[test]
    fn test_get_docs_unreadable_file_is_absent_in_listing() {
        let (_temp, people) = setup();
        set_doc(&doc(&people, "good"), &json!({"age": 40})).unwrap();
        // Not valid UTF-8, so reading it as text fails
        fs::write(doc(&people, "binary").path(), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let all = get_docs(&people);
        assert_eq!(ids(&all), vec!["binary", "good"]);
        assert!(!all[0].exists());
        assert!(all[0].data().is_none());
        assert!(all[1].exists());
        assert_eq!(all[1].data(), json!({"age": 40}).as_object());
    }

    #[test]
    fn test_get_docs_skips_non_json_entries() {
        let (_temp, people) = setup();
        set_doc(&doc(&people, "one"), &json!({})).unwrap();
        fs::write(people.documents_path().join("notes.txt"), "x").unwrap();
        fs::create_dir_all(people.documents_path().join("dir.json")).unwrap();

        assert_eq!(ids(&get_docs(&people)), vec!["one"]);
    }

    #[test]
    fn test_get_docs_missing_directory_is_empty() {
        let (_temp, people) = setup();
        set_doc(&doc(&people, "one"), &json!({})).unwrap();
        fs::remove_dir_all(people.path()).unwrap();

        assert!(get_docs(&people).is_empty());
    }
}
