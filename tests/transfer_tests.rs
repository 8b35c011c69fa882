//! Integration tests for JSON export and import using Testcontainers.

mod common;

use std::fs;
use std::io::Write;
use std::sync::Arc;

use common::{MongoTestContainer, fixtures};
use mangoview::Error;
use mangoview::connection::{
    CancellationToken, DocumentGateway, Encoding, ExtendedJsonMode, FindDocumentsOptions,
    JsonExportOptions, JsonImportOptions, JsonTransferFormat, QuerySpec,
    export_collection_to_file, import_collection_from_file,
};
use mongodb::bson::{Document, doc};
use tempfile::TempDir;

fn all_documents(gateway: &dyn DocumentGateway, collection: &str) -> Vec<Document> {
    fixtures::sorted_by_id(
        gateway.find(collection, FindDocumentsOptions::default()).expect("Failed to find"),
    )
}

// =============================================================================
// Round trips
// =============================================================================

#[test]
fn test_round_trip_json_lines() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("round_trip");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    for count in [0usize, 1, 1000] {
        let source = format!("source_{count}");
        let target = format!("target_{count}");
        gateway
            .insert_many(&source, fixtures::generate_test_documents(count))
            .expect("Failed to insert");

        let path = temp_dir.path().join(format!("{source}.jsonl"));
        let exported = export_collection_to_file(
            &gateway,
            &source,
            QuerySpec::default(),
            &path,
            &JsonExportOptions::default(),
        )
        .expect("Failed to export");
        assert_eq!(exported, count as u64);

        let lines = fs::read_to_string(&path).expect("Failed to read export");
        assert_eq!(lines.lines().count(), count);

        let summary = import_collection_from_file(
            &gateway,
            &target,
            &path,
            &JsonImportOptions::default(),
        )
        .expect("Failed to import");
        assert_eq!(summary.inserted, count as u64);
        assert_eq!(all_documents(&gateway, &target), all_documents(&gateway, &source));
    }
}

#[test]
fn test_round_trip_canonical_gzip_preserves_types() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("types");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let original = fixtures::document_with_all_types();
    gateway.insert("source", original.clone()).expect("Failed to insert");

    let path = temp_dir.path().join("types.json.gz");
    let export_options = JsonExportOptions {
        format: JsonTransferFormat::JsonArray,
        json_mode: ExtendedJsonMode::Canonical,
        pretty_print: true,
        gzip: true,
        ..Default::default()
    };
    export_collection_to_file(&gateway, "source", QuerySpec::default(), &path, &export_options)
        .expect("Failed to export");

    let import_options =
        JsonImportOptions { format: JsonTransferFormat::JsonArray, ..Default::default() };
    import_collection_from_file(&gateway, "target", &path, &import_options)
        .expect("Failed to import");

    assert_eq!(all_documents(&gateway, "target"), vec![original]);
}

#[test]
fn test_array_export_parses_to_n_elements() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("array");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    gateway.insert_many("docs", fixtures::generate_test_documents(42)).expect("Failed to insert");

    let path = temp_dir.path().join("docs.json");
    let options = JsonExportOptions {
        format: JsonTransferFormat::JsonArray,
        pretty_print: true,
        ..Default::default()
    };
    let query = QuerySpec {
        filter: Some(doc! { "category": "even" }),
        projection: Some(doc! { "_id": 0, "nested": 0 }),
        sort: Some(doc! { "index": 1 }),
    };
    export_collection_to_file(&gateway, "docs", query, &path, &options).expect("Failed to export");

    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&path).expect("read")).expect("valid JSON");
    let items = parsed.as_array().expect("top-level array");
    assert_eq!(items.len(), 21);
    assert_eq!(items[0]["index"], 0);
    assert_eq!(items[20]["index"], 40);
    assert!(items.iter().all(|item| item.get("_id").is_none() && item.get("nested").is_none()));
}

#[test]
fn test_latin1_round_trip() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("latin1");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    gateway.insert("source", doc! { "_id": 1, "city": "Zürich" }).expect("Failed to insert");

    let path = temp_dir.path().join("latin1.jsonl");
    let export_options = JsonExportOptions { encoding: Encoding::Latin1, ..Default::default() };
    export_collection_to_file(&gateway, "source", QuerySpec::default(), &path, &export_options)
        .expect("Failed to export");

    let bytes = fs::read(&path).expect("read");
    assert!(bytes.contains(&0xFC), "ü should be a single Latin-1 byte");

    let import_options = JsonImportOptions { encoding: Encoding::Latin1, ..Default::default() };
    import_collection_from_file(&gateway, "target", &path, &import_options)
        .expect("Failed to import");
    assert_eq!(
        gateway.find("target", FindDocumentsOptions::default()).expect("find"),
        vec![doc! { "_id": 1, "city": "Zürich" }]
    );
}

// =============================================================================
// Import behavior
// =============================================================================

#[test]
fn test_import_drop_first_replaces_collection() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("drop_first");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    gateway.insert_many("docs", fixtures::generate_test_documents(5)).expect("Failed to insert");

    let path = temp_dir.path().join("replacement.jsonl");
    fs::write(&path, "{\"a\":1}\n\n{\"a\":2}\n").expect("write");

    let options = JsonImportOptions { drop_first: true, ..Default::default() };
    let summary =
        import_collection_from_file(&gateway, "docs", &path, &options).expect("Failed to import");

    assert_eq!(summary.inserted, 2);
    assert_eq!(gateway.count("docs", None).expect("count"), 2);
}

#[test]
fn test_import_cancellation_stops_between_batches() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("cancel");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let path = temp_dir.path().join("many.jsonl");
    let mut file = fs::File::create(&path).expect("create");
    for i in 0..2000 {
        writeln!(file, "{{\"i\":{i}}}").expect("write");
    }
    drop(file);

    let token = CancellationToken::new();
    let trigger = token.clone();
    let options = JsonImportOptions {
        batch_size: 100,
        progress: Some(Arc::new(move |inserted: u64| {
            if inserted >= 300 {
                trigger.cancel();
            }
        })),
        cancellation: Some(token),
        ..Default::default()
    };

    let err = import_collection_from_file(&gateway, "docs", &path, &options).unwrap_err();
    let Error::Cancelled { processed } = err else {
        panic!("expected cancellation, got {err}");
    };

    let stored = gateway.count("docs", None).expect("count");
    assert_eq!(stored, processed);
    assert!((300..2000).contains(&stored), "stored {stored}");
}

#[test]
fn test_import_reports_malformed_line() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("malformed");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let path = temp_dir.path().join("broken.jsonl");
    fs::write(&path, "{\"a\":1}\n{\"a\":2}\n{\"a\":\n{\"a\":4}\n").expect("write");

    let err = import_collection_from_file(&gateway, "docs", &path, &JsonImportOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::ParseLine { line: 3, .. }), "got {err}");
    assert_eq!(gateway.count("docs", None).expect("count"), 2);
}

// =============================================================================
// Export safety
// =============================================================================

#[test]
fn test_failed_export_keeps_previous_file() {
    let mongo = MongoTestContainer::start();
    let gateway = mongo.gateway("export_fail");
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    gateway.insert("docs", doc! { "x": 1 }).expect("Failed to insert");

    let path = temp_dir.path().join("keep.jsonl");
    fs::write(&path, "previous contents\n").expect("write");

    let query = QuerySpec { filter: Some(doc! { "$bogus": 1 }), ..Default::default() };
    let err = export_collection_to_file(&gateway, "docs", query, &path, &Default::default())
        .unwrap_err();
    assert!(err.is_gateway());
    assert_eq!(fs::read_to_string(&path).expect("read"), "previous contents\n");

    let leftovers = fs::read_dir(temp_dir.path()).expect("list").count();
    assert_eq!(leftovers, 1);
}
