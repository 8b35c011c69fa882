//! Test fixtures for integration tests.

#![allow(dead_code)]

use mongodb::bson::{Document, doc, oid::ObjectId};

/// Generate a batch of numbered documents with a stable `index` field.
pub fn generate_test_documents(count: usize) -> Vec<Document> {
    (0..count)
        .map(|i| {
            doc! {
                "_id": ObjectId::new(),
                "index": i as i32,
                "name": format!("Document {}", i),
                "category": if i % 2 == 0 { "even" } else { "odd" },
                "value": (i * 10) as i32,
                "nested": {
                    "field": format!("nested_{}", i),
                    "number": i as i32,
                },
            }
        })
        .collect()
}

/// Generate a document with various BSON types for type handling tests.
pub fn document_with_all_types() -> Document {
    doc! {
        "_id": ObjectId::new(),
        "string": "hello world",
        "int32": 42_i32,
        "int64": 9_000_000_000_000_i64,
        "double": std::f64::consts::PI,
        "boolean": true,
        "null": null,
        "array": ["a", "b", "c"],
        "nested": {
            "key": "value",
            "deep": {
                "deeper": "bottom"
            }
        },
        "date": mongodb::bson::DateTime::from_millis(1_700_000_000_000),
    }
}

/// Sort documents by `_id` hex so two collections can be compared.
pub fn sorted_by_id(mut docs: Vec<Document>) -> Vec<Document> {
    docs.sort_by_key(|doc| doc.get_object_id("_id").map(|id| id.to_hex()).unwrap_or_default());
    docs
}
