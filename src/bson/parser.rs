//! Conversions between JSON text and BSON documents.

use mongodb::bson::{self, Bson, Document};
use serde_json::Value;

use crate::connection::types::ExtendedJsonMode;

/// Parse a JSON string into a BSON document.
pub fn parse_document_from_json(input: &str) -> Result<Document, String> {
    let value: Value = serde_json::from_str(input).map_err(|e| e.to_string())?;
    json_value_to_document(value)
}

/// Parse query text where blank input and `{}` both mean "no document".
pub fn parse_optional_document(input: &str) -> Result<Option<Document>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() || trimmed == "{}" {
        return Ok(None);
    }
    parse_document_from_json(trimmed).map(Some)
}

/// Parse JSON as either a single document or an array of documents.
pub fn parse_documents_from_json(input: &str) -> Result<Vec<Document>, String> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err("Input is empty".to_string());
    }

    let value: Value = serde_json::from_str(trimmed).map_err(|e| e.to_string())?;
    match value {
        Value::Array(items) => {
            let mut docs = Vec::with_capacity(items.len());
            for (i, item) in items.into_iter().enumerate() {
                let doc = json_value_to_document(item)
                    .map_err(|_| format!("Array item {i} is not a document"))?;
                docs.push(doc);
            }
            Ok(docs)
        }
        Value::Object(_) => json_value_to_document(value).map(|doc| vec![doc]),
        _ => Err("Root JSON must be a document or array of documents".to_string()),
    }
}

/// Convert a document to its Extended JSON value in the requested mode.
pub fn document_to_json_value(doc: Document, mode: ExtendedJsonMode) -> Value {
    match mode {
        ExtendedJsonMode::Relaxed => Bson::Document(doc).into_relaxed_extjson(),
        ExtendedJsonMode::Canonical => Bson::Document(doc).into_canonical_extjson(),
    }
}

/// Serialize a document to Extended JSON text.
pub fn document_to_json_string(
    doc: &Document,
    mode: ExtendedJsonMode,
    pretty: bool,
) -> serde_json::Result<String> {
    let value = document_to_json_value(doc.clone(), mode);
    if pretty { serde_json::to_string_pretty(&value) } else { serde_json::to_string(&value) }
}

fn json_value_to_document(value: Value) -> Result<Document, String> {
    match bson::Bson::try_from(value).map_err(|e| e.to_string())? {
        Bson::Document(doc) => Ok(doc),
        _ => Err("Root JSON must be a document".to_string()),
    }
}
