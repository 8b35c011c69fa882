//! Stable document identity for presentation rows.

use mongodb::bson::{Bson, Document};

/// Stable key derived from a document's `_id`, or its position when it has none.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DocumentKey(String);

impl DocumentKey {
    pub fn from_id(id: &Bson) -> Self {
        let ext = id.clone().into_relaxed_extjson();
        Self(serde_json::to_string(&ext).unwrap_or_else(|_| id.to_string()))
    }

    pub fn from_document(doc: &Document, position: usize) -> Self {
        match doc.get("_id") {
            Some(id) => Self::from_id(id),
            None => Self(format!("index:{position}")),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DocumentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
