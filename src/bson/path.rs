//! Field addressing inside BSON documents.

use mongodb::bson::{Bson, Document};

use super::DocumentKey;

/// A segment in a path through a BSON document.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PathSegment {
    Key(String),
    Index(usize),
}

/// Unique node id for a path inside the document identified by `doc_key`.
pub fn path_to_id(doc_key: &DocumentKey, path: &[PathSegment]) -> String {
    let mut id = format!("doc:{}", escape_key(doc_key.as_str()));
    for segment in path {
        id.push('/');
        match segment {
            PathSegment::Key(key) => id.push_str(&escape_key(key)),
            PathSegment::Index(idx) => id.push_str(&format!("[{idx}]")),
        }
    }
    id
}

/// Escape a key for use in node ids.
pub fn escape_key(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Resolve a dotted field path (`address.city`, `tags.0`) against a document.
pub fn lookup_dotted<'a>(doc: &'a Document, dotted: &str) -> Option<&'a Bson> {
    let mut parts = dotted.split('.');
    let mut current = doc.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Bson::Document(inner) => inner.get(part)?,
            Bson::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
