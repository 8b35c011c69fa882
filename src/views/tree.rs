//! Fully expanded key/value tree of each document.

use std::fmt;

use mongodb::bson::{Bson, Document};

use super::DocumentPresenter;
use crate::bson::{DocumentKey, PathSegment, bson_type_label, bson_value_preview, path_to_id};
use crate::state::PageSnapshot;

#[derive(Clone, Debug)]
pub struct TreeAdapter {
    pub max_value_len: usize,
    /// Containers deeper than this are shown collapsed. `None` expands everything.
    pub max_depth: Option<usize>,
}

impl Default for TreeAdapter {
    fn default() -> Self {
        Self { max_value_len: 64, max_depth: None }
    }
}

/// A single rendered node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TreeRow {
    /// Unique across the page; built from the document key and field path
    pub node_id: String,
    /// Index of the owning document on the page
    pub doc_index: usize,
    /// 0 for the document root, 1 for top-level fields
    pub depth: usize,
    pub key_label: String,
    pub type_label: &'static str,
    pub value_preview: String,
    pub is_folder: bool,
}

#[derive(Clone, Debug, Default)]
pub struct TreeView {
    pub rows: Vec<TreeRow>,
}

struct TreeBuilder<'a> {
    adapter: &'a TreeAdapter,
    doc_key: DocumentKey,
    doc_index: usize,
    rows: Vec<TreeRow>,
}

impl TreeBuilder<'_> {
    fn push_document(&mut self, doc: &Document, parent: &[PathSegment], depth: usize) {
        for (key, value) in doc {
            let mut path = parent.to_vec();
            path.push(PathSegment::Key(key.clone()));
            self.push_value(key.clone(), &path, value, depth);
        }
    }

    fn push_value(&mut self, key_label: String, path: &[PathSegment], value: &Bson, depth: usize) {
        let is_folder = matches!(value, Bson::Document(_) | Bson::Array(_));
        self.rows.push(TreeRow {
            node_id: path_to_id(&self.doc_key, path),
            doc_index: self.doc_index,
            depth,
            key_label,
            type_label: bson_type_label(value),
            value_preview: bson_value_preview(value, self.adapter.max_value_len),
            is_folder,
        });

        if self.adapter.max_depth.is_some_and(|max| depth >= max) {
            return;
        }
        match value {
            Bson::Document(inner) => self.push_document(inner, path, depth + 1),
            Bson::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    let mut child = path.to_vec();
                    child.push(PathSegment::Index(idx));
                    self.push_value(format!("[{idx}]"), &child, item, depth + 1);
                }
            }
            _ => {}
        }
    }
}

impl DocumentPresenter for TreeAdapter {
    type Output = TreeView;

    fn present(&self, snapshot: &PageSnapshot) -> TreeView {
        let mut rows = Vec::new();

        for (doc_index, doc) in snapshot.documents.iter().enumerate() {
            let doc_key = DocumentKey::from_document(doc, doc_index);
            let id_preview = doc
                .get("_id")
                .map(|value| bson_value_preview(value, self.max_value_len))
                .unwrap_or_else(|| "doc".to_string());

            let mut builder = TreeBuilder { adapter: self, doc_key, doc_index, rows };
            builder.rows.push(TreeRow {
                node_id: path_to_id(&builder.doc_key, &[]),
                doc_index,
                depth: 0,
                key_label: format!("_id: {id_preview}"),
                type_label: "Document",
                value_preview: format!("{{{} fields}}", doc.len()),
                is_folder: !doc.is_empty(),
            });
            builder.push_document(doc, &[], 1);
            rows = builder.rows;
        }

        TreeView { rows }
    }
}

impl fmt::Display for TreeView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.rows {
            let indent = "  ".repeat(row.depth);
            if row.depth == 0 {
                writeln!(f, "{indent}{} {}", row.key_label, row.value_preview)?;
            } else {
                writeln!(
                    f,
                    "{indent}{}: {}  ({})",
                    row.key_label, row.value_preview, row.type_label
                )?;
            }
        }
        Ok(())
    }
}
