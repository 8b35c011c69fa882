//! One summary line per document.

use std::fmt;

use mongodb::bson::Document;

use super::DocumentPresenter;
use crate::bson::{DocumentKey, bson_value_preview, document_to_json_string, truncate_for_preview};
use crate::connection::ExtendedJsonMode;
use crate::state::{PageRange, PageSnapshot};

#[derive(Clone, Debug)]
pub struct ListAdapter {
    pub max_id_len: usize,
    pub max_summary_len: usize,
}

impl Default for ListAdapter {
    fn default() -> Self {
        Self { max_id_len: 40, max_summary_len: 96 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRow {
    pub key: DocumentKey,
    /// 1-based position across the whole result, not just this page.
    pub position: u64,
    pub id_preview: String,
    pub summary: String,
}

#[derive(Clone, Debug)]
pub struct ListPage {
    pub range: PageRange,
    pub page: u64,
    pub page_count: u64,
    pub rows: Vec<ListRow>,
}

impl ListAdapter {
    fn summarize(&self, doc: &Document) -> String {
        let body: Document = doc
            .iter()
            .filter(|(key, _)| key.as_str() != "_id")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        let json = document_to_json_string(&body, ExtendedJsonMode::Relaxed, false)
            .unwrap_or_else(|_| format!("{body}"));
        truncate_for_preview(&json, self.max_summary_len)
    }
}

impl DocumentPresenter for ListAdapter {
    type Output = ListPage;

    fn present(&self, snapshot: &PageSnapshot) -> ListPage {
        let range = snapshot.page_range();
        let rows = snapshot
            .documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| ListRow {
                key: DocumentKey::from_document(doc, idx),
                position: range.start + idx as u64,
                id_preview: doc
                    .get("_id")
                    .map(|id| bson_value_preview(id, self.max_id_len))
                    .unwrap_or_else(|| "-".to_string()),
                summary: self.summarize(doc),
            })
            .collect();

        ListPage { range, page: snapshot.current_page, page_count: snapshot.page_count, rows }
    }
}

impl fmt::Display for ListPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} (page {} of {})", self.range, self.page, self.page_count)?;
        let width = self.rows.last().map(|row| row.position.to_string().len()).unwrap_or(1);
        for row in &self.rows {
            writeln!(f, "{:>width$}. {}  {}", row.position, row.id_preview, row.summary)?;
        }
        Ok(())
    }
}
