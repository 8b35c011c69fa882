//! Documents as rows of a table whose columns are their top-level keys.

use std::fmt;

use super::DocumentPresenter;
use crate::bson::{DocumentKey, bson_value_preview};
use crate::state::PageSnapshot;

#[derive(Clone, Debug)]
pub struct TableAdapter {
    pub max_cell_len: usize,
}

impl Default for TableAdapter {
    fn default() -> Self {
        Self { max_cell_len: 32 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableRow {
    pub key: DocumentKey,
    /// One cell per column; empty where the document lacks the key.
    pub cells: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl DocumentPresenter for TableAdapter {
    type Output = Table;

    fn present(&self, snapshot: &PageSnapshot) -> Table {
        let documents = snapshot.documents.as_slice();

        let mut columns: Vec<String> = Vec::new();
        if documents.iter().any(|doc| doc.contains_key("_id")) {
            columns.push("_id".to_string());
        }
        for doc in documents {
            for key in doc.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }

        let rows = documents
            .iter()
            .enumerate()
            .map(|(idx, doc)| TableRow {
                key: DocumentKey::from_document(doc, idx),
                cells: columns
                    .iter()
                    .map(|column| {
                        doc.get(column)
                            .map(|value| bson_value_preview(value, self.max_cell_len))
                            .unwrap_or_default()
                    })
                    .collect(),
            })
            .collect();

        Table { columns, rows }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.columns.is_empty() {
            return writeln!(f, "(no documents)");
        }

        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(idx, column)| {
                self.rows
                    .iter()
                    .map(|row| row.cells[idx].chars().count())
                    .chain(std::iter::once(column.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let write_line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let line: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", line.join(" | ").trim_end())
        };

        write_line(f, &self.columns)?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &self.rows {
            write_line(f, &row.cells)?;
        }
        Ok(())
    }
}
