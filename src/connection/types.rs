use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use mongodb::bson::Document;
use serde::{Deserialize, Serialize};

/// JSON layout for import/export files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum JsonTransferFormat {
    /// One document per line
    #[default]
    JsonLines,
    /// A single `[doc, doc, ...]` array
    JsonArray,
}

impl JsonTransferFormat {
    pub fn label(self) -> &'static str {
        match self {
            JsonTransferFormat::JsonLines => "JSON Lines",
            JsonTransferFormat::JsonArray => "JSON Array",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            JsonTransferFormat::JsonLines => "jsonl",
            JsonTransferFormat::JsonArray => "json",
        }
    }
}

/// Extended JSON output mode
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExtendedJsonMode {
    #[default]
    Relaxed,
    Canonical,
}

/// Text encoding for export/import files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Encoding {
    #[default]
    Utf8,
    Latin1,
}

impl Encoding {
    pub fn label(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Latin1 => "Latin-1",
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "utf8" => Ok(Encoding::Utf8),
            "latin1" | "iso88591" | "windows1252" => Ok(Encoding::Latin1),
            other => Err(format!("unsupported encoding: {other}")),
        }
    }
}

/// Progress callback type for reporting operation progress.
pub type ProgressCallback = Arc<dyn Fn(u64) + Send + Sync>;

/// Cancellation token for aborting long-running operations.
///
/// Checked once per document or line; a document already being written is
/// always finished.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl std::fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancellationToken").field("cancelled", &self.is_cancelled()).finish()
    }
}

/// Filter, projection and sort shared by paged finds and exports.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuerySpec {
    pub filter: Option<Document>,
    pub projection: Option<Document>,
    pub sort: Option<Document>,
}

/// Options for finding documents with pagination
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FindDocumentsOptions {
    pub filter: Option<Document>,
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub skip: u64,
    /// `None` returns every match
    pub limit: Option<i64>,
}

/// Options for JSON export
#[derive(Clone, Default)]
pub struct JsonExportOptions {
    pub format: JsonTransferFormat,
    pub json_mode: ExtendedJsonMode,
    /// Only honoured for `JsonArray`; lines stay one document per line.
    pub pretty_print: bool,
    pub gzip: bool,
    pub encoding: Encoding,
    pub progress: Option<ProgressCallback>,
    pub cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for JsonExportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonExportOptions")
            .field("format", &self.format)
            .field("json_mode", &self.json_mode)
            .field("pretty_print", &self.pretty_print)
            .field("gzip", &self.gzip)
            .field("encoding", &self.encoding)
            .field("progress", &self.progress.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Options for JSON import
#[derive(Clone)]
pub struct JsonImportOptions {
    pub format: JsonTransferFormat,
    pub drop_first: bool,
    pub batch_size: usize,
    pub encoding: Encoding,
    pub progress: Option<ProgressCallback>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for JsonImportOptions {
    fn default() -> Self {
        Self {
            format: JsonTransferFormat::default(),
            drop_first: false,
            batch_size: 1000,
            encoding: Encoding::default(),
            progress: None,
            cancellation: None,
        }
    }
}

impl std::fmt::Debug for JsonImportOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonImportOptions")
            .field("format", &self.format)
            .field("drop_first", &self.drop_first)
            .field("batch_size", &self.batch_size)
            .field("encoding", &self.encoding)
            .field("progress", &self.progress.is_some())
            .field("cancellation", &self.cancellation.is_some())
            .finish()
    }
}

/// Result of a finished import.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: u64,
    /// Non-blank lines consumed (array imports count as one line)
    pub lines: u64,
}

pub(crate) fn is_cancelled(token: Option<&CancellationToken>) -> bool {
    token.is_some_and(CancellationToken::is_cancelled)
}
