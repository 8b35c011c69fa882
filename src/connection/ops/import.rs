//! Collection import from JSON Lines or JSON array files.
//!
//! Import is not transactional: documents inserted before a cancellation or a
//! parse error stay in the collection.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use flate2::read::GzDecoder;
use mongodb::bson::Document;

use crate::bson::parse_documents_from_json;
use crate::connection::gateway::DocumentGateway;
use crate::connection::types::{
    Encoding, ImportSummary, JsonImportOptions, JsonTransferFormat, ProgressCallback,
    is_cancelled,
};
use crate::error::{Error, Result};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Import line-delimited JSON from `reader`.
///
/// Each non-blank line holds one document or an array of documents. The
/// cancellation token is checked before every line; documents parsed so far
/// are inserted before `Error::Cancelled` is returned. The first malformed
/// line stops the import with `Error::ParseLine` after the documents from the
/// preceding lines have been inserted.
pub fn import_documents<R: BufRead>(
    gateway: &dyn DocumentGateway,
    collection: &str,
    mut reader: R,
    options: &JsonImportOptions,
) -> Result<ImportSummary> {
    if options.drop_first {
        drop_target(gateway, collection)?;
    }

    let mut inserter = BatchInserter::new(gateway, collection, options);
    let mut buf = Vec::new();
    let mut line_no = 0u64;
    let mut lines = 0u64;

    loop {
        if is_cancelled(options.cancellation.as_ref()) {
            inserter.flush()?;
            log::info!("Import into {collection} cancelled after {} documents", inserter.inserted);
            return Err(Error::Cancelled { processed: inserter.inserted });
        }

        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        line_no += 1;

        let line = match decode_line(&buf, options.encoding) {
            Ok(line) => line,
            Err(message) => {
                inserter.flush()?;
                return Err(Error::ParseLine { line: line_no, message });
            }
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        match parse_documents_from_json(trimmed) {
            Ok(docs) => inserter.push(docs)?,
            Err(message) => {
                inserter.flush()?;
                log::warn!("Import into {collection} stopped at line {line_no}: {message}");
                return Err(Error::ParseLine { line: line_no, message });
            }
        }
        lines += 1;
    }

    inserter.flush()?;
    Ok(ImportSummary { inserted: inserter.inserted, lines })
}

/// Import a file written by the exporter (plain or gzip-compressed).
pub fn import_collection_from_file(
    gateway: &dyn DocumentGateway,
    collection: &str,
    path: &Path,
    options: &JsonImportOptions,
) -> Result<ImportSummary> {
    log::info!(
        "Importing {} into {}.{collection} ({}, {})",
        path.display(),
        gateway.database(),
        options.format.label(),
        options.encoding.label()
    );

    let reader = open_input(path)?;
    let summary = match options.format {
        JsonTransferFormat::JsonLines => import_documents(gateway, collection, reader, options)?,
        JsonTransferFormat::JsonArray => import_array(gateway, collection, reader, options)?,
    };

    log::info!("Imported {} documents from {}", summary.inserted, path.display());
    Ok(summary)
}

/// Whole-file array import for pretty-printed exports that span many lines.
fn import_array<R: BufRead>(
    gateway: &dyn DocumentGateway,
    collection: &str,
    mut reader: R,
    options: &JsonImportOptions,
) -> Result<ImportSummary> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    let content = decode_line(&bytes, options.encoding).map_err(Error::Parse)?;
    let docs = parse_documents_from_json(&content).map_err(Error::Parse)?;

    if options.drop_first {
        drop_target(gateway, collection)?;
    }

    let mut inserter = BatchInserter::new(gateway, collection, options);
    for chunk in docs.chunks(inserter.batch_size) {
        if is_cancelled(options.cancellation.as_ref()) {
            return Err(Error::Cancelled { processed: inserter.inserted });
        }
        inserter.push(chunk.to_vec())?;
    }
    inserter.flush()?;

    Ok(ImportSummary { inserted: inserter.inserted, lines: 1 })
}

fn drop_target(gateway: &dyn DocumentGateway, collection: &str) -> Result<()> {
    log::info!("Dropping {}.{collection} before import", gateway.database());
    gateway.drop_collection(collection)
}

fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let mut reader = BufReader::new(File::open(path)?);
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(GzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

fn decode_line(bytes: &[u8], encoding: Encoding) -> std::result::Result<String, String> {
    match encoding {
        Encoding::Utf8 => {
            let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
            std::str::from_utf8(bytes).map(str::to_string).map_err(|e| format!("invalid UTF-8: {e}"))
        }
        Encoding::Latin1 => {
            let (decoded, _) = encoding_rs::WINDOWS_1252.decode_without_bom_handling(bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Accumulates parsed documents and writes them in `batch_size` chunks.
struct BatchInserter<'a> {
    gateway: &'a dyn DocumentGateway,
    collection: &'a str,
    batch: Vec<Document>,
    batch_size: usize,
    progress: Option<ProgressCallback>,
    inserted: u64,
}

impl<'a> BatchInserter<'a> {
    fn new(gateway: &'a dyn DocumentGateway, collection: &'a str, options: &JsonImportOptions) -> Self {
        let batch_size = options.batch_size.max(1);
        Self {
            gateway,
            collection,
            batch: Vec::with_capacity(batch_size),
            batch_size,
            progress: options.progress.clone(),
            inserted: 0,
        }
    }

    fn push(&mut self, docs: Vec<Document>) -> Result<()> {
        self.batch.extend(docs);
        if self.batch.len() >= self.batch_size {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        let batch = std::mem::take(&mut self.batch);
        self.inserted += self.gateway.insert_many(self.collection, batch)?;
        if let Some(progress) = &self.progress {
            progress(self.inserted);
        }
        Ok(())
    }
}
