//! Collection export to JSON Lines or a JSON array.
//!
//! Documents are pulled from a gateway cursor one at a time and flushed to the
//! sink after each one, so memory use does not grow with the collection size.
//! File exports follow a backup/write/restore protocol: an existing destination
//! is moved aside first and put back if the export is cancelled or fails.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::write::GzEncoder;
use mongodb::bson::Document;

use crate::bson::document_to_json_string;
use crate::connection::gateway::DocumentGateway;
use crate::connection::types::{
    Encoding, ExtendedJsonMode, FindDocumentsOptions, JsonExportOptions, JsonTransferFormat,
    QuerySpec, is_cancelled,
};
use crate::error::{Error, Result};

const PROGRESS_INTERVAL: u64 = 1000;

/// Stream every document matching `query` into `sink`, returning the count written.
///
/// Cancellation is checked before each document and reported as
/// `Error::Cancelled`; whatever was already written stays in the sink.
pub fn export_documents<W: Write>(
    gateway: &dyn DocumentGateway,
    collection: &str,
    query: QuerySpec,
    sink: W,
    options: &JsonExportOptions,
) -> Result<u64> {
    let cursor = gateway.stream(collection, query)?;
    let mut writer = JsonDocumentWriter::new(sink, options);
    let mut count = 0u64;

    writer.begin()?;
    for doc in cursor {
        if is_cancelled(options.cancellation.as_ref()) {
            log::info!("Export of {collection} cancelled after {count} documents");
            return Err(Error::Cancelled { processed: count });
        }

        writer.write_document(&doc?)?;
        count += 1;

        if let Some(progress) = &options.progress
            && count.is_multiple_of(PROGRESS_INTERVAL)
        {
            progress(count);
        }
    }
    writer.finish()?;

    if let Some(progress) = &options.progress {
        progress(count);
    }
    Ok(count)
}

/// Export a collection to `path`, restoring any previous file on failure or cancellation.
pub fn export_collection_to_file(
    gateway: &dyn DocumentGateway,
    collection: &str,
    query: QuerySpec,
    path: &Path,
    options: &JsonExportOptions,
) -> Result<u64> {
    log::info!(
        "Exporting {}.{collection} to {} ({})",
        gateway.database(),
        path.display(),
        options.format.label()
    );

    if path.is_dir() {
        return Err(Error::InvalidArgument(format!(
            "Export destination {} is a directory",
            path.display()
        )));
    }

    let backup = ExportBackup::take(path)?;
    let result = write_export_file(gateway, collection, query, path, options);

    match result {
        Ok(count) => {
            backup.discard()?;
            log::info!("Exported {count} documents to {}", path.display());
            Ok(count)
        }
        Err(err) => {
            if let Err(restore_err) = backup.restore() {
                log::error!("Failed to restore {}: {restore_err}", path.display());
            }
            Err(err)
        }
    }
}

fn write_export_file(
    gateway: &dyn DocumentGateway,
    collection: &str,
    query: QuerySpec,
    path: &Path,
    options: &JsonExportOptions,
) -> Result<u64> {
    let file = File::create(path)?;

    if options.gzip {
        let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
        let count = export_documents(gateway, collection, query, &mut encoder, options)?;
        encoder.finish()?.flush()?;
        Ok(count)
    } else {
        let mut writer = BufWriter::new(file);
        let count = export_documents(gateway, collection, query, &mut writer, options)?;
        writer.flush()?;
        Ok(count)
    }
}

/// Render the first `limit` documents of a query the way an export would.
pub fn generate_export_preview(
    gateway: &dyn DocumentGateway,
    collection: &str,
    query: QuerySpec,
    json_mode: ExtendedJsonMode,
    pretty_print: bool,
    limit: usize,
) -> Result<Vec<String>> {
    let documents = gateway.find(
        collection,
        FindDocumentsOptions {
            filter: query.filter,
            sort: query.sort,
            projection: query.projection,
            skip: 0,
            limit: Some(limit as i64),
        },
    )?;

    documents
        .iter()
        .map(|doc| document_to_json_string(doc, json_mode, pretty_print).map_err(Error::from))
        .collect()
}

/// Writes documents as JSON text in the configured layout and encoding.
struct JsonDocumentWriter<W: Write> {
    sink: W,
    format: JsonTransferFormat,
    json_mode: ExtendedJsonMode,
    pretty_print: bool,
    encoding: Encoding,
    written: u64,
}

impl<W: Write> JsonDocumentWriter<W> {
    fn new(sink: W, options: &JsonExportOptions) -> Self {
        Self {
            sink,
            format: options.format,
            json_mode: options.json_mode,
            pretty_print: options.pretty_print && options.format == JsonTransferFormat::JsonArray,
            encoding: options.encoding,
            written: 0,
        }
    }

    fn begin(&mut self) -> Result<()> {
        if self.format == JsonTransferFormat::JsonArray {
            self.emit(if self.pretty_print { "[\n" } else { "[" })?;
        }
        Ok(())
    }

    fn write_document(&mut self, doc: &Document) -> Result<()> {
        let json = document_to_json_string(doc, self.json_mode, self.pretty_print)?;

        match self.format {
            JsonTransferFormat::JsonLines => {
                self.emit(&json)?;
                self.emit("\n")?;
            }
            JsonTransferFormat::JsonArray => {
                if self.written > 0 {
                    self.emit(if self.pretty_print { ",\n" } else { "," })?;
                }
                self.emit(&json)?;
            }
        }

        self.written += 1;
        self.sink.flush()?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.format == JsonTransferFormat::JsonArray {
            if self.pretty_print && self.written > 0 {
                self.emit("\n")?;
            }
            self.emit("]\n")?;
        }
        self.sink.flush()?;
        Ok(())
    }

    fn emit(&mut self, text: &str) -> Result<()> {
        match self.encoding {
            Encoding::Utf8 => self.sink.write_all(text.as_bytes())?,
            Encoding::Latin1 => {
                let (bytes, _, unmappable) = encoding_rs::WINDOWS_1252.encode(text);
                if unmappable {
                    return Err(unmappable_error(text));
                }
                self.sink.write_all(&bytes)?;
            }
        }
        Ok(())
    }
}

fn unmappable_error(text: &str) -> Error {
    let mut buf = [0u8; 4];
    let offending = text
        .chars()
        .find(|c| encoding_rs::WINDOWS_1252.encode(c.encode_utf8(&mut buf)).2)
        .map(|c| format!("{c:?} (U+{:04X})", c as u32))
        .unwrap_or_default();
    Error::InvalidArgument(format!("Character {offending} cannot be written as Latin-1"))
}

/// A destination file moved aside while an export overwrites it.
struct ExportBackup {
    destination: PathBuf,
    backup: Option<PathBuf>,
}

impl ExportBackup {
    fn take(destination: &Path) -> Result<Self> {
        let backup = if destination.exists() {
            let backup = backup_path(destination);
            fs::rename(destination, &backup)?;
            log::debug!("Moved {} aside to {}", destination.display(), backup.display());
            Some(backup)
        } else {
            None
        };
        Ok(Self { destination: destination.to_path_buf(), backup })
    }

    fn discard(self) -> Result<()> {
        if let Some(backup) = &self.backup {
            fs::remove_file(backup)?;
        }
        Ok(())
    }

    fn restore(self) -> Result<()> {
        if self.destination.exists() {
            fs::remove_file(&self.destination)?;
        }
        if let Some(backup) = &self.backup {
            fs::rename(backup, &self.destination)?;
            log::info!("Restored previous {}", self.destination.display());
        }
        Ok(())
    }
}

fn backup_path(destination: &Path) -> PathBuf {
    let name = destination.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let suffix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    destination.with_file_name(format!(".{name}.{suffix}.bak"))
}
