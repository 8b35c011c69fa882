//! Document store access.
//!
//! - `gateway`: the `DocumentGateway` seam plus the MongoDB-backed implementation
//! - `manager`: `ConnectionManager`, which owns the runtime behind blocking driver calls
//! - `memory`: an in-process gateway for offline use and tests
//! - `ops`: document operations and the JSON export/import streamers
//! - `types`: options and shared types for all operations

pub mod gateway;
pub mod manager;
pub mod memory;
pub mod ops;
pub mod types;

pub use gateway::{DocumentGateway, DocumentStream, MongoGateway};
pub use manager::ConnectionManager;
pub use memory::MemoryGateway;
pub use ops::export::{export_collection_to_file, export_documents, generate_export_preview};
pub use ops::import::{import_collection_from_file, import_documents};
pub use types::{
    CancellationToken, Encoding, ExtendedJsonMode, FindDocumentsOptions, ImportSummary,
    JsonExportOptions, JsonImportOptions, JsonTransferFormat, ProgressCallback, QuerySpec,
};
