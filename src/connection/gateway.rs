//! The document store seam consumed by the result model and the transfer streamers.

use std::sync::Arc;

use mongodb::Client;
use mongodb::bson::{Bson, Document};

use crate::connection::ConnectionManager;
use crate::connection::types::{FindDocumentsOptions, QuerySpec};
use crate::error::{Error, Result};

/// Streaming read of every document matching a query.
pub type DocumentStream<'a> = Box<dyn Iterator<Item = Result<Document>> + Send + 'a>;

/// Database-scoped access to a document store.
///
/// Every call is blocking from the caller's point of view. Failures are
/// reported as gateway errors (`Error::is_gateway`) with the store's message
/// preserved.
pub trait DocumentGateway: Send + Sync {
    /// Name of the database this gateway is bound to.
    fn database(&self) -> &str;

    fn count(&self, collection: &str, filter: Option<&Document>) -> Result<u64>;

    fn find(&self, collection: &str, options: FindDocumentsOptions) -> Result<Vec<Document>>;

    /// Open a cursor over all matches, applying projection and sort.
    fn stream(&self, collection: &str, query: QuerySpec) -> Result<DocumentStream<'_>>;

    fn insert(&self, collection: &str, document: Document) -> Result<()>;

    /// Insert a batch, returning how many documents were written.
    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64>;

    /// Remove the stored document with the same `_id`.
    fn remove(&self, collection: &str, document: &Document) -> Result<()>;

    /// Replace the stored document with the same `_id`.
    fn replace(&self, collection: &str, document: Document) -> Result<()>;

    fn drop_collection(&self, collection: &str) -> Result<()>;

    fn rename_collection(&self, from: &str, to: &str) -> Result<()>;

    fn list_collection_names(&self) -> Result<Vec<String>>;

    fn list_database_names(&self) -> Result<Vec<String>>;
}

/// `_id` of a document that is about to be removed or replaced.
pub(crate) fn require_id(document: &Document) -> Result<&Bson> {
    document
        .get("_id")
        .ok_or_else(|| Error::InvalidArgument("document has no _id field".to_string()))
}

/// Gateway backed by a live MongoDB deployment.
#[derive(Clone)]
pub struct MongoGateway {
    manager: Arc<ConnectionManager>,
    client: Client,
    database: String,
}

impl MongoGateway {
    pub fn new(manager: Arc<ConnectionManager>, client: Client, database: impl Into<String>) -> Self {
        Self { manager, client, database: database.into() }
    }

    /// Same connection, different database.
    pub fn with_database(&self, database: impl Into<String>) -> Self {
        Self {
            manager: self.manager.clone(),
            client: self.client.clone(),
            database: database.into(),
        }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

impl DocumentGateway for MongoGateway {
    fn database(&self) -> &str {
        &self.database
    }

    fn count(&self, collection: &str, filter: Option<&Document>) -> Result<u64> {
        self.manager.count_documents(&self.client, &self.database, collection, filter)
    }

    fn find(&self, collection: &str, options: FindDocumentsOptions) -> Result<Vec<Document>> {
        self.manager.find_documents(&self.client, &self.database, collection, options)
    }

    fn stream(&self, collection: &str, query: QuerySpec) -> Result<DocumentStream<'_>> {
        let cursor =
            self.manager.stream_documents(&self.client, &self.database, collection, query)?;
        Ok(Box::new(cursor))
    }

    fn insert(&self, collection: &str, document: Document) -> Result<()> {
        self.manager.insert_document(&self.client, &self.database, collection, document)
    }

    fn insert_many(&self, collection: &str, documents: Vec<Document>) -> Result<u64> {
        self.manager.insert_documents(&self.client, &self.database, collection, documents)
    }

    fn remove(&self, collection: &str, document: &Document) -> Result<()> {
        let id = require_id(document)?;
        self.manager.delete_document(&self.client, &self.database, collection, id)
    }

    fn replace(&self, collection: &str, document: Document) -> Result<()> {
        let id = require_id(&document)?.clone();
        self.manager.replace_document(&self.client, &self.database, collection, &id, document)
    }

    fn drop_collection(&self, collection: &str) -> Result<()> {
        self.manager.drop_collection(&self.client, &self.database, collection)
    }

    fn rename_collection(&self, from: &str, to: &str) -> Result<()> {
        self.manager.rename_collection(&self.client, &self.database, from, to)
    }

    fn list_collection_names(&self) -> Result<Vec<String>> {
        self.manager.list_collections(&self.client, &self.database)
    }

    fn list_database_names(&self) -> Result<Vec<String>> {
        self.manager.list_databases(&self.client)
    }
}
