//! Document reads and writes for MongoDB collections.

use futures::TryStreamExt;
use mongodb::bson::{Bson, Document, doc};
use mongodb::{Client, Cursor};
use tokio::runtime::Runtime;

use crate::connection::ConnectionManager;
use crate::connection::types::{FindDocumentsOptions, QuerySpec};
use crate::error::{Error, Result};

/// Blocking iterator over a driver cursor, pulling one document per `next()`.
pub struct DocumentCursor<'a> {
    runtime: &'a Runtime,
    cursor: Cursor<Document>,
}

impl Iterator for DocumentCursor<'_> {
    type Item = Result<Document>;

    fn next(&mut self) -> Option<Self::Item> {
        self.runtime.block_on(self.cursor.try_next()).map_err(Error::from).transpose()
    }
}

impl ConnectionManager {
    /// Count documents matching `filter` (runs in Tokio runtime)
    pub fn count_documents(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        filter: Option<&Document>,
    ) -> Result<u64> {
        let filter = filter.cloned().unwrap_or_default();
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);
            Ok(coll.count_documents(filter).await?)
        })
    }

    /// Fetch one page of documents (runs in Tokio runtime)
    pub fn find_documents(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        opts: FindDocumentsOptions,
    ) -> Result<Vec<Document>> {
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);

            let mut options = mongodb::options::FindOptions::default();
            options.skip = (opts.skip > 0).then_some(opts.skip);
            options.limit = opts.limit;
            options.sort = opts.sort;
            options.projection = opts.projection;

            let cursor = coll.find(opts.filter.unwrap_or_default()).with_options(options).await?;
            let documents: Vec<Document> = cursor.try_collect().await?;
            Ok(documents)
        })
    }

    /// Open a cursor over every match of `query` for streaming consumers.
    pub fn stream_documents(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        query: QuerySpec,
    ) -> Result<DocumentCursor<'_>> {
        let cursor = self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);

            let mut options = mongodb::options::FindOptions::default();
            options.projection = query.projection;
            options.sort = query.sort;

            coll.find(query.filter.unwrap_or_default()).with_options(options).await
        })?;
        Ok(DocumentCursor { runtime: &self.runtime, cursor })
    }

    /// Insert a document into a collection (runs in Tokio runtime)
    pub fn insert_document(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        document: Document,
    ) -> Result<()> {
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);
            coll.insert_one(document).await?;
            Ok(())
        })
    }

    /// Insert multiple documents into a collection (runs in Tokio runtime)
    pub fn insert_documents(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<u64> {
        if documents.is_empty() {
            return Ok(0);
        }

        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);
            let result = coll.insert_many(documents).await?;
            Ok(result.inserted_ids.len() as u64)
        })
    }

    /// Replace a document by _id in a collection (runs in Tokio runtime)
    pub fn replace_document(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        id: &Bson,
        replacement: Document,
    ) -> Result<()> {
        let id = id.clone();
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);
            coll.replace_one(doc! { "_id": id }, replacement).await?;
            Ok(())
        })
    }

    /// Delete a document by _id in a collection (runs in Tokio runtime)
    pub fn delete_document(
        &self,
        client: &Client,
        database: &str,
        collection: &str,
        id: &Bson,
    ) -> Result<()> {
        let id = id.clone();
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<Document>(collection);
            coll.delete_one(doc! { "_id": id }).await?;
            Ok(())
        })
    }
}
