//! Core ConnectionManager struct and basic connection methods.

use std::time::Duration;

use mongodb::Client;
use mongodb::bson::doc;
use tokio::runtime::Runtime;

use crate::error::{Error, Result};

/// Owns the Tokio runtime that drives every blocking MongoDB call.
pub struct ConnectionManager {
    pub(crate) runtime: Runtime,
}

impl ConnectionManager {
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("mangoview-mongo")
            .build()?;
        Ok(Self { runtime })
    }

    /// Get a handle to the Tokio runtime for spawning background work
    pub fn runtime_handle(&self) -> tokio::runtime::Handle {
        self.runtime.handle().clone()
    }

    /// Connect and ping, giving up after `timeout` (runs in Tokio runtime)
    pub fn connect(&self, uri: &str, timeout: Duration) -> Result<Client> {
        let uri = uri.to_string();
        self.runtime.block_on(async {
            let fut = async {
                let client = Client::with_uri_str(&uri).await?;
                client.database("admin").run_command(doc! { "ping": 1 }).await?;
                Ok::<Client, mongodb::error::Error>(client)
            };

            match tokio::time::timeout(timeout, fut).await {
                Ok(result) => {
                    let client = result?;
                    log::debug!("Connected to {}", redact_uri(&uri));
                    Ok(client)
                }
                Err(_) => Err(Error::Timeout(format!(
                    "Connection to {} timed out after {}s",
                    redact_uri(&uri),
                    timeout.as_secs()
                ))),
            }
        })
    }

    /// Ping an already connected client (runs in Tokio runtime)
    pub fn test_connection(&self, client: &Client, timeout: Duration) -> Result<()> {
        self.runtime.block_on(async {
            let admin = client.database("admin");
            let ping = admin.run_command(doc! { "ping": 1 });
            match tokio::time::timeout(timeout, ping).await {
                Ok(result) => {
                    result?;
                    Ok(())
                }
                Err(_) => Err(Error::Timeout(format!(
                    "Ping timed out after {}s",
                    timeout.as_secs()
                ))),
            }
        })
    }

    /// List databases for a connected client (runs in Tokio runtime)
    pub fn list_databases(&self, client: &Client) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut databases = client.list_database_names().await?;
            databases.sort_unstable_by_key(|name| name.to_lowercase());
            Ok(databases)
        })
    }

    /// List collections in a database (runs in Tokio runtime)
    pub fn list_collections(&self, client: &Client, database: &str) -> Result<Vec<String>> {
        self.runtime.block_on(async {
            let mut collections = client.database(database).list_collection_names().await?;
            collections.sort_unstable_by_key(|name| name.to_lowercase());
            Ok(collections)
        })
    }

    /// Drop a collection in a database (runs in Tokio runtime)
    pub fn drop_collection(&self, client: &Client, database: &str, collection: &str) -> Result<()> {
        self.runtime.block_on(async {
            let coll = client.database(database).collection::<mongodb::bson::Document>(collection);
            coll.drop().await?;
            Ok(())
        })
    }

    /// Rename a collection within its database (runs in Tokio runtime)
    pub fn rename_collection(
        &self,
        client: &Client,
        database: &str,
        from: &str,
        to: &str,
    ) -> Result<()> {
        let from = format!("{database}.{from}");
        let to = format!("{database}.{to}");
        self.runtime.block_on(async {
            client
                .database("admin")
                .run_command(doc! { "renameCollection": from, "to": to, "dropTarget": false })
                .await?;
            Ok(())
        })
    }
}

/// Strip credentials from a connection string before it reaches the logs.
pub fn redact_uri(uri: &str) -> String {
    let Some((scheme, rest)) = uri.split_once("://") else {
        return uri.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => uri.to_string(),
    }
}
