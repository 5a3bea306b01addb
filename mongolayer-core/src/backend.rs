//! Storage backend abstraction.
//!
//! [`StoreBackend`] is the seam between collection handles and an actual database.
//! It works on raw BSON documents addressed by collection name; typing, codec
//! handling and the shortcut operations all live in
//! [`CollectionHandle`](crate::collection::CollectionHandle).
//!
//! Two implementations ship with the workspace:
//!
//! - `mongolayer_mongodb::MongoDbStore`, backed by the MongoDB driver;
//! - `mongolayer_memory::InMemoryStore`, an in-process store for tests and development.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::backend::StoreBackend;
//! use bson::doc;
//!
//! let outcome = backend.insert_one("users", doc! { "name": "Alice" }).await?;
//! let found = backend.find_one("users", doc! { "name": "Alice" }).await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::fmt::Debug;

use crate::{
    error::MongoLayerResult,
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, UpdateOptions, UpdateOutcome,
    },
};

/// Abstract interface for document storage backends.
///
/// Every operation addresses a collection by name and takes expressions as
/// `bson::Document`s in the driver's query syntax.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; a single backend is shared by every
/// handle of a registry.
///
/// # Error Handling
///
/// Errors raised by the underlying database are returned as
/// [`MongoLayerError::Backend`](crate::error::MongoLayerError::Backend) with the
/// original error as source. Operations a backend cannot perform return
/// [`MongoLayerError::Unsupported`](crate::error::MongoLayerError::Unsupported).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns every document matching `filter`, honouring sort, projection, skip and limit.
    async fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> MongoLayerResult<Vec<Document>>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, collection: &str, filter: Document) -> MongoLayerResult<Option<Document>> {
        Ok(self
            .find(collection, filter, FindOptions::new().limit(1))
            .await?
            .into_iter()
            .next())
    }

    /// Inserts one document. The collection is created on first use.
    async fn insert_one(&self, collection: &str, document: Document) -> MongoLayerResult<InsertOneOutcome>;

    /// Inserts documents in order.
    async fn insert_many(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> MongoLayerResult<InsertManyOutcome>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome>;

    /// Replaces the first document matching `filter`, keeping its `_id`.
    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome>;

    /// Atomically updates the first matching document and returns it.
    ///
    /// Which version is returned, and whether a missing document is inserted, is
    /// controlled by `options`.
    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> MongoLayerResult<Option<Document>>;

    /// Atomically removes the first matching document and returns it.
    async fn find_one_and_delete(&self, collection: &str, filter: Document) -> MongoLayerResult<Option<Document>>;

    async fn delete_one(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome>;

    async fn delete_many(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome>;

    async fn count_documents(&self, collection: &str, filter: Document) -> MongoLayerResult<u64>;

    /// Returns the distinct values of `field` among documents matching `filter`.
    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> MongoLayerResult<Vec<Bson>>;

    /// Runs an aggregation pipeline.
    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> MongoLayerResult<Vec<Document>>;

    /// Creates an index and returns its name.
    async fn create_index(
        &self,
        collection: &str,
        keys: Document,
        options: IndexOptions,
    ) -> MongoLayerResult<String>;

    async fn drop_index(&self, collection: &str, name: &str) -> MongoLayerResult<()>;

    async fn list_index_names(&self, collection: &str) -> MongoLayerResult<Vec<String>>;

    /// Drops a collection with all its documents and indexes.
    ///
    /// # Warning
    ///
    /// This operation is irreversible.
    async fn drop_collection(&self, collection: &str) -> MongoLayerResult<()>;

    async fn list_collections(&self) -> MongoLayerResult<Vec<String>>;

    /// Releases resources held by the backend. The default implementation does nothing.
    async fn shutdown(&self) -> MongoLayerResult<()> {
        Ok(())
    }
}
