//! Typed handles over a single named collection.
//!
//! A [`CollectionHandle`] binds a collection name and a document type to a shared
//! backend. It offers the shortcut operations that cover the common call patterns
//! (find one, upsert, find-and-update-or-insert, delete by field) and forwards the
//! rest of the backend's surface unchanged.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::{query::{Filter, Update}, registry::Registry};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub visits: i32,
//! }
//!
//! let users = registry.load::<User>("users")?;
//!
//! let user = users
//!     .find_one_and_upsert_returning(Filter::eq("name", "Alice"), Update::inc("visits", 1))
//!     .await?;
//! ```

use bson::{Bson, Document as BsonDocument};
use std::{any::type_name, fmt, marker::PhantomData, sync::Arc};
use tracing::debug;

use crate::{
    backend::StoreBackend,
    codec::CodecOptions,
    document::{Document, DocumentExt},
    error::{MongoLayerError, MongoLayerResult},
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, ReturnDocument, UpdateOptions, UpdateOutcome,
    },
    query::Filter,
};

/// A typed view of one collection.
///
/// Handles are immutable and cheap to clone; the backend is shared, not owned.
/// Every document and expression passes through the handle's [`CodecOptions`]
/// before it reaches the backend.
///
/// # Type Parameters
///
/// * `T` - The document type stored in the collection
/// * `B` - The storage backend type
pub struct CollectionHandle<T: Document, B: StoreBackend> {
    name: String,
    backend: Arc<B>,
    codec: CodecOptions,
    _marker: PhantomData<T>,
}

impl<T: Document, B: StoreBackend> CollectionHandle<T, B> {
    /// Creates a handle on the named collection.
    pub fn new(name: impl Into<String>, backend: Arc<B>, codec: CodecOptions) -> Self {
        Self {
            name: name.into(),
            backend,
            codec,
            _marker: PhantomData,
        }
    }

    /// Returns the name of this collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the document type.
    pub fn type_name(&self) -> &'static str {
        type_name::<T>()
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn codec(&self) -> &CodecOptions {
        &self.codec
    }

    /// Returns a handle on the same collection with a different document type.
    pub fn with_type<U: Document>(&self) -> CollectionHandle<U, B> {
        CollectionHandle {
            name: self.name.clone(),
            backend: Arc::clone(&self.backend),
            codec: self.codec,
            _marker: PhantomData,
        }
    }

    fn encode(&self, expr: BsonDocument) -> BsonDocument {
        self.codec.encode_document(expr)
    }

    fn decode_all(documents: Vec<BsonDocument>) -> MongoLayerResult<Vec<T>> {
        documents
            .into_iter()
            .map(T::from_bson_document)
            .collect()
    }

    fn decode_opt(document: Option<BsonDocument>) -> MongoLayerResult<Option<T>> {
        document
            .map(T::from_bson_document)
            .transpose()
    }

    /// Returns the first document matching `filter`, or `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails or the document cannot be decoded as `T`.
    pub async fn find_one(&self, filter: BsonDocument) -> MongoLayerResult<Option<T>> {
        debug!(collection = %self.name, "find_one");
        Self::decode_opt(
            self.backend
                .find_one(&self.name, self.encode(filter))
                .await?,
        )
    }

    /// Returns the first document whose `field` equals `value`.
    pub async fn find_one_by(&self, field: &str, value: impl Into<Bson>) -> MongoLayerResult<Option<T>> {
        self.find_one(Filter::eq(field, value)).await
    }

    /// Returns every document matching `filter`, fully materialized.
    pub async fn find_many(&self, filter: BsonDocument) -> MongoLayerResult<Vec<T>> {
        debug!(collection = %self.name, "find_many");
        self.find(filter, FindOptions::default()).await
    }

    /// Inserts `document` and returns the identifier the backend assigned to it.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::Insertion`] if the backend acknowledged the insert
    /// without reporting an identifier.
    pub async fn insert_one_and_return_id(&self, document: &T) -> MongoLayerResult<Bson> {
        match self.insert_one(document).await?.inserted_id {
            Some(id) if id != Bson::Null => Ok(id),
            _ => Err(MongoLayerError::Insertion(self.name.clone())),
        }
    }

    /// Updates the first document matching `filter`, inserting one when nothing matches.
    pub async fn upsert_one(&self, filter: BsonDocument, update: BsonDocument) -> MongoLayerResult<UpdateOutcome> {
        debug!(collection = %self.name, "upsert_one");
        self.update_one(filter, update, UpdateOptions::upsert())
            .await
    }

    /// Updates the first document matching `filter` and returns its new state.
    ///
    /// Returns `None` when nothing matched; no document is inserted.
    pub async fn find_one_and_update_returning(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> MongoLayerResult<Option<T>> {
        debug!(collection = %self.name, "find_one_and_update_returning");
        self.find_one_and_update(
            filter,
            update,
            FindOneAndUpdateOptions::new().return_document(ReturnDocument::After),
        )
        .await
    }

    /// Updates the first document matching `filter`, inserting it when absent, and
    /// returns its new state.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::Consistency`] if the backend returned no document,
    /// which an upsert with after-image semantics must never do.
    pub async fn find_one_and_upsert_returning(&self, filter: BsonDocument, update: BsonDocument) -> MongoLayerResult<T> {
        debug!(collection = %self.name, "find_one_and_upsert_returning");
        self.find_one_and_update(
            filter,
            update,
            FindOneAndUpdateOptions::new()
                .upsert(true)
                .return_document(ReturnDocument::After),
        )
        .await?
        .ok_or_else(|| MongoLayerError::Consistency(self.name.clone()))
    }

    /// Deletes the first document matching `filter`.
    pub async fn delete_one(&self, filter: BsonDocument) -> MongoLayerResult<DeleteOutcome> {
        debug!(collection = %self.name, "delete_one");
        self.backend
            .delete_one(&self.name, self.encode(filter))
            .await
    }

    /// Deletes the first document whose `field` equals `value`.
    pub async fn delete_one_by(&self, field: &str, value: impl Into<Bson>) -> MongoLayerResult<DeleteOutcome> {
        self.delete_one(Filter::eq(field, value)).await
    }

    pub async fn find(&self, filter: BsonDocument, options: FindOptions) -> MongoLayerResult<Vec<T>> {
        Self::decode_all(
            self.backend
                .find(&self.name, self.encode(filter), options)
                .await?,
        )
    }

    /// Returns the first document matching `filter`, honouring sort and projection.
    pub async fn find_one_with(&self, filter: BsonDocument, options: FindOptions) -> MongoLayerResult<Option<T>> {
        Ok(self
            .find(filter, options.limit(1))
            .await?
            .into_iter()
            .next())
    }

    pub async fn insert_one(&self, document: &T) -> MongoLayerResult<InsertOneOutcome> {
        self.backend
            .insert_one(&self.name, document.to_bson_document(&self.codec)?)
            .await
    }

    pub async fn insert_many(&self, documents: &[T]) -> MongoLayerResult<InsertManyOutcome> {
        let documents = documents
            .iter()
            .map(|document| document.to_bson_document(&self.codec))
            .collect::<MongoLayerResult<Vec<_>>>()?;

        self.backend
            .insert_many(&self.name, documents)
            .await
    }

    pub async fn update_one(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.backend
            .update_one(&self.name, self.encode(filter), self.encode(update), options)
            .await
    }

    pub async fn update_many(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.backend
            .update_many(&self.name, self.encode(filter), self.encode(update), options)
            .await
    }

    pub async fn replace_one(
        &self,
        filter: BsonDocument,
        replacement: &T,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.backend
            .replace_one(
                &self.name,
                self.encode(filter),
                replacement.to_bson_document(&self.codec)?,
                options,
            )
            .await
    }

    pub async fn find_one_and_update(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
        options: FindOneAndUpdateOptions,
    ) -> MongoLayerResult<Option<T>> {
        Self::decode_opt(
            self.backend
                .find_one_and_update(&self.name, self.encode(filter), self.encode(update), options)
                .await?,
        )
    }

    pub async fn find_one_and_delete(&self, filter: BsonDocument) -> MongoLayerResult<Option<T>> {
        Self::decode_opt(
            self.backend
                .find_one_and_delete(&self.name, self.encode(filter))
                .await?,
        )
    }

    pub async fn delete_many(&self, filter: BsonDocument) -> MongoLayerResult<DeleteOutcome> {
        self.backend
            .delete_many(&self.name, self.encode(filter))
            .await
    }

    pub async fn count_documents(&self, filter: BsonDocument) -> MongoLayerResult<u64> {
        self.backend
            .count_documents(&self.name, self.encode(filter))
            .await
    }

    pub async fn distinct(&self, field: &str, filter: BsonDocument) -> MongoLayerResult<Vec<Bson>> {
        self.backend
            .distinct(&self.name, field, self.encode(filter))
            .await
    }

    /// Runs an aggregation pipeline. Results are untyped since stages reshape documents.
    pub async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> MongoLayerResult<Vec<BsonDocument>> {
        let pipeline = pipeline
            .into_iter()
            .map(|stage| self.encode(stage))
            .collect();

        self.backend
            .aggregate(&self.name, pipeline)
            .await
    }

    pub async fn create_index(&self, keys: BsonDocument, options: IndexOptions) -> MongoLayerResult<String> {
        self.backend
            .create_index(&self.name, keys, options)
            .await
    }

    pub async fn drop_index(&self, name: &str) -> MongoLayerResult<()> {
        self.backend
            .drop_index(&self.name, name)
            .await
    }

    pub async fn list_index_names(&self) -> MongoLayerResult<Vec<String>> {
        self.backend
            .list_index_names(&self.name)
            .await
    }

    /// Drops the collection.
    pub async fn drop(&self) -> MongoLayerResult<()> {
        self.backend
            .drop_collection(&self.name)
            .await
    }
}

impl<T: Document, B: StoreBackend> Clone for CollectionHandle<T, B> {
    fn clone(&self) -> Self {
        self.with_type::<T>()
    }
}

impl<T: Document, B: StoreBackend> fmt::Debug for CollectionHandle<T, B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionHandle")
            .field("name", &self.name)
            .field("type", &self.type_name())
            .field("backend", &self.backend)
            .field("codec", &self.codec)
            .finish()
    }
}
