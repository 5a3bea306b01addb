//! [`StoreBackend`] implementation over one MongoDB database.

use async_trait::async_trait;
use futures::TryStreamExt;
use bson::{Bson, Document};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel,
    error::Error as DriverError,
    options::{
        FindOneAndUpdateOptions as DriverFindOneAndUpdateOptions, FindOptions as DriverFindOptions,
        IndexOptions as DriverIndexOptions, ReturnDocument as DriverReturnDocument,
    },
};

use mongolayer_core::{
    backend::StoreBackend,
    error::{MongoLayerError, MongoLayerResult},
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, ReturnDocument, UpdateOptions, UpdateOutcome,
    },
};

/// Driver errors are carried unchanged as the error source.
fn backend_error(err: DriverError) -> MongoLayerError {
    MongoLayerError::backend(err)
}

/// A database of a MongoDB deployment.
///
/// Cheap to clone: the driver's [`Client`] is itself a shared connection pool.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    /// Returns the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        self.client
            .database(&self.database)
            .collection(collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> MongoLayerResult<Vec<Document>> {
        let mut driver_options = DriverFindOptions::default();
        driver_options.sort = options.sort;
        driver_options.projection = options.projection;
        driver_options.skip = options.skip;
        driver_options.limit = options.limit;

        self.get_collection(collection)
            .find(filter)
            .with_options(driver_options)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn find_one(&self, collection: &str, filter: Document) -> MongoLayerResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(filter)
            .await
            .map_err(backend_error)
    }

    async fn insert_one(&self, collection: &str, document: Document) -> MongoLayerResult<InsertOneOutcome> {
        let result = self
            .get_collection(collection)
            .insert_one(document)
            .await
            .map_err(backend_error)?;

        Ok(InsertOneOutcome { inserted_id: Some(result.inserted_id) })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> MongoLayerResult<InsertManyOutcome> {
        if documents.is_empty() {
            return Ok(InsertManyOutcome::default());
        }

        let result = self
            .get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(backend_error)?;

        let mut inserted: Vec<(usize, Bson)> = result
            .inserted_ids
            .into_iter()
            .collect();
        inserted.sort_by_key(|(position, _)| *position);

        Ok(InsertManyOutcome {
            inserted_ids: inserted
                .into_iter()
                .map(|(_, id)| id)
                .collect(),
        })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_one(filter, update)
            .upsert(options.upsert)
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .update_many(filter, update)
            .upsert(options.upsert)
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        let result = self
            .get_collection(collection)
            .replace_one(filter, replacement)
            .upsert(options.upsert)
            .await
            .map_err(backend_error)?;

        Ok(UpdateOutcome {
            matched_count: result.matched_count,
            modified_count: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> MongoLayerResult<Option<Document>> {
        let mut driver_options = DriverFindOneAndUpdateOptions::default();
        driver_options.sort = options.sort;
        driver_options.projection = options.projection;
        driver_options.upsert = Some(options.upsert);
        driver_options.return_document = Some(match options.return_document {
            ReturnDocument::Before => DriverReturnDocument::Before,
            ReturnDocument::After => DriverReturnDocument::After,
        });

        self.get_collection(collection)
            .find_one_and_update(filter, update)
            .with_options(driver_options)
            .await
            .map_err(backend_error)
    }

    async fn find_one_and_delete(&self, collection: &str, filter: Document) -> MongoLayerResult<Option<Document>> {
        self.get_collection(collection)
            .find_one_and_delete(filter)
            .await
            .map_err(backend_error)
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome> {
        let result = self
            .get_collection(collection)
            .delete_one(filter)
            .await
            .map_err(backend_error)?;

        Ok(DeleteOutcome { deleted_count: result.deleted_count })
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome> {
        let result = self
            .get_collection(collection)
            .delete_many(filter)
            .await
            .map_err(backend_error)?;

        Ok(DeleteOutcome { deleted_count: result.deleted_count })
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> MongoLayerResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(backend_error)
    }

    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> MongoLayerResult<Vec<Bson>> {
        self.get_collection(collection)
            .distinct(field, filter)
            .await
            .map_err(backend_error)
    }

    async fn aggregate(&self, collection: &str, pipeline: Vec<Document>) -> MongoLayerResult<Vec<Document>> {
        self.get_collection(collection)
            .aggregate(pipeline)
            .await
            .map_err(backend_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(backend_error)
    }

    async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> MongoLayerResult<String> {
        let result = self
            .get_collection(collection)
            .create_index(
                IndexModel::builder()
                .keys(keys)
                .options(
                    DriverIndexOptions::builder()
                    .name(options.name)
                    .unique(options.unique)
                    .build()
                )
                .build()
            )
            .await
            .map_err(backend_error)?;

        Ok(result.index_name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> MongoLayerResult<()> {
        self.get_collection(collection)
            .drop_index(name)
            .await
            .map_err(backend_error)
    }

    async fn list_index_names(&self, collection: &str) -> MongoLayerResult<Vec<String>> {
        self.get_collection(collection)
            .list_index_names()
            .await
            .map_err(backend_error)
    }

    async fn drop_collection(&self, collection: &str) -> MongoLayerResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(backend_error)
    }

    async fn list_collections(&self) -> MongoLayerResult<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(backend_error)
    }

    async fn shutdown(&self) -> MongoLayerResult<()> {
        self.client
            .clone()
            .shutdown()
            .await;

        Ok(())
    }
}
