use async_trait::async_trait;
use bson::{Bson, Document as BsonDocument, oid::ObjectId};
use std::sync::Mutex;

use crate::{
    backend::StoreBackend,
    error::{MongoLayerError, MongoLayerResult},
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, ReturnDocument, UpdateOptions, UpdateOutcome,
    },
};

/// Backend returning canned answers and recording what it was sent.
#[derive(Debug, Default)]
pub(crate) struct CannedBackend {
    pub inserted_id: Option<Bson>,
    pub returned: Option<BsonDocument>,
    pub seen: Mutex<Vec<(String, BsonDocument)>>,
}

impl CannedBackend {
    fn record(&self, op: &str, document: &BsonDocument) {
        self.seen
            .lock()
            .unwrap()
            .push((op.to_string(), document.clone()));
    }
}

#[async_trait]
impl StoreBackend for CannedBackend {
    async fn find(&self, _: &str, filter: BsonDocument, _: FindOptions) -> MongoLayerResult<Vec<BsonDocument>> {
        self.record("find", &filter);
        Ok(self.returned.clone().into_iter().collect())
    }

    async fn insert_one(&self, _: &str, document: BsonDocument) -> MongoLayerResult<InsertOneOutcome> {
        self.record("insert_one", &document);
        Ok(InsertOneOutcome { inserted_id: self.inserted_id.clone() })
    }

    async fn insert_many(&self, _: &str, _: Vec<BsonDocument>) -> MongoLayerResult<InsertManyOutcome> {
        Ok(InsertManyOutcome::default())
    }

    async fn update_one(
        &self,
        _: &str,
        filter: BsonDocument,
        _: BsonDocument,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.record("update_one", &filter);
        Ok(UpdateOutcome {
            upserted_id: options.upsert.then(|| Bson::ObjectId(ObjectId::new())),
            ..UpdateOutcome::default()
        })
    }

    async fn update_many(
        &self,
        _: &str,
        _: BsonDocument,
        _: BsonDocument,
        _: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        Ok(UpdateOutcome::default())
    }

    async fn replace_one(
        &self,
        _: &str,
        _: BsonDocument,
        _: BsonDocument,
        _: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        Ok(UpdateOutcome::default())
    }

    async fn find_one_and_update(
        &self,
        _: &str,
        filter: BsonDocument,
        _: BsonDocument,
        options: FindOneAndUpdateOptions,
    ) -> MongoLayerResult<Option<BsonDocument>> {
        self.record("find_one_and_update", &filter);
        assert_eq!(options.return_document, ReturnDocument::After);
        Ok(self.returned.clone())
    }

    async fn find_one_and_delete(&self, _: &str, _: BsonDocument) -> MongoLayerResult<Option<BsonDocument>> {
        Ok(None)
    }

    async fn delete_one(&self, _: &str, filter: BsonDocument) -> MongoLayerResult<DeleteOutcome> {
        self.record("delete_one", &filter);
        Ok(DeleteOutcome { deleted_count: 1 })
    }

    async fn delete_many(&self, _: &str, _: BsonDocument) -> MongoLayerResult<DeleteOutcome> {
        Ok(DeleteOutcome::default())
    }

    async fn count_documents(&self, _: &str, _: BsonDocument) -> MongoLayerResult<u64> {
        Ok(0)
    }

    async fn distinct(&self, _: &str, _: &str, _: BsonDocument) -> MongoLayerResult<Vec<Bson>> {
        Ok(Vec::new())
    }

    async fn aggregate(&self, _: &str, _: Vec<BsonDocument>) -> MongoLayerResult<Vec<BsonDocument>> {
        Err(MongoLayerError::Unsupported("aggregate".into()))
    }

    async fn create_index(&self, _: &str, _: BsonDocument, _: IndexOptions) -> MongoLayerResult<String> {
        Ok("index".into())
    }

    async fn drop_index(&self, _: &str, _: &str) -> MongoLayerResult<()> {
        Ok(())
    }

    async fn list_index_names(&self, _: &str) -> MongoLayerResult<Vec<String>> {
        Ok(Vec::new())
    }

    async fn drop_collection(&self, _: &str) -> MongoLayerResult<()> {
        Ok(())
    }

    async fn list_collections(&self) -> MongoLayerResult<Vec<String>> {
        Ok(Vec::new())
    }
}
