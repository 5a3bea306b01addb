//! In-memory storage implementation.
//!
//! Documents are kept as BSON documents in insertion order, one vector per
//! collection, behind an async-aware read-write lock.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use bson::{Bson, Document, oid::ObjectId};
use tracing::debug;

use mongolayer_core::{
    backend::StoreBackend,
    error::{MongoLayerError, MongoLayerResult},
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, ReturnDocument, UpdateOptions, UpdateOutcome, default_index_name,
    },
};

use crate::{
    evaluator::{Comparable, DocumentEvaluator, SortOrder, project, sort_documents, values_equal},
    path::resolve,
    update::{apply_update, seed_from_filter, validate_replacement, validate_update},
};

const ID_INDEX: &str = "_id_";

fn duplicate_key(collection: &str, index: &str) -> MongoLayerError {
    MongoLayerError::backend(format!("duplicate key error in collection {collection} on index {index}"))
}

#[derive(Debug, Clone)]
struct IndexEntry {
    name: String,
    keys: Document,
    unique: bool,
}

#[derive(Debug, Default)]
struct CollectionData {
    documents: Vec<Document>,
    indexes: Vec<IndexEntry>,
}

impl CollectionData {
    fn positions(&self, filter: &Document) -> MongoLayerResult<Vec<usize>> {
        let mut positions = Vec::new();
        for (position, document) in self.documents.iter().enumerate() {
            if DocumentEvaluator::new(document).matches(filter)? {
                positions.push(position);
            }
        }
        Ok(positions)
    }

    /// Position of the first match, in `sort` order when given.
    fn first_position(&self, filter: &Document, sort: Option<&Document>) -> MongoLayerResult<Option<usize>> {
        let positions = self.positions(filter)?;

        let Some(sort) = sort else {
            return Ok(positions.first().copied());
        };

        let order = SortOrder::parse(sort)?;
        let mut positions = positions;
        positions.sort_by(|&a, &b| order.compare(&self.documents[a], &self.documents[b]));

        Ok(positions.first().copied())
    }

    /// Fails if `candidate` collides with another document on `_id` or a unique index.
    fn check_unique(&self, collection: &str, candidate: &Document, skip: Option<usize>) -> MongoLayerResult<()> {
        let others = self
            .documents
            .iter()
            .enumerate()
            .filter(|(position, _)| Some(*position) != skip)
            .map(|(_, document)| document);

        for other in others {
            if let (Some(a), Some(b)) = (candidate.get("_id"), other.get("_id")) {
                if values_equal(a, b) {
                    return Err(duplicate_key(collection, ID_INDEX));
                }
            }

            for index in self.indexes.iter().filter(|index| index.unique) {
                let same = index
                    .keys
                    .keys()
                    .all(|field| {
                        let left = resolve(candidate, field).map(Comparable::from).unwrap_or(Comparable::Null);
                        let right = resolve(other, field).map(Comparable::from).unwrap_or(Comparable::Null);
                        left == right
                    });

                if same {
                    return Err(duplicate_key(collection, &index.name));
                }
            }
        }

        Ok(())
    }

    /// Assigns an `_id` when missing, placing it first.
    fn with_id(document: Document) -> (Bson, Document) {
        if let Some(id) = document.get("_id") {
            return (id.clone(), document);
        }

        let id = Bson::ObjectId(ObjectId::new());
        let mut identified = Document::new();
        identified.insert("_id", id.clone());
        for (key, value) in document {
            identified.insert(key, value);
        }
        (id, identified)
    }

    fn insert(&mut self, collection: &str, document: Document) -> MongoLayerResult<Bson> {
        let (id, document) = Self::with_id(document);
        self.check_unique(collection, &document, None)?;
        self.documents.push(document);
        Ok(id)
    }

    /// Applies an update to the document at `position`; returns whether it changed.
    fn update_at(&mut self, collection: &str, position: usize, update: &Document) -> MongoLayerResult<bool> {
        let mut updated = self.documents[position].clone();
        apply_update(&mut updated, update, false)?;

        if updated == self.documents[position] {
            return Ok(false);
        }

        self.check_unique(collection, &updated, Some(position))?;
        self.documents[position] = updated;
        Ok(true)
    }

    fn upsert(&mut self, collection: &str, filter: &Document, update: &Document) -> MongoLayerResult<(Bson, usize)> {
        let mut seeded = seed_from_filter(filter)?;
        apply_update(&mut seeded, update, true)?;

        let id = self.insert(collection, seeded)?;
        Ok((id, self.documents.len() - 1))
    }
}

type StoreMap = HashMap<String, CollectionData>;

/// Thread-safe in-memory document storage backend.
///
/// Implements the full [`StoreBackend`] surface except aggregation, evaluating the
/// filter and update operator subset documented in [`crate::evaluator`] and
/// [`crate::update`]. `_id` values are generated as `ObjectId`s when absent, and
/// unique indexes are enforced.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state. Multiple
/// clones of the same instance share the same underlying data.
///
/// # Performance
///
/// Every operation scans the whole collection. Intended for tests and development.
///
/// # Example
///
/// ```ignore
/// use mongolayer_memory::InMemoryStore;
/// use mongolayer::backend::StoreBackend;
/// use bson::doc;
///
/// let store = InMemoryStore::new();
/// store.insert_one("users", doc! { "name": "Alice" }).await?;
/// assert_eq!(store.count_documents("users", doc! {}).await?, 1);
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> documents and indexes
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder for a store seeded with documents.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    async fn update_matching(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
        multi: bool,
    ) -> MongoLayerResult<UpdateOutcome> {
        validate_update(&update)?;

        let mut store = self.store.write().await;
        if !options.upsert && !store.contains_key(collection) {
            return Ok(UpdateOutcome::default());
        }
        let data = store
            .entry(collection.to_string())
            .or_default();

        let mut positions = data.positions(&filter)?;
        if !multi {
            positions.truncate(1);
        }

        if positions.is_empty() {
            if !options.upsert {
                return Ok(UpdateOutcome::default());
            }
            let (id, _) = data.upsert(collection, &filter, &update)?;
            return Ok(UpdateOutcome { upserted_id: Some(id), ..UpdateOutcome::default() });
        }

        let mut outcome = UpdateOutcome { matched_count: positions.len() as u64, ..UpdateOutcome::default() };
        for position in positions {
            if data.update_at(collection, position, &update)? {
                outcome.modified_count += 1;
            }
        }

        Ok(outcome)
    }

    async fn delete_matching(&self, collection: &str, filter: Document, multi: bool) -> MongoLayerResult<DeleteOutcome> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(DeleteOutcome::default());
        };

        let mut positions = data.positions(&filter)?;
        if !multi {
            positions.truncate(1);
        }

        for position in positions.iter().rev() {
            data.documents.remove(*position);
        }

        Ok(DeleteOutcome { deleted_count: positions.len() as u64 })
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find(&self, collection: &str, filter: Document, options: FindOptions) -> MongoLayerResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut documents = data
            .positions(&filter)?
            .into_iter()
            .map(|position| data.documents[position].clone())
            .collect::<Vec<_>>();

        if let Some(sort) = &options.sort {
            sort_documents(&mut documents, sort)?;
        }

        let skip = options.skip.unwrap_or(0) as usize;
        let limit = match options.limit {
            Some(limit) if limit != 0 => limit.unsigned_abs() as usize,
            _ => usize::MAX,
        };

        documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &options.projection {
                Some(projection) => project(&document, projection),
                None => Ok(document),
            })
            .collect()
    }

    async fn insert_one(&self, collection: &str, document: Document) -> MongoLayerResult<InsertOneOutcome> {
        let mut store = self.store.write().await;
        let id = store
            .entry(collection.to_string())
            .or_default()
            .insert(collection, document)?;

        Ok(InsertOneOutcome { inserted_id: Some(id) })
    }

    async fn insert_many(&self, collection: &str, documents: Vec<Document>) -> MongoLayerResult<InsertManyOutcome> {
        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        let mut inserted_ids = Vec::with_capacity(documents.len());
        for document in documents {
            inserted_ids.push(data.insert(collection, document)?);
        }

        Ok(InsertManyOutcome { inserted_ids })
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.update_matching(collection, filter, update, options, false)
            .await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        self.update_matching(collection, filter, update, options, true)
            .await
    }

    async fn replace_one(
        &self,
        collection: &str,
        filter: Document,
        replacement: Document,
        options: UpdateOptions,
    ) -> MongoLayerResult<UpdateOutcome> {
        validate_replacement(&replacement)?;

        let mut store = self.store.write().await;
        if !options.upsert && !store.contains_key(collection) {
            return Ok(UpdateOutcome::default());
        }
        let data = store
            .entry(collection.to_string())
            .or_default();

        let Some(position) = data.first_position(&filter, None)? else {
            if !options.upsert {
                return Ok(UpdateOutcome::default());
            }

            let mut seeded = Document::new();
            if let Some(id) = seed_from_filter(&filter)?.get("_id") {
                seeded.insert("_id", id.clone());
            }
            for (key, value) in replacement {
                seeded.insert(key, value);
            }

            let id = data.insert(collection, seeded)?;
            return Ok(UpdateOutcome { upserted_id: Some(id), ..UpdateOutcome::default() });
        };

        let current = &data.documents[position];
        let id = current.get("_id").cloned();
        if let (Some(existing), Some(requested)) = (&id, replacement.get("_id")) {
            if !values_equal(existing, requested) {
                return Err(MongoLayerError::InvalidExpression("the _id field cannot be replaced".into()));
            }
        }

        let mut replaced = Document::new();
        if let Some(id) = id {
            replaced.insert("_id", id);
        }
        for (key, value) in replacement {
            replaced.insert(key, value);
        }

        let modified = replaced != data.documents[position];
        if modified {
            data.check_unique(collection, &replaced, Some(position))?;
            data.documents[position] = replaced;
        }

        Ok(UpdateOutcome {
            matched_count: 1,
            modified_count: u64::from(modified),
            upserted_id: None,
        })
    }

    async fn find_one_and_update(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
        options: FindOneAndUpdateOptions,
    ) -> MongoLayerResult<Option<Document>> {
        validate_update(&update)?;

        let mut store = self.store.write().await;
        if !options.upsert && !store.contains_key(collection) {
            return Ok(None);
        }
        let data = store
            .entry(collection.to_string())
            .or_default();

        let returned = match data.first_position(&filter, options.sort.as_ref())? {
            Some(position) => {
                let before = data.documents[position].clone();
                data.update_at(collection, position, &update)?;
                match options.return_document {
                    ReturnDocument::Before => Some(before),
                    ReturnDocument::After => Some(data.documents[position].clone()),
                }
            }
            None if options.upsert => {
                let (_, position) = data.upsert(collection, &filter, &update)?;
                match options.return_document {
                    ReturnDocument::Before => None,
                    ReturnDocument::After => Some(data.documents[position].clone()),
                }
            }
            None => None,
        };

        match (returned, &options.projection) {
            (Some(document), Some(projection)) => Ok(Some(project(&document, projection)?)),
            (returned, _) => Ok(returned),
        }
    }

    async fn find_one_and_delete(&self, collection: &str, filter: Document) -> MongoLayerResult<Option<Document>> {
        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Ok(None);
        };

        Ok(data
            .first_position(&filter, None)?
            .map(|position| data.documents.remove(position)))
    }

    async fn delete_one(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome> {
        self.delete_matching(collection, filter, false)
            .await
    }

    async fn delete_many(&self, collection: &str, filter: Document) -> MongoLayerResult<DeleteOutcome> {
        self.delete_matching(collection, filter, true)
            .await
    }

    async fn count_documents(&self, collection: &str, filter: Document) -> MongoLayerResult<u64> {
        let store = self.store.read().await;
        match store.get(collection) {
            Some(data) => Ok(data.positions(&filter)?.len() as u64),
            None => Ok(0),
        }
    }

    async fn distinct(&self, collection: &str, field: &str, filter: Document) -> MongoLayerResult<Vec<Bson>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        let mut values: Vec<Bson> = Vec::new();
        for position in data.positions(&filter)? {
            let found = match resolve(&data.documents[position], field) {
                Some(Bson::Array(items)) => items.clone(),
                Some(value) => vec![value.clone()],
                None => continue,
            };

            for value in found {
                if !values.iter().any(|seen| values_equal(seen, &value)) {
                    values.push(value);
                }
            }
        }

        Ok(values)
    }

    async fn aggregate(&self, _collection: &str, _pipeline: Vec<Document>) -> MongoLayerResult<Vec<Document>> {
        Err(MongoLayerError::Unsupported("aggregate is not supported by the in-memory store".into()))
    }

    async fn create_index(&self, collection: &str, keys: Document, options: IndexOptions) -> MongoLayerResult<String> {
        if keys.is_empty() {
            return Err(MongoLayerError::InvalidExpression("index keys must not be empty".into()));
        }

        let name = options
            .name
            .clone()
            .unwrap_or_else(|| default_index_name(&keys));

        let mut store = self.store.write().await;
        let data = store
            .entry(collection.to_string())
            .or_default();

        if let Some(existing) = data.indexes.iter().find(|index| index.name == name) {
            if existing.keys == keys && existing.unique == options.unique {
                return Ok(name);
            }
            return Err(MongoLayerError::backend(format!(
                "index {name} already exists on {collection} with different options"
            )));
        }

        let index = IndexEntry { name: name.clone(), keys, unique: options.unique };
        if index.unique {
            let mut scratch = CollectionData { documents: Vec::new(), indexes: vec![index.clone()] };
            for document in &data.documents {
                scratch.check_unique(collection, document, None)?;
                scratch.documents.push(document.clone());
            }
        }

        debug!(collection, index = %name, unique = index.unique, "created index");
        data.indexes.push(index);

        Ok(name)
    }

    async fn drop_index(&self, collection: &str, name: &str) -> MongoLayerResult<()> {
        if name == ID_INDEX {
            return Err(MongoLayerError::InvalidExpression("cannot drop the _id index".into()));
        }

        let mut store = self.store.write().await;
        let Some(data) = store.get_mut(collection) else {
            return Err(MongoLayerError::backend(format!("namespace {collection} not found")));
        };

        let before = data.indexes.len();
        data.indexes.retain(|index| index.name != name);
        if data.indexes.len() == before {
            return Err(MongoLayerError::backend(format!("index {name} not found on {collection}")));
        }

        Ok(())
    }

    async fn list_index_names(&self, collection: &str) -> MongoLayerResult<Vec<String>> {
        let store = self.store.read().await;
        let Some(data) = store.get(collection) else {
            return Ok(vec![]);
        };

        Ok(std::iter::once(ID_INDEX.to_string())
            .chain(data.indexes.iter().map(|index| index.name.clone()))
            .collect())
    }

    async fn drop_collection(&self, collection: &str) -> MongoLayerResult<()> {
        if self.store.write().await.remove(collection).is_some() {
            debug!(collection, "dropped collection");
        }
        Ok(())
    }

    async fn list_collections(&self) -> MongoLayerResult<Vec<String>> {
        let mut names: Vec<String> = self
            .store
            .read()
            .await
            .keys()
            .cloned()
            .collect();
        names.sort();

        Ok(names)
    }
}

/// Builder for [`InMemoryStore`] instances pre-populated with documents.
///
/// # Example
///
/// ```ignore
/// use mongolayer_memory::InMemoryStore;
/// use bson::doc;
///
/// let store = InMemoryStore::builder()
///     .with_documents("users", [doc! { "name": "Alice" }, doc! { "name": "Bob" }])
///     .build()?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryStoreBuilder {
    seeds: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    /// Adds documents to a collection. `_id`s are generated when absent.
    pub fn with_documents(mut self, collection: impl Into<String>, documents: impl IntoIterator<Item = Document>) -> Self {
        self.seeds.push((collection.into(), documents.into_iter().collect()));
        self
    }

    /// Builds the store.
    ///
    /// # Errors
    ///
    /// Returns an error if two seeded documents share an `_id`.
    pub fn build(self) -> MongoLayerResult<InMemoryStore> {
        let mut store = StoreMap::new();
        for (collection, documents) in self.seeds {
            let data = store
                .entry(collection.clone())
                .or_default();
            for document in documents {
                data.insert(&collection, document)?;
            }
        }

        Ok(InMemoryStore { store: Arc::new(RwLock::new(store)) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn seeded() -> InMemoryStore {
        InMemoryStore::builder()
            .with_documents(
                "users",
                [
                    doc! { "_id": 1, "name": "Alice", "age": 30, "status": "active" },
                    doc! { "_id": 2, "name": "Bob", "age": 25, "status": "archived" },
                    doc! { "_id": 3, "name": "Carol", "age": 35, "status": "archived" },
                ],
            )
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn find_honours_sort_skip_limit_and_projection() {
        let store = seeded();

        let found = store
            .find(
                "users",
                doc! { "age": { "$gte": 25 } },
                FindOptions::new()
                    .sort(doc! { "age": -1 })
                    .skip(1)
                    .limit(1)
                    .projection(doc! { "name": 1, "_id": 0 }),
            )
            .await
            .unwrap();

        assert_eq!(found, vec![doc! { "name": "Alice" }]);
    }

    #[tokio::test]
    async fn missing_collection_reads_as_empty() {
        let store = InMemoryStore::new();

        assert!(store.find("nope", doc! {}, FindOptions::new()).await.unwrap().is_empty());
        assert_eq!(store.count_documents("nope", doc! {}).await.unwrap(), 0);
        assert_eq!(store.find_one("nope", doc! {}).await.unwrap(), None);
        assert!(store.list_collections().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn insert_generates_object_ids_and_rejects_duplicates() {
        let store = InMemoryStore::new();

        let outcome = store.insert_one("items", doc! { "name": "gear" }).await.unwrap();
        assert!(matches!(outcome.inserted_id, Some(Bson::ObjectId(_))));

        store.insert_one("items", doc! { "_id": 1 }).await.unwrap();
        let duplicate = store.insert_one("items", doc! { "_id": 1 }).await;
        assert!(matches!(duplicate, Err(MongoLayerError::Backend(_))));
    }

    #[tokio::test]
    async fn update_counts_matches_and_modifications() {
        let store = seeded();

        let outcome = store
            .update_many("users", doc! { "status": "archived" }, doc! { "$set": { "age": 35 } }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!((outcome.matched_count, outcome.modified_count), (2, 1));

        let outcome = store
            .update_one("users", doc! { "name": "Dave" }, doc! { "$set": { "age": 1 } }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn upsert_seeds_from_filter() {
        let store = InMemoryStore::new();

        let outcome = store
            .update_one("users", doc! { "name": "Dave" }, doc! { "$inc": { "visits": 1 } }, UpdateOptions::upsert())
            .await
            .unwrap();
        assert!(outcome.upserted());

        let dave = store.find_one("users", doc! { "name": "Dave" }).await.unwrap().unwrap();
        assert_eq!(dave.get_i32("visits").unwrap(), 1);
        assert_eq!(dave.get("_id"), outcome.upserted_id.as_ref());
    }

    #[tokio::test]
    async fn find_one_and_update_returns_requested_image() {
        let store = seeded();

        let before = store
            .find_one_and_update(
                "users",
                doc! { "status": "archived" },
                doc! { "$inc": { "age": 1 } },
                FindOneAndUpdateOptions::new().sort(doc! { "age": -1 }),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(before.get_str("name").unwrap(), "Carol");
        assert_eq!(before.get_i32("age").unwrap(), 35);

        let after = store
            .find_one_and_update(
                "users",
                doc! { "name": "Carol" },
                doc! { "$inc": { "age": 1 } },
                FindOneAndUpdateOptions::new().return_document(ReturnDocument::After),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(after.get_i32("age").unwrap(), 37);
    }

    #[tokio::test]
    async fn replace_keeps_identifier() {
        let store = seeded();

        let outcome = store
            .replace_one("users", doc! { "_id": 2 }, doc! { "name": "Robert" }, UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(outcome.modified_count, 1);

        let robert = store.find_one("users", doc! { "_id": 2 }).await.unwrap().unwrap();
        assert_eq!(robert, doc! { "_id": 2, "name": "Robert" });

        let invalid = store
            .replace_one("users", doc! { "_id": 2 }, doc! { "$set": { "a": 1 } }, UpdateOptions::default())
            .await;
        assert!(matches!(invalid, Err(MongoLayerError::InvalidExpression(_))));
    }

    #[tokio::test]
    async fn deletes_remove_in_filter_order() {
        let store = seeded();

        let removed = store.find_one_and_delete("users", doc! { "status": "archived" }).await.unwrap();
        assert_eq!(removed.unwrap().get_str("name").unwrap(), "Bob");

        assert_eq!(store.delete_many("users", doc! {}).await.unwrap().deleted_count, 2);
        assert!(!store.delete_one("users", doc! {}).await.unwrap().removed());
    }

    #[tokio::test]
    async fn distinct_flattens_arrays() {
        let store = InMemoryStore::builder()
            .with_documents("posts", [doc! { "tags": ["a", "b"] }, doc! { "tags": "b" }, doc! { "other": 1 }])
            .build()
            .unwrap();

        let tags = store.distinct("posts", "tags", doc! {}).await.unwrap();
        assert_eq!(tags, vec![Bson::String("a".into()), Bson::String("b".into())]);
    }

    #[tokio::test]
    async fn unique_indexes_are_enforced() {
        let store = seeded();

        let name = store
            .create_index("users", doc! { "name": 1 }, IndexOptions::default().unique(true))
            .await
            .unwrap();
        assert_eq!(name, "name_1");
        assert_eq!(store.list_index_names("users").await.unwrap(), vec!["_id_", "name_1"]);

        let duplicate = store.insert_one("users", doc! { "name": "Alice" }).await;
        assert!(matches!(duplicate, Err(MongoLayerError::Backend(_))));

        let conflicting = store
            .create_index("users", doc! { "status": 1 }, IndexOptions::named("status").unique(true))
            .await;
        assert!(conflicting.is_err());

        store.drop_index("users", "name_1").await.unwrap();
        assert!(store.drop_index("users", "name_1").await.is_err());
        assert!(store.drop_index("users", "_id_").await.is_err());
    }

    #[tokio::test]
    async fn inc_overflow_fails_without_changing_the_document() {
        let store = InMemoryStore::new();
        store.insert_one("counters", doc! { "_id": 1, "n": i64::MAX }).await.unwrap();

        let result = store
            .update_one("counters", doc! { "_id": 1 }, doc! { "$inc": { "n": 1_i64 } }, UpdateOptions::default())
            .await;

        assert!(matches!(result, Err(MongoLayerError::InvalidExpression(_))));
        assert_eq!(
            store.find_one("counters", doc! { "_id": 1 }).await.unwrap(),
            Some(doc! { "_id": 1, "n": i64::MAX })
        );
    }

    #[tokio::test]
    async fn aggregation_is_unsupported() {
        let store = InMemoryStore::new();

        let result = store.aggregate("users", vec![doc! { "$match": {} }]).await;
        assert!(matches!(result, Err(MongoLayerError::Unsupported(_))));
    }

    #[tokio::test]
    async fn clones_share_state() {
        let store = InMemoryStore::new();
        let clone = store.clone();

        store.insert_one("users", doc! { "name": "Alice" }).await.unwrap();
        clone.drop_collection("users").await.unwrap();

        assert!(store.list_collections().await.unwrap().is_empty());
    }
}
