//! Registry of typed collection handles for one database.
//!
//! A [`Registry`] owns one canonical [`CollectionHandle`] per document type and
//! collection name. Handles are looked up by type with [`Registry::get`], which is
//! the preferred path, or by name with [`Registry::get_by_name`] when the type is
//! only known at runtime.
//!
//! The type-keyed and name-keyed views are written together from a single entry, so
//! a type always resolves to the same collection its name resolves to.
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::{registry::Registry, memory::InMemoryStore};
//!
//! let mut registry = Registry::new(InMemoryStore::new());
//! registry.load::<User>("users")?;
//! registry.load::<Order>("orders")?;
//!
//! let users = registry.get::<User>()?;
//! let orders = registry.get_by_name("orders")?.downcast::<Order>()?;
//! ```

use std::{
    any::{Any, TypeId, type_name},
    collections::HashMap,
    fmt,
    sync::Arc,
};
use tracing::{debug, warn};

use bson::Document as BsonDocument;

use crate::{
    backend::StoreBackend,
    codec::CodecOptions,
    collection::CollectionHandle,
    document::{Document, NamedDocument},
    error::{MongoLayerError, MongoLayerResult},
};

type ErasedHandle = Arc<dyn Any + Send + Sync>;

/// What [`Registry::load`] does when the type or the name is already registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicatePolicy {
    /// Remove every entry sharing the type or the name, then register the new one.
    #[default]
    Replace,
    /// Fail with [`MongoLayerError::DuplicateRegistration`].
    Reject,
}

#[derive(Debug)]
struct Entry {
    name: String,
    type_name: &'static str,
    handle: ErasedHandle,
}

/// Deferred registration of one document type, used by [`Registry::load_many`].
pub struct Registration<B: StoreBackend + 'static> {
    name: String,
    type_name: &'static str,
    register: fn(&mut Registry<B>, String) -> MongoLayerResult<()>,
}

impl<B: StoreBackend + 'static> Registration<B> {
    /// Registers documents of type `T` under `name`.
    pub fn of<T: Document>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name::<T>(),
            register: |registry, name| registry.load::<T>(name).map(|_| ()),
        }
    }

    /// Registers documents of type `T` under their declared collection name.
    pub fn named<T: NamedDocument>() -> Self {
        Self::of::<T>(T::collection_name())
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<B: StoreBackend + 'static> fmt::Debug for Registration<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Result of a lookup by name.
///
/// The document type is only known at runtime here; use [`downcast`](Self::downcast)
/// to recover the typed handle or [`untyped`](Self::untyped) to work with raw documents.
pub struct RegisteredCollection<B: StoreBackend + 'static> {
    name: String,
    type_name: &'static str,
    handle: ErasedHandle,
    backend: Arc<B>,
    codec: CodecOptions,
}

impl<B: StoreBackend + 'static> RegisteredCollection<B> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the registered document type.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Returns `true` if the collection is registered with document type `T`.
    pub fn is<T: Document>(&self) -> bool {
        self.handle.is::<CollectionHandle<T, B>>()
    }

    /// Returns the registered handle if it holds documents of type `T`.
    ///
    /// The returned `Arc` is the same instance [`Registry::get`] returns.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::NotRegistered`] if the collection was registered
    /// with a different document type.
    pub fn downcast<T: Document>(&self) -> MongoLayerResult<Arc<CollectionHandle<T, B>>> {
        Arc::clone(&self.handle)
            .downcast::<CollectionHandle<T, B>>()
            .map_err(|_| {
                MongoLayerError::NotRegistered(format!(
                    "collection {} with document type {} (registered as {})",
                    self.name,
                    type_name::<T>(),
                    self.type_name
                ))
            })
    }

    /// Returns an untyped handle on the same collection.
    pub fn untyped(&self) -> CollectionHandle<BsonDocument, B> {
        CollectionHandle::new(self.name.clone(), Arc::clone(&self.backend), self.codec)
    }
}

impl<B: StoreBackend + 'static> Clone for RegisteredCollection<B> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            type_name: self.type_name,
            handle: Arc::clone(&self.handle),
            backend: Arc::clone(&self.backend),
            codec: self.codec,
        }
    }
}

impl<B: StoreBackend + 'static> fmt::Debug for RegisteredCollection<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredCollection")
            .field("name", &self.name)
            .field("type", &self.type_name)
            .finish()
    }
}

/// Typed collection handles of one database, keyed by document type and by name.
///
/// The registry is populated through `&mut self` during startup and read through
/// `&self` afterwards; it can then be shared across tasks without locking.
#[derive(Debug)]
pub struct Registry<B: StoreBackend + 'static> {
    backend: Arc<B>,
    codec: CodecOptions,
    policy: DuplicatePolicy,
    by_type: HashMap<TypeId, Entry>,
    by_name: HashMap<String, TypeId>,
}

impl<B: StoreBackend + 'static> Registry<B> {
    /// Creates an empty registry over a backend.
    pub fn new(backend: B) -> Self {
        Self::from_shared(Arc::new(backend))
    }

    /// Creates an empty registry over a backend shared with other registries.
    pub fn from_shared(backend: Arc<B>) -> Self {
        Self {
            backend,
            codec: CodecOptions::default(),
            policy: DuplicatePolicy::default(),
            by_type: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Sets the codec options given to every handle loaded afterwards.
    pub fn with_codec(mut self, codec: CodecOptions) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn codec(&self) -> &CodecOptions {
        &self.codec
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Creates a handle on collection `name` for documents of type `T`, registers it
    /// under both keys and returns it.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::DuplicateRegistration`] if `T` or `name` is already
    /// registered and the policy is [`DuplicatePolicy::Reject`].
    pub fn load<T: Document>(&mut self, name: impl Into<String>) -> MongoLayerResult<Arc<CollectionHandle<T, B>>> {
        let name = name.into();
        let type_id = TypeId::of::<T>();
        let type_name = type_name::<T>();

        let type_taken = self.by_type.contains_key(&type_id);
        let name_taken = self.by_name.contains_key(&name);

        if type_taken || name_taken {
            match self.policy {
                DuplicatePolicy::Reject => {
                    return Err(MongoLayerError::DuplicateRegistration(if type_taken {
                        format!("document type {type_name}")
                    } else {
                        format!("collection {name}")
                    }));
                }
                DuplicatePolicy::Replace => {
                    warn!(collection = %name, document = type_name, "replacing existing registration");

                    if let Some(previous) = self.by_type.remove(&type_id) {
                        self.by_name.remove(&previous.name);
                    }
                    if let Some(previous) = self.by_name.remove(&name) {
                        self.by_type.remove(&previous);
                    }
                }
            }
        }

        let handle = Arc::new(CollectionHandle::<T, B>::new(
            name.clone(),
            Arc::clone(&self.backend),
            self.codec,
        ));

        self.by_name.insert(name.clone(), type_id);
        self.by_type.insert(
            type_id,
            Entry {
                name: name.clone(),
                type_name,
                handle: handle.clone() as ErasedHandle,
            },
        );

        debug!(collection = %name, document = type_name, "registered collection");

        Ok(handle)
    }

    /// Registers `T` under its declared collection name.
    pub fn load_named<T: NamedDocument>(&mut self) -> MongoLayerResult<Arc<CollectionHandle<T, B>>> {
        self.load::<T>(T::collection_name())
    }

    /// Applies every registration in order and returns the registry for chaining.
    ///
    /// The first failure aborts the remaining registrations and is returned; those
    /// already applied stay registered.
    pub fn load_many(&mut self, registrations: impl IntoIterator<Item = Registration<B>>) -> MongoLayerResult<&mut Self> {
        for Registration { name, register, .. } in registrations {
            register(self, name)?;
        }
        Ok(self)
    }

    /// Returns the handle registered for document type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::NotRegistered`] if `T` was never loaded.
    pub fn get<T: Document>(&self) -> MongoLayerResult<Arc<CollectionHandle<T, B>>> {
        self.by_type
            .get(&TypeId::of::<T>())
            .and_then(|entry| {
                Arc::clone(&entry.handle)
                    .downcast::<CollectionHandle<T, B>>()
                    .ok()
            })
            .ok_or_else(|| MongoLayerError::NotRegistered(format!("document type {}", type_name::<T>())))
    }

    /// Returns the collection registered under `name`.
    ///
    /// Prefer [`get`](Self::get) when the document type is known statically.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::NotRegistered`] if no collection has that name.
    pub fn get_by_name(&self, name: &str) -> MongoLayerResult<RegisteredCollection<B>> {
        self.by_name
            .get(name)
            .and_then(|type_id| self.by_type.get(type_id))
            .map(|entry| RegisteredCollection {
                name: entry.name.clone(),
                type_name: entry.type_name,
                handle: Arc::clone(&entry.handle),
                backend: Arc::clone(&self.backend),
                codec: self.codec,
            })
            .ok_or_else(|| MongoLayerError::NotRegistered(format!("collection {name}")))
    }

    pub fn contains<T: Document>(&self) -> bool {
        self.by_type.contains_key(&TypeId::of::<T>())
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Returns the registered collection names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.by_type.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_type.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::CannedBackend;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Serialize, Deserialize)]
    struct User {
        name: String,
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Order {
        total: i64,
    }

    impl NamedDocument for Order {
        fn collection_name() -> &'static str {
            "orders"
        }
    }

    fn registry() -> Registry<CannedBackend> {
        Registry::new(CannedBackend::default())
    }

    #[test]
    fn type_and_name_resolve_to_the_same_handle() {
        let mut registry = registry();
        let loaded = registry.load::<User>("users").unwrap();

        let by_type = registry.get::<User>().unwrap();
        let by_name = registry
            .get_by_name("users")
            .unwrap()
            .downcast::<User>()
            .unwrap();

        assert!(Arc::ptr_eq(&loaded, &by_type));
        assert!(Arc::ptr_eq(&by_type, &by_name));
        assert_eq!(by_type.name(), "users");
    }

    #[test]
    fn missing_entries_are_not_registered() {
        let registry = registry();

        assert!(matches!(registry.get::<User>(), Err(MongoLayerError::NotRegistered(_))));
        assert!(matches!(registry.get_by_name("users"), Err(MongoLayerError::NotRegistered(_))));
    }

    #[test]
    fn downcast_to_wrong_type_fails() {
        let mut registry = registry();
        registry.load::<User>("users").unwrap();

        let found = registry.get_by_name("users").unwrap();

        assert!(found.is::<User>());
        assert!(!found.is::<Order>());
        assert!(matches!(found.downcast::<Order>(), Err(MongoLayerError::NotRegistered(_))));
        assert!(found.type_name().ends_with("User"));
        assert_eq!(found.untyped().name(), "users");
    }

    #[test]
    fn replace_keeps_views_consistent() {
        let mut registry = registry();
        registry.load::<User>("users").unwrap();
        registry.load::<Order>("orders").unwrap();

        // Same type, new name: the old name disappears.
        registry.load::<User>("people").unwrap();
        assert!(!registry.contains_name("users"));
        assert_eq!(registry.get::<User>().unwrap().name(), "people");

        // Same name, new type: the old type disappears.
        registry.load::<Order>("people").unwrap();
        assert!(!registry.contains::<User>());
        assert!(registry.get_by_name("people").unwrap().is::<Order>());
        assert_eq!(registry.names(), vec!["people".to_string()]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn reject_policy_refuses_duplicates() {
        let mut registry = registry().with_policy(DuplicatePolicy::Reject);
        let first = registry.load::<User>("users").unwrap();

        assert!(matches!(
            registry.load::<User>("people"),
            Err(MongoLayerError::DuplicateRegistration(_))
        ));
        assert!(matches!(
            registry.load::<Order>("users"),
            Err(MongoLayerError::DuplicateRegistration(_))
        ));
        assert!(Arc::ptr_eq(&first, &registry.get::<User>().unwrap()));
    }

    #[test]
    fn load_many_stops_at_first_failure() {
        let mut registry = registry().with_policy(DuplicatePolicy::Reject);

        let result = registry.load_many([
            Registration::of::<User>("users"),
            Registration::of::<User>("again"),
            Registration::named::<Order>(),
        ]);

        assert!(matches!(result, Err(MongoLayerError::DuplicateRegistration(_))));
        assert!(registry.contains::<User>());
        assert!(!registry.contains::<Order>());
    }

    #[test]
    fn load_many_chains() {
        let mut registry = registry();

        let names = registry
            .load_many([Registration::of::<User>("users")])
            .unwrap()
            .load_many([Registration::named::<Order>()])
            .unwrap()
            .names();

        assert_eq!(names, vec!["orders".to_string(), "users".to_string()]);
    }

    #[test]
    fn named_documents_use_declared_collection() {
        let mut registry = registry();
        registry.load_named::<Order>().unwrap();

        assert_eq!(registry.names(), vec!["orders".to_string()]);
        assert!(!registry.is_empty());
    }
}
