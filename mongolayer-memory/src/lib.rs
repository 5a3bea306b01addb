//! In-memory storage backend for mongolayer.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests that should not depend on a running database server.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Filter evaluation** - Equality, comparison, set, existence, regular expression and logical operators
//! - **Update operators** - `$set`, `$unset`, `$inc`, `$setOnInsert`, `$push`, `$addToSet`, `$pull`, `$rename`
//! - **Upserts** - New documents are seeded from the filter's equality conditions
//! - **Unique indexes** - Enforced on insert, update and replace
//!
//! # Quick Start
//!
//! ```ignore
//! use mongolayer::{memory::InMemoryStore, registry::Registry, query::Update};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub visits: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut registry = Registry::new(InMemoryStore::new());
//!     let users = registry.load::<User>("users")?;
//!
//!     let alice = users
//!         .find_one_and_upsert_returning(doc! { "name": "Alice" }, Update::inc("visits", 1))
//!         .await?;
//!     assert_eq!(alice.visits, 1);
//!
//!     Ok(())
//! }
//! ```

pub mod store;
mod evaluator;
mod path;
mod update;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
