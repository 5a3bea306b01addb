//! Typed collection registry and composable clause builders for MongoDB.
//!
//! This crate is the entry point of the mongolayer project. It re-exports the core
//! types and the available storage backends.
//!
//! - **Clause builders** - accumulate filter, sort, projection, index and update
//!   expressions one piece at a time, then `build()` the final document
//! - **Registry** - load one typed [`CollectionHandle`](collection::CollectionHandle)
//!   per document type and look it up by type or by name
//! - **Collection shortcuts** - `find_one_by`, `insert_one_and_return_id`,
//!   `find_one_and_upsert_returning`, `delete_one_by` and friends
//! - **Backends** - MongoDB (feature `mongodb`) and an in-memory store for tests
//!
//! # Quick Start
//!
//! ```ignore
//! use mongolayer::{prelude::*, memory::InMemoryStore};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub status: String,
//!     pub logins: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> MongoLayerResult<()> {
//!     let mut registry = Registry::new(InMemoryStore::new());
//!     registry.load::<User>("users")?;
//!
//!     let users = registry.get::<User>()?;
//!
//!     users
//!         .insert_one_and_return_id(&User {
//!             name: "Alice".to_string(),
//!             status: "active".to_string(),
//!             logins: 0,
//!         })
//!         .await?;
//!
//!     let update = UpdateBuilder::new()
//!         .add(Update::inc("logins", 1))
//!         .add(Update::set("status", "active"))
//!         .build()?;
//!
//!     let alice = users
//!         .find_one_and_upsert_returning(Filter::eq("name", "Alice"), update)
//!         .await?;
//!
//!     let active = users
//!         .find_many(
//!             FilterBuilder::new()
//!                 .and(Filter::eq("status", "active"))
//!                 .and(Filter::gte("logins", 1))
//!                 .build()?,
//!         )
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - MongoDB backend and connection manager (requires `mongodb` feature)

pub mod prelude;

pub use mongolayer_core::{backend, clause, codec, collection, document, error, options, query, registry};

// Re-exported for convenience and for implementing custom backends
pub use bson;
pub use async_trait::async_trait;

/// In-memory storage backend.
pub mod memory {
    pub use mongolayer_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend and connection management.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use mongolayer_mongodb::{ConnectionConfig, MongoConnection, MongoConnectionBuilder, MongoDbStore};
}
