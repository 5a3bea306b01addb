//! Core of the mongolayer project: composable clause builders and a typed
//! collection registry on top of a document database backend.
//!
//! This crate provides:
//!
//! - **Clause builders** ([`clause`]) - Accumulate filters, sorts, projections, indexes and updates
//! - **Expression factories** ([`query`]) - Build single expressions in the driver's query syntax
//! - **Store backend abstraction** ([`backend`]) - The trait every storage backend implements
//! - **Options and outcomes** ([`options`]) - Arguments and results of backend operations
//! - **Collection handles** ([`collection`]) - Typed shortcuts over one named collection
//! - **Registry** ([`registry`]) - One canonical handle per document type and collection name
//! - **Codec options** ([`codec`]) - Representation rules applied to outgoing values
//! - **Document traits** ([`document`]) - Conversion between typed values, BSON and JSON
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use mongolayer::{clause::FilterBuilder, query::{Filter, Update}, registry::Registry};
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//!     pub status: String,
//! }
//!
//! let mut registry = Registry::new(backend);
//! let users = registry.load::<User>("users")?;
//!
//! let filter = FilterBuilder::new()
//!     .and(Filter::eq("status", "active"))
//!     .and(Filter::exists("email"))
//!     .build()?;
//!
//! let active = users.find_many(filter).await?;
//! ```

pub mod backend;
pub mod clause;
pub mod codec;
pub mod collection;
pub mod document;
pub mod error;
pub mod options;
pub mod query;
pub mod registry;

#[cfg(test)]
mod test_support;
