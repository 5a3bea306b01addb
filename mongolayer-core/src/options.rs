//! Options accepted by [`StoreBackend`](crate::backend::StoreBackend) operations and the
//! outcomes they report.
//!
//! These types mirror the driver's option and result types closely enough that the
//! MongoDB backend can translate them field by field, while keeping the core crate
//! independent of the driver.

use bson::{Bson, Document};
use serde::{Deserialize, Serialize};

/// Options for `find` operations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub skip: Option<u64>,
    pub limit: Option<i64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// Options for `update_one`, `update_many` and `replace_one`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOptions {
    /// Insert a new document when the filter matches nothing.
    pub upsert: bool,
}

impl UpdateOptions {
    pub fn upsert() -> Self {
        Self { upsert: true }
    }
}

/// Which version of the document `find_one_and_update` returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnDocument {
    /// The document as it was before the update.
    #[default]
    Before,
    /// The document as it is after the update.
    After,
}

/// Options for `find_one_and_update`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOneAndUpdateOptions {
    pub sort: Option<Document>,
    pub projection: Option<Document>,
    pub upsert: bool,
    pub return_document: ReturnDocument,
}

impl FindOneAndUpdateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn projection(mut self, projection: Document) -> Self {
        self.projection = Some(projection);
        self
    }

    pub fn upsert(mut self, upsert: bool) -> Self {
        self.upsert = upsert;
        self
    }

    pub fn return_document(mut self, return_document: ReturnDocument) -> Self {
        self.return_document = return_document;
        self
    }
}

/// Options for `create_index`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexOptions {
    /// Explicit index name. Backends derive one from the keys when absent.
    pub name: Option<String>,
    pub unique: bool,
}

impl IndexOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: Some(name.into()), unique: false }
    }

    pub fn unique(mut self, unique: bool) -> Self {
        self.unique = unique;
        self
    }
}

/// Derives the driver's default index name, e.g. `{ a: 1, b: -1 }` becomes `a_1_b_-1`.
pub fn default_index_name(keys: &Document) -> String {
    keys.iter()
        .map(|(field, direction)| {
            let direction = match direction {
                Bson::String(kind) => kind.clone(),
                Bson::Int32(value) => value.to_string(),
                Bson::Int64(value) => value.to_string(),
                Bson::Double(value) => value.to_string(),
                other => other.to_string(),
            };
            format!("{field}_{direction}")
        })
        .collect::<Vec<_>>()
        .join("_")
}

/// Result of inserting one document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertOneOutcome {
    /// Identifier of the inserted document, when the backend reports one.
    pub inserted_id: Option<Bson>,
}

/// Result of inserting many documents.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsertManyOutcome {
    /// Identifiers of the inserted documents, in input order.
    pub inserted_ids: Vec<Bson>,
}

/// Result of an update, upsert or replace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    pub matched_count: u64,
    pub modified_count: u64,
    /// Identifier of the inserted document when the operation upserted.
    pub upserted_id: Option<Bson>,
}

impl UpdateOutcome {
    /// Returns `true` if the operation inserted a new document.
    pub fn upserted(&self) -> bool {
        self.upserted_id.is_some()
    }
}

/// Result of a delete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub deleted_count: u64,
}

impl DeleteOutcome {
    /// Returns `true` if at least one document was removed.
    pub fn removed(&self) -> bool {
        self.deleted_count > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn index_names_follow_driver_convention() {
        assert_eq!(default_index_name(&doc! { "a": 1, "b": -1 }), "a_1_b_-1");
        assert_eq!(default_index_name(&doc! { "body": "text" }), "body_text");
    }
}
