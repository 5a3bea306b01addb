//! Convenient re-exports of commonly used types from mongolayer.
//!
//! ```ignore
//! use mongolayer::prelude::*;
//! ```

pub use mongolayer_core::{
    backend::StoreBackend,
    clause::{ClauseBuilder, ClauseKind, FilterBuilder, IndexBuilder, ProjectionBuilder, SortBuilder, UpdateBuilder},
    codec::{CodecOptions, UuidRepresentation},
    collection::CollectionHandle,
    document::{Document, DocumentExt, NamedDocument},
    error::{MongoLayerError, MongoLayerResult},
    options::{
        DeleteOutcome, FindOneAndUpdateOptions, FindOptions, IndexOptions, InsertManyOutcome,
        InsertOneOutcome, ReturnDocument, UpdateOptions, UpdateOutcome,
    },
    query::{Filter, Index, Projection, Sort, Update},
    registry::{DuplicatePolicy, RegisteredCollection, Registration, Registry},
};
