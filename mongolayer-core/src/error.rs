//! Error types and result types for mongolayer operations.
//!
//! Every fallible operation in the workspace returns [`MongoLayerResult<T>`].
//! Failures raised by the database driver are carried unchanged inside
//! [`MongoLayerError::Backend`] and remain reachable through
//! [`std::error::Error::source`].

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Boxed error raised by a storage backend.
pub type BackendError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Represents all possible errors that can occur when building clauses or
/// working with registered collections.
#[derive(Error, Debug)]
pub enum MongoLayerError {
    /// `build()` was called on an empty builder whose kind has no default expression.
    /// The argument names the builder kind (e.g. `"update"`).
    #[error("Cannot build an empty {0} clause")]
    EmptyBuilder(&'static str),
    /// No collection (or database) is registered under the given type or name.
    #[error("Nothing registered for {0}")]
    NotRegistered(String),
    /// A registration collided with an existing one and the registry rejects duplicates.
    #[error("Already registered: {0}")]
    DuplicateRegistration(String),
    /// The backend reported a successful insert without a generated identifier.
    /// The argument is the collection name.
    #[error("Insert into collection {0} returned no identifier")]
    Insertion(String),
    /// The backend reported a successful upsert without returning a document.
    /// The argument is the collection name.
    #[error("Upsert on collection {0} returned no document")]
    Consistency(String),
    /// Serialization/deserialization error when converting between BSON, JSON and typed documents.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// An expression handed to a backend is malformed or uses an operator it does not understand.
    #[error("Invalid expression: {0}")]
    InvalidExpression(String),
    /// The backend does not implement the requested operation.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),
    /// An error raised by the underlying storage backend, carried unchanged.
    #[error("Backend error: {0}")]
    Backend(#[source] BackendError),
}

/// A specialized `Result` type for mongolayer operations.
pub type MongoLayerResult<T> = Result<T, MongoLayerError>;

impl MongoLayerError {
    /// Wraps a backend error without altering it.
    pub fn backend(err: impl Into<BackendError>) -> Self {
        MongoLayerError::Backend(err.into())
    }
}

impl From<BsonError> for MongoLayerError {
    fn from(err: BsonError) -> Self {
        MongoLayerError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for MongoLayerError {
    fn from(err: SerdeJsonError) -> Self {
        MongoLayerError::Serialization(err.to_string())
    }
}
