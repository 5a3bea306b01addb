//! Core traits for typed documents and their conversion to BSON and JSON.
//!
//! Any serde-compatible type can be stored in a collection; [`Document`] is
//! implemented automatically. Types that always live in the same collection can
//! additionally implement [`NamedDocument`] and be registered without repeating
//! the collection name.

use bson::{Document as BsonDocument, deserialize_from_document, serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::{codec::CodecOptions, error::MongoLayerResult};

/// Marker trait for values that can be stored in a collection.
///
/// This trait is implemented for every type that is `Serialize + DeserializeOwned`
/// and can be shared across threads, including `bson::Document` itself, which
/// gives an untyped view of a collection.
///
/// # Example
///
/// ```ignore
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Widget {
///     pub name: String,
///     pub status: String,
/// }
///
/// let widgets = registry.load::<Widget>("widgets")?;
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<D> Document for D where D: Serialize + DeserializeOwned + Send + Sync + 'static {}

/// A document type bound to a fixed collection name.
///
/// ```ignore
/// impl NamedDocument for Widget {
///     fn collection_name() -> &'static str {
///         "widgets"
///     }
/// }
///
/// let widgets = registry.load_named::<Widget>()?;
/// ```
pub trait NamedDocument: Document {
    /// Returns the name of the collection this document belongs to.
    fn collection_name() -> &'static str;
}

/// Extension trait providing conversion utilities for documents.
///
/// Automatically implemented for all types that implement [`Document`].
pub trait DocumentExt: Document + Sized {
    /// Converts this value to a BSON document, applying the codec options.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the value does not serialize to a document.
    fn to_bson_document(&self, codec: &CodecOptions) -> MongoLayerResult<BsonDocument>;

    /// Creates a value from a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_bson_document(document: BsonDocument) -> MongoLayerResult<Self>;

    /// Converts this value to a JSON value.
    fn to_json(&self) -> MongoLayerResult<Value>;

    /// Creates a value from a JSON value.
    fn from_json(value: Value) -> MongoLayerResult<Self>;
}

impl<D: Document> DocumentExt for D {
    fn to_bson_document(&self, codec: &CodecOptions) -> MongoLayerResult<BsonDocument> {
        Ok(codec.encode_document(serialize_to_document(self)?))
    }

    fn from_bson_document(document: BsonDocument) -> MongoLayerResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn to_json(&self) -> MongoLayerResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> MongoLayerResult<Self> {
        Ok(from_value(value)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::MongoLayerError;
    use serde::Deserialize;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Widget {
        name: String,
        count: i32,
    }

    #[test]
    fn converts_through_bson_and_json() {
        let widget = Widget { name: "gear".into(), count: 3 };

        let document = widget.to_bson_document(&CodecOptions::default()).unwrap();
        assert_eq!(document.get_str("name").unwrap(), "gear");
        assert_eq!(Widget::from_bson_document(document).unwrap(), widget);

        let json = widget.to_json().unwrap();
        assert_eq!(json["count"], 3);
        assert_eq!(Widget::from_json(json).unwrap(), widget);
    }

    #[test]
    fn non_document_values_fail_to_encode() {
        let result = 42_i32.to_bson_document(&CodecOptions::default());

        assert!(matches!(result, Err(MongoLayerError::Serialization(_))));
    }
}
