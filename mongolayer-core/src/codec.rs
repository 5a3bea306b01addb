//! Codec options applied to documents and expressions before they reach a backend.
//!
//! Serialization itself is delegated to `serde` and `bson`. [`CodecOptions`] only
//! post-processes the encoded BSON so stored values share one representation,
//! regardless of whether they came from a typed document or a hand-written filter.

use bson::{Bson, Document, Uuid, spec::BinarySubtype};
use serde::{Deserialize, Serialize};

/// How UUID values are written to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UuidRepresentation {
    /// BSON binary subtype 4, as written by the driver.
    #[default]
    Binary,
    /// Hyphenated lowercase text.
    String,
}

/// Encoding options shared by every handle created from the same registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CodecOptions {
    #[serde(default)]
    pub uuid_representation: UuidRepresentation,
}

impl CodecOptions {
    /// Creates options that write UUIDs with the given representation.
    pub fn with_uuid_representation(uuid_representation: UuidRepresentation) -> Self {
        Self { uuid_representation }
    }

    /// Returns `true` when encoding leaves values untouched.
    pub fn is_passthrough(&self) -> bool {
        self.uuid_representation == UuidRepresentation::Binary
    }

    /// Encodes a document (or expression) according to these options.
    pub fn encode_document(&self, document: Document) -> Document {
        if self.is_passthrough() {
            return document;
        }

        document
            .into_iter()
            .map(|(key, value)| (key, self.encode_value(value)))
            .collect()
    }

    /// Encodes a single BSON value according to these options.
    pub fn encode_value(&self, value: Bson) -> Bson {
        match value {
            Bson::Binary(binary)
                if binary.subtype == BinarySubtype::Uuid
                    && self.uuid_representation == UuidRepresentation::String =>
            {
                match <[u8; 16]>::try_from(binary.bytes.as_slice()) {
                    Ok(bytes) => Bson::String(Uuid::from_bytes(bytes).to_string()),
                    Err(_) => Bson::Binary(binary),
                }
            }
            Bson::Document(document) => Bson::Document(self.encode_document(document)),
            Bson::Array(values) => Bson::Array(
                values
                    .into_iter()
                    .map(|value| self.encode_value(value))
                    .collect(),
            ),
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn binary_is_passthrough() {
        let id = Uuid::new();
        let document = doc! { "_id": id, "tags": [id] };

        assert_eq!(CodecOptions::default().encode_document(document.clone()), document);
    }

    #[test]
    fn string_representation_rewrites_nested_uuids() {
        let id = Uuid::new();
        let codec = CodecOptions::with_uuid_representation(UuidRepresentation::String);

        let encoded = codec.encode_document(doc! {
            "owner": id,
            "$or": [ { "ref": id }, { "ref": { "$in": [id] } } ],
        });

        let text = id.to_string();
        assert_eq!(
            encoded,
            doc! {
                "owner": text.clone(),
                "$or": [ { "ref": text.clone() }, { "ref": { "$in": [text] } } ],
            }
        );
    }
}
