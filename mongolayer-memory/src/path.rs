//! Dotted field path access on BSON documents.

use bson::{Bson, Document};

use mongolayer_core::error::{MongoLayerError, MongoLayerResult};

/// Resolves a dotted path such as `address.city` or `tags.0`.
pub(crate) fn resolve<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = match current {
            Bson::Document(inner) => inner.get(segment)?,
            Bson::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }

    Some(current)
}

/// Sets the value at a dotted path, creating intermediate documents as needed.
pub(crate) fn set_path(document: &mut Document, path: &str, value: Bson) -> MongoLayerResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if document.get(head).is_none() {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(inner)) => set_path(inner, rest, value),
        _ => Err(MongoLayerError::InvalidExpression(format!(
            "cannot create field {rest} in non-document field {head}"
        ))),
    }
}

/// Removes and returns the value at a dotted path.
pub(crate) fn remove_path(document: &mut Document, path: &str) -> Option<Bson> {
    match path.split_once('.') {
        None => document.remove(path),
        Some((head, rest)) => match document.get_mut(head) {
            Some(Bson::Document(inner)) => remove_path(inner, rest),
            _ => None,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn resolves_nested_documents_and_array_positions() {
        let document = doc! { "address": { "city": "Oslo" }, "tags": ["a", "b"] };

        assert_eq!(resolve(&document, "address.city"), Some(&Bson::String("Oslo".into())));
        assert_eq!(resolve(&document, "tags.1"), Some(&Bson::String("b".into())));
        assert_eq!(resolve(&document, "address.zip"), None);
        assert_eq!(resolve(&document, "tags.x"), None);
    }

    #[test]
    fn set_creates_intermediate_documents() {
        let mut document = doc! { "name": "a" };

        set_path(&mut document, "profile.age", Bson::Int32(3)).unwrap();
        assert_eq!(document, doc! { "name": "a", "profile": { "age": 3 } });

        assert!(set_path(&mut document, "name.first", Bson::Null).is_err());
    }

    #[test]
    fn remove_returns_previous_value() {
        let mut document = doc! { "profile": { "age": 3, "city": "Oslo" } };

        assert_eq!(remove_path(&mut document, "profile.age"), Some(Bson::Int32(3)));
        assert_eq!(remove_path(&mut document, "profile.age"), None);
        assert_eq!(document, doc! { "profile": { "city": "Oslo" } });
    }
}
