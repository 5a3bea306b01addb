//! Update operator application for in-memory documents.
//!
//! Supported operators: `$set $unset $inc $setOnInsert $push $addToSet $pull $rename`.
//! `$push` and `$addToSet` accept either a single value or `{ "$each": [...] }`.

use bson::{Bson, Document};

use mongolayer_core::{
    error::{MongoLayerError, MongoLayerResult},
    query::add_numbers,
};

use crate::{
    evaluator::{matches_condition, values_equal},
    path::{remove_path, resolve, set_path},
};

fn invalid(message: impl Into<String>) -> MongoLayerError {
    MongoLayerError::InvalidExpression(message.into())
}

/// Checks that `update` is a non-empty operator document.
pub(crate) fn validate_update(update: &Document) -> MongoLayerResult<()> {
    if update.is_empty() {
        return Err(invalid("update document must not be empty"));
    }

    if let Some(key) = update.keys().find(|key| !key.starts_with('$')) {
        return Err(invalid(format!("update document must only contain operators, found {key}")));
    }

    Ok(())
}

/// Checks that `replacement` contains no update operators.
pub(crate) fn validate_replacement(replacement: &Document) -> MongoLayerResult<()> {
    match replacement.keys().find(|key| key.starts_with('$')) {
        Some(key) => Err(invalid(format!("replacement document must not contain operator {key}"))),
        None => Ok(()),
    }
}

/// Applies an update expression to `document`.
///
/// `inserting` is `true` when the document is being created by an upsert, which
/// enables `$setOnInsert`.
pub(crate) fn apply_update(document: &mut Document, update: &Document, inserting: bool) -> MongoLayerResult<()> {
    validate_update(update)?;

    for (op, fields) in update {
        let Bson::Document(fields) = fields else {
            return Err(invalid(format!("{op} expects a document")));
        };

        for (field, operand) in fields {
            if field == "_id" && op != "$setOnInsert" && !inserting {
                return Err(invalid("the _id field cannot be updated"));
            }

            match op.as_str() {
                "$set" => set_path(document, field, operand.clone())?,
                "$setOnInsert" => {
                    if inserting {
                        set_path(document, field, operand.clone())?;
                    }
                }
                "$unset" => {
                    remove_path(document, field);
                }
                "$inc" => {
                    let amount = numeric(field, operand)?;
                    let incremented = match resolve(document, field) {
                        None => amount.clone(),
                        Some(current @ (Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))) => add_numbers(current, amount)
                            .ok_or_else(|| invalid(format!("$inc on field {field} overflows")))?,
                        Some(_) => return Err(invalid(format!("cannot apply $inc to non-numeric field {field}"))),
                    };
                    set_path(document, field, incremented)?;
                }
                "$push" => {
                    let mut items = array_at(document, op, field)?;
                    items.extend(each_values(operand));
                    set_path(document, field, Bson::Array(items))?;
                }
                "$addToSet" => {
                    let mut items = array_at(document, op, field)?;
                    for value in each_values(operand) {
                        if !items.iter().any(|item| values_equal(item, &value)) {
                            items.push(value);
                        }
                    }
                    set_path(document, field, Bson::Array(items))?;
                }
                "$pull" => {
                    if resolve(document, field).is_none() {
                        continue;
                    }
                    let mut kept = Vec::new();
                    for item in array_at(document, op, field)? {
                        if !matches_condition(Some(&item), operand)? {
                            kept.push(item);
                        }
                    }
                    set_path(document, field, Bson::Array(kept))?;
                }
                "$rename" => {
                    let Bson::String(target) = operand else {
                        return Err(invalid(format!("$rename target for {field} must be a string")));
                    };
                    if let Some(value) = remove_path(document, field) {
                        set_path(document, target, value)?;
                    }
                }
                other => return Err(invalid(format!("unsupported update operator {other}"))),
            }
        }
    }

    Ok(())
}

/// Builds the initial document of an upsert from the filter's equality conditions.
pub(crate) fn seed_from_filter(filter: &Document) -> MongoLayerResult<Document> {
    let mut seed = Document::new();
    collect_equalities(filter, &mut seed)?;
    Ok(seed)
}

fn collect_equalities(filter: &Document, seed: &mut Document) -> MongoLayerResult<()> {
    for (key, value) in filter {
        match (key.as_str(), value) {
            ("$and", Bson::Array(items)) => {
                for item in items {
                    if let Bson::Document(inner) = item {
                        collect_equalities(inner, seed)?;
                    }
                }
            }
            (op, _) if op.starts_with('$') => {}
            (field, Bson::Document(condition)) if condition.keys().any(|k| k.starts_with('$')) => {
                if let Some(value) = condition.get("$eq") {
                    set_path(seed, field, value.clone())?;
                }
            }
            (_, Bson::RegularExpression(_)) => {}
            (field, value) => set_path(seed, field, value.clone())?,
        }
    }
    Ok(())
}

fn numeric<'a>(field: &str, operand: &'a Bson) -> MongoLayerResult<&'a Bson> {
    match operand {
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) => Ok(operand),
        _ => Err(invalid(format!("$inc amount for {field} must be numeric"))),
    }
}

fn array_at(document: &Document, op: &str, field: &str) -> MongoLayerResult<Vec<Bson>> {
    match resolve(document, field) {
        None => Ok(Vec::new()),
        Some(Bson::Array(items)) => Ok(items.clone()),
        Some(_) => Err(invalid(format!("{op} requires {field} to be an array"))),
    }
}

fn each_values(operand: &Bson) -> Vec<Bson> {
    match operand {
        Bson::Document(modifiers) => match modifiers.get("$each") {
            Some(Bson::Array(values)) => values.clone(),
            _ => vec![operand.clone()],
        },
        _ => vec![operand.clone()],
    }
}
