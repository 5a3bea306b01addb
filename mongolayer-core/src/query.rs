//! Expression factories for filters, sorts, projections, indexes and updates.
//!
//! Every factory returns a plain [`bson::Document`] in the driver's query syntax.
//! The results can be passed straight to a [`CollectionHandle`](crate::collection::CollectionHandle)
//! or accumulated with a [`ClauseBuilder`](crate::clause::ClauseBuilder).
//!
//! ```ignore
//! use mongolayer::query::{Filter, Sort, Update};
//!
//! let filter = Filter::and([Filter::eq("status", "active"), Filter::gt("age", 18)]);
//! let sort = Sort::descending(["created_at"]);
//! let update = Update::combine([Update::set("status", "archived"), Update::inc("revision", 1)])?;
//! ```

use bson::{Bson, Document, doc};

use crate::error::MongoLayerResult;

fn field_op(field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Document {
    let mut inner = Document::new();
    inner.insert(op, value.into());

    let mut outer = Document::new();
    outer.insert(field.into(), inner);
    outer
}

fn update_op(op: &str, field: impl Into<String>, value: impl Into<Bson>) -> Document {
    let mut inner = Document::new();
    inner.insert(field.into(), value.into());

    let mut outer = Document::new();
    outer.insert(op, inner);
    outer
}

fn logical(op: &str, exprs: impl IntoIterator<Item = Document>) -> Document {
    let mut outer = Document::new();
    outer.insert(
        op,
        exprs
            .into_iter()
            .map(Bson::Document)
            .collect::<Vec<_>>(),
    );
    outer
}

fn each_field<I, S>(fields: I, value: impl Into<Bson> + Clone) -> Document
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut document = Document::new();
    for field in fields {
        document.insert(field.into(), value.clone().into());
    }
    document
}

/// Appends every key of `next` to `base`, later values replacing earlier ones in place.
pub(crate) fn merge_in_place(mut base: Document, next: Document) -> Document {
    for (key, value) in next {
        base.insert(key, value);
    }
    base
}

/// Sums two numeric values the way `$inc` does.
///
/// `Int32` sums that overflow widen to `Int64`; mixing with `Double` yields a
/// `Double`. Returns `None` for non-numeric or `Decimal128` operands and for
/// `Int64` overflow.
pub fn add_numbers(left: &Bson, right: &Bson) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(a), Bson::Int64(b)) | (Bson::Int64(b), Bson::Int32(a)) => {
            b.checked_add(i64::from(*a)).map(Bson::Int64)
        }
        (Bson::Int64(a), Bson::Int64(b)) => a.checked_add(*b).map(Bson::Int64),
        (Bson::Double(a), Bson::Double(b)) => Some(Bson::Double(a + b)),
        (Bson::Double(a), Bson::Int32(b)) | (Bson::Int32(b), Bson::Double(a)) => Some(Bson::Double(a + f64::from(*b))),
        (Bson::Double(a), Bson::Int64(b)) | (Bson::Int64(b), Bson::Double(a)) => Some(Bson::Double(a + *b as f64)),
        _ => None,
    }
}

/// Filter expression factories.
///
/// All methods accept field names as `Into<String>` and values as `Into<Bson>`.
///
/// ```ignore
/// let expr = Filter::or([Filter::eq("name", "Alice"), Filter::exists("nickname")]);
/// ```
pub struct Filter;

impl Filter {
    /// The empty filter, matching every document.
    pub fn empty() -> Document {
        Document::new()
    }

    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        let mut document = Document::new();
        document.insert(field.into(), value.into());
        document
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        field_op(field, "$ne", value)
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        field_op(field, "$gt", value)
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        field_op(field, "$gte", value)
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        field_op(field, "$lt", value)
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        field_op(field, "$lte", value)
    }

    /// Matches documents where the field equals any of the values.
    pub fn in_<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        field_op(field, "$in", values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    /// Matches documents where the field equals none of the values.
    pub fn nin<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        field_op(field, "$nin", values.into_iter().map(Into::into).collect::<Vec<Bson>>())
    }

    /// Matches documents that contain the field.
    pub fn exists(field: impl Into<String>) -> Document {
        field_op(field, "$exists", true)
    }

    /// Matches documents that do not contain the field.
    pub fn not_exists(field: impl Into<String>) -> Document {
        field_op(field, "$exists", false)
    }

    /// Matches documents where the string field matches the regular expression.
    pub fn regex(field: impl Into<String>, pattern: impl Into<String>) -> Document {
        field_op(field, "$regex", pattern.into())
    }

    /// Negates a single-field operator expression, e.g. `Filter::not(Filter::gt("age", 18))`.
    ///
    /// Top-level logical expressions cannot be negated this way; use [`Filter::nor`] instead.
    pub fn not(expr: Document) -> Document {
        expr.into_iter()
            .map(|(field, condition)| (field, Bson::Document(doc! { "$not": condition })))
            .collect()
    }

    /// Matches documents satisfying every expression.
    pub fn and(exprs: impl IntoIterator<Item = Document>) -> Document {
        logical("$and", exprs)
    }

    /// Matches documents satisfying at least one expression.
    pub fn or(exprs: impl IntoIterator<Item = Document>) -> Document {
        logical("$or", exprs)
    }

    /// Matches documents satisfying none of the expressions.
    pub fn nor(exprs: impl IntoIterator<Item = Document>) -> Document {
        logical("$nor", exprs)
    }
}

/// Sort expression factories.
pub struct Sort;

impl Sort {
    /// Sorts by each field in ascending order.
    pub fn ascending<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, 1)
    }

    /// Sorts by each field in descending order.
    pub fn descending<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, -1)
    }

    /// Combines sorts in order. A field repeated later keeps its first position.
    pub fn order_by(sorts: impl IntoIterator<Item = Document>) -> Document {
        sorts
            .into_iter()
            .fold(Document::new(), merge_in_place)
    }
}

/// Projection expression factories.
pub struct Projection;

impl Projection {
    /// Includes the given fields.
    pub fn include<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, 1)
    }

    /// Excludes the given fields.
    pub fn exclude<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, 0)
    }

    /// Excludes the `_id` field.
    pub fn exclude_id() -> Document {
        doc! { "_id": 0 }
    }

    /// Combines projections. A repeated field moves to the end with its later value.
    pub fn fields(projections: impl IntoIterator<Item = Document>) -> Document {
        let mut combined = Document::new();
        for projection in projections {
            for (key, value) in projection {
                combined.remove(&key);
                combined.insert(key, value);
            }
        }
        combined
    }
}

/// Index key factories.
pub struct Index;

impl Index {
    /// Ascending index on each field.
    pub fn ascending<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, 1)
    }

    /// Descending index on each field.
    pub fn descending<I, S>(fields: I) -> Document
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        each_field(fields, -1)
    }

    /// Text index on a field.
    pub fn text(field: impl Into<String>) -> Document {
        each_field([field], "text")
    }

    /// Hashed index on a field.
    pub fn hashed(field: impl Into<String>) -> Document {
        each_field([field], "hashed")
    }

    /// Combines index keys into a compound index.
    pub fn compound(indexes: impl IntoIterator<Item = Document>) -> Document {
        indexes
            .into_iter()
            .fold(Document::new(), merge_in_place)
    }
}

/// Update expression factories.
pub struct Update;

impl Update {
    /// Sets the field to the value.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        update_op("$set", field, value)
    }

    /// Removes the field.
    pub fn unset(field: impl Into<String>) -> Document {
        update_op("$unset", field, "")
    }

    /// Increments the field by the amount.
    pub fn inc(field: impl Into<String>, amount: impl Into<Bson>) -> Document {
        update_op("$inc", field, amount)
    }

    /// Sets the field only when an upsert inserts a new document.
    pub fn set_on_insert(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        update_op("$setOnInsert", field, value)
    }

    /// Appends the value to the array field.
    pub fn push(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        update_op("$push", field, value)
    }

    /// Appends the value to the array field unless already present.
    pub fn add_to_set(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        update_op("$addToSet", field, value)
    }

    /// Removes every occurrence of the value from the array field.
    pub fn pull(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        update_op("$pull", field, value)
    }

    /// Renames the field.
    pub fn rename(field: impl Into<String>, new_name: impl Into<String>) -> Document {
        update_op("$rename", field, new_name.into())
    }

    /// Combines updates with the same rules as [`UpdateBuilder::add`](crate::clause::UpdateBuilder).
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::InvalidExpression`](crate::error::MongoLayerError::InvalidExpression)
    /// when two `$inc` amounts on one field cannot be summed exactly.
    pub fn combine(updates: impl IntoIterator<Item = Document>) -> MongoLayerResult<Document> {
        let mut combined = Document::new();
        for update in updates {
            crate::clause::merge_updates(&mut combined, update)?;
        }
        Ok(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_factories_use_driver_syntax() {
        assert_eq!(Filter::eq("status", "active"), doc! { "status": "active" });
        assert_eq!(Filter::gte("age", 18), doc! { "age": { "$gte": 18 } });
        assert_eq!(Filter::in_("tier", ["gold", "silver"]), doc! { "tier": { "$in": ["gold", "silver"] } });
        assert_eq!(Filter::not(Filter::gt("age", 65)), doc! { "age": { "$not": { "$gt": 65 } } });
        assert_eq!(
            Filter::nor([Filter::eq("a", 1), Filter::eq("b", 2)]),
            doc! { "$nor": [ { "a": 1 }, { "b": 2 } ] }
        );
    }

    #[test]
    fn sort_order_by_keeps_first_position() {
        let sort = Sort::order_by([Sort::ascending(["name", "age"]), Sort::descending(["name"])]);

        assert_eq!(sort, doc! { "name": -1, "age": 1 });
    }

    #[test]
    fn projection_fields_moves_repeated_keys() {
        let projection = Projection::fields([
            Projection::include(["name", "age"]),
            Projection::exclude(["name"]),
        ]);

        assert_eq!(projection, doc! { "age": 1, "name": 0 });
    }

    #[test]
    fn update_factories_nest_under_operators() {
        assert_eq!(Update::set("x", 1), doc! { "$set": { "x": 1 } });
        assert_eq!(Update::rename("old", "new"), doc! { "$rename": { "old": "new" } });
        assert_eq!(Index::hashed("key"), doc! { "key": "hashed" });
    }

    #[test]
    fn combine_sums_increments() {
        let update = Update::combine([Update::inc("n", 2), Update::set("a", 1), Update::inc("n", 3)]).unwrap();

        assert_eq!(update, doc! { "$inc": { "n": 5 }, "$set": { "a": 1 } });
        assert!(Update::combine([Update::inc("n", i64::MAX), Update::inc("n", 1)]).is_err());
    }

    #[test]
    fn add_numbers_widens_and_checks_overflow() {
        assert_eq!(add_numbers(&Bson::Int32(i32::MAX), &Bson::Int32(1)), Some(Bson::Int64(i64::from(i32::MAX) + 1)));
        assert_eq!(add_numbers(&Bson::Int32(2), &Bson::Double(0.5)), Some(Bson::Double(2.5)));
        assert_eq!(add_numbers(&Bson::Int64(i64::MAX), &Bson::Int64(1)), None);
        assert_eq!(add_numbers(&Bson::Int32(1), &Bson::Int64(i64::MAX)), None);
        assert_eq!(add_numbers(&Bson::Int64(i64::MIN), &Bson::Int32(-1)), None);
        assert_eq!(add_numbers(&Bson::String("1".into()), &Bson::Int32(1)), None);
    }
}
