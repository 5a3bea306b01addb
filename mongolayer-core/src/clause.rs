//! Composable clause builders.
//!
//! A [`ClauseBuilder`] accumulates expressions of one kind (filter, sort,
//! projection, index or update) and yields the combined expression through
//! [`ClauseBuilder::build`]. The kind parameter decides two things:
//!
//! - how a new expression is merged into the current one ([`ClauseKind::merge`]);
//! - what `build()` returns while the builder is still empty
//!   ([`ClauseKind::default_expression`]). Kinds without a safe default make
//!   `build()` fail with [`MongoLayerError::EmptyBuilder`].
//!
//! A merge that cannot be performed without losing an expression (two `$inc`
//! amounts that do not sum exactly, for example) leaves the current expression
//! unchanged and makes `build()` fail with [`MongoLayerError::InvalidExpression`].
//!
//! Every combinator consumes and returns the builder, so calls chain:
//!
//! ```ignore
//! use mongolayer::{clause::FilterBuilder, query::Filter};
//!
//! let filter = FilterBuilder::new()
//!     .and(Filter::eq("status", "active"))
//!     .and(Filter::gte("age", 18))
//!     .or(Filter::eq("role", "admin"))
//!     .build()?;
//! ```
//!
//! Builders are plain values. Cloning one yields an independent builder with an
//! equal expression; mutating the clone never affects the original.

use bson::{Bson, Document, doc};
use std::{fmt, marker::PhantomData, mem};

use crate::{
    error::{MongoLayerError, MongoLayerResult},
    query::{Projection, add_numbers, merge_in_place},
};

/// Per-kind behaviour of a [`ClauseBuilder`].
pub trait ClauseKind {
    /// Human readable kind name, used in error messages.
    const NAME: &'static str;

    /// Expression returned by `build()` when nothing was added, or `None` when the
    /// kind has no safe default.
    fn default_expression() -> Option<Document>;

    /// Merges `next` into `current`. Only called when `current` is present.
    ///
    /// On error `current` must be left unchanged.
    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()>;
}

/// Filter clauses. Empty filters match every document; `add` combines with `$and`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterClause;

/// Sort clauses. Empty sorts order by `_id` ascending; `add` appends keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortClause;

/// Projection clauses. Empty projections include `_id` only; `add` unions fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProjectionClause;

/// Index key clauses. `add` builds a compound index.
///
/// There is no default: an index needs at least one key, so an empty builder
/// fails `build()` with [`MongoLayerError::EmptyBuilder`] rather than guessing one.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexClause;

/// Update clauses. No default; `add` deep-merges operators.
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateClause;

impl ClauseKind for FilterClause {
    const NAME: &'static str = "filter";

    fn default_expression() -> Option<Document> {
        Some(Document::new())
    }

    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()> {
        *current = append_logical("$and", mem::take(current), next);
        Ok(())
    }
}

impl ClauseKind for SortClause {
    const NAME: &'static str = "sort";

    fn default_expression() -> Option<Document> {
        Some(doc! { "_id": 1 })
    }

    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()> {
        *current = merge_in_place(mem::take(current), next);
        Ok(())
    }
}

impl ClauseKind for ProjectionClause {
    const NAME: &'static str = "projection";

    fn default_expression() -> Option<Document> {
        Some(doc! { "_id": 1 })
    }

    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()> {
        *current = Projection::fields([mem::take(current), next]);
        Ok(())
    }
}

impl ClauseKind for IndexClause {
    const NAME: &'static str = "index";

    fn default_expression() -> Option<Document> {
        None
    }

    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()> {
        *current = merge_in_place(mem::take(current), next);
        Ok(())
    }
}

impl ClauseKind for UpdateClause {
    const NAME: &'static str = "update";

    fn default_expression() -> Option<Document> {
        None
    }

    fn merge(current: &mut Document, next: Document) -> MongoLayerResult<()> {
        merge_updates(current, next)
    }
}

pub type FilterBuilder = ClauseBuilder<FilterClause>;
pub type SortBuilder = ClauseBuilder<SortClause>;
pub type ProjectionBuilder = ClauseBuilder<ProjectionClause>;
pub type IndexBuilder = ClauseBuilder<IndexClause>;
pub type UpdateBuilder = ClauseBuilder<UpdateClause>;

/// Accumulator for expressions of kind `K`.
pub struct ClauseBuilder<K: ClauseKind> {
    current: Option<Document>,
    /// First merge failure; reported by `build()`.
    conflict: Option<String>,
    _kind: PhantomData<K>,
}

impl<K: ClauseKind> ClauseBuilder<K> {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self { current: None, conflict: None, _kind: PhantomData }
    }

    /// Creates a builder seeded with an expression.
    pub fn from_expr(expr: Document) -> Self {
        Self { current: Some(expr), conflict: None, _kind: PhantomData }
    }

    /// Creates a builder from many expressions, folded with the kind's merge rule.
    pub fn all(exprs: impl IntoIterator<Item = Document>) -> Self {
        exprs
            .into_iter()
            .fold(Self::new(), Self::add)
    }

    /// Returns the accumulated expression, if any.
    pub fn current(&self) -> Option<&Document> {
        self.current.as_ref()
    }

    /// Returns `true` when nothing has been added yet.
    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Returns the accumulated expression, or the kind's default when empty.
    ///
    /// # Errors
    ///
    /// Returns [`MongoLayerError::EmptyBuilder`] when the builder is empty and the
    /// kind has no default expression, and [`MongoLayerError::InvalidExpression`]
    /// when an earlier `add` could not be merged.
    pub fn build(&self) -> MongoLayerResult<Document> {
        if let Some(conflict) = &self.conflict {
            return Err(MongoLayerError::InvalidExpression(conflict.clone()));
        }

        match &self.current {
            Some(expr) => Ok(expr.clone()),
            None => K::default_expression().ok_or(MongoLayerError::EmptyBuilder(K::NAME)),
        }
    }

    /// Consumes the builder, returning the raw accumulated expression.
    ///
    /// Expressions rejected by a failed merge are not part of it.
    pub fn into_inner(self) -> Option<Document> {
        self.current
    }

    /// Replaces the accumulated expression.
    pub fn set(mut self, expr: Document) -> Self {
        self.current = Some(expr);
        self.conflict = None;
        self
    }

    /// Resets the builder to the empty state.
    pub fn clear(mut self) -> Self {
        self.current = None;
        self.conflict = None;
        self
    }

    /// Adds an expression with an explicit combinator.
    ///
    /// When the builder is empty `expr` becomes the current expression unchanged;
    /// otherwise the current expression is replaced by `combine(current, expr)`.
    pub fn add_with<F>(mut self, combine: F, expr: Document) -> Self
    where
        F: FnOnce(Document, Document) -> Document,
    {
        self.current = Some(match self.current.take() {
            Some(current) => combine(current, expr),
            None => expr,
        });
        self
    }

    /// Adds an expression using the kind's merge rule.
    ///
    /// If the merge fails the current expression is kept as it was and `build()`
    /// reports the failure.
    pub fn add(mut self, expr: Document) -> Self {
        let merged = match self.current.as_mut() {
            Some(current) => K::merge(current, expr),
            None => {
                self.current = Some(expr);
                Ok(())
            }
        };

        if let Err(err) = merged {
            let message = match err {
                MongoLayerError::InvalidExpression(message) => message,
                other => other.to_string(),
            };
            self.conflict.get_or_insert(message);
        }
        self
    }
}

impl ClauseBuilder<FilterClause> {
    /// Combines with `$and`. Repeated calls extend one `$and` list in call order.
    pub fn and(self, expr: Document) -> Self {
        self.add_with(|current, next| append_logical("$and", current, next), expr)
    }

    /// Combines with `$or`. Repeated calls extend one `$or` list in call order.
    pub fn or(self, expr: Document) -> Self {
        self.add_with(|current, next| append_logical("$or", current, next), expr)
    }

    /// Combines with `$nor`: the result matches documents matching neither the
    /// current expression nor `expr`.
    pub fn nor(self, expr: Document) -> Self {
        self.add_with(|current, next| doc! { "$nor": [current, next] }, expr)
    }
}

impl<K: ClauseKind> Default for ClauseBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ClauseKind> Clone for ClauseBuilder<K> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            conflict: self.conflict.clone(),
            _kind: PhantomData,
        }
    }
}

impl<K: ClauseKind> PartialEq for ClauseBuilder<K> {
    fn eq(&self, other: &Self) -> bool {
        self.current == other.current && self.conflict == other.conflict
    }
}

impl<K: ClauseKind> fmt::Debug for ClauseBuilder<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClauseBuilder")
            .field("kind", &K::NAME)
            .field("current", &self.current)
            .field("conflict", &self.conflict)
            .finish()
    }
}

impl<K: ClauseKind> From<Document> for ClauseBuilder<K> {
    fn from(expr: Document) -> Self {
        Self::from_expr(expr)
    }
}

impl<K: ClauseKind> FromIterator<Document> for ClauseBuilder<K> {
    fn from_iter<I: IntoIterator<Item = Document>>(iter: I) -> Self {
        Self::all(iter)
    }
}

/// Appends `next` to a top-level `op` list, or wraps both in a new one.
fn append_logical(op: &str, mut current: Document, next: Document) -> Document {
    let flattens = current.len() == 1 && matches!(current.get(op), Some(Bson::Array(_)));

    if flattens {
        if let Some(Bson::Array(list)) = current.get_mut(op) {
            list.push(Bson::Document(next));
        }
        return current;
    }

    let mut combined = Document::new();
    combined.insert(op, vec![Bson::Document(current), Bson::Document(next)]);
    combined
}

/// Deep-merges two update expressions operator by operator.
///
/// `$inc` amounts on the same field are summed and `$push`/`$addToSet` values are
/// collected into one `$each` list. Fails, leaving `current` untouched, when two
/// `$inc` amounts cannot be summed exactly.
pub(crate) fn merge_updates(current: &mut Document, next: Document) -> MongoLayerResult<()> {
    let mut merged = current.clone();

    for (op, value) in next {
        match value {
            Bson::Document(fields)
                if op.starts_with('$') && matches!(merged.get(&op), Some(Bson::Document(_))) =>
            {
                if let Some(Bson::Document(existing)) = merged.get_mut(&op) {
                    for (field, incoming) in fields {
                        merge_update_field(&op, existing, field, incoming)?;
                    }
                }
            }
            value => {
                merged.insert(op, value);
            }
        }
    }

    *current = merged;
    Ok(())
}

fn merge_update_field(op: &str, existing: &mut Document, field: String, incoming: Bson) -> MongoLayerResult<()> {
    let previous = existing.get(&field).cloned();

    let merged = match (op, previous) {
        ("$inc", Some(previous)) => add_numbers(&previous, &incoming).ok_or_else(|| {
            MongoLayerError::InvalidExpression(format!(
                "cannot combine $inc amounts {previous} and {incoming} for field {field}"
            ))
        })?,
        ("$push" | "$addToSet", Some(previous)) => {
            let mut values = each_values(previous);
            values.extend(each_values(incoming));
            Bson::Document(doc! { "$each": values })
        }
        (_, _) => incoming,
    };

    existing.insert(field, merged);
    Ok(())
}

fn each_values(value: Bson) -> Vec<Bson> {
    match value {
        Bson::Document(mut modifiers)
            if modifiers.len() == 1 && matches!(modifiers.get("$each"), Some(Bson::Array(_))) =>
        {
            match modifiers.remove("$each") {
                Some(Bson::Array(values)) => values,
                _ => Vec::new(),
            }
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Filter, Index, Sort, Update};

    #[test]
    fn empty_builders_fall_back_to_defaults() {
        assert_eq!(FilterBuilder::new().build().unwrap(), doc! {});
        assert_eq!(SortBuilder::new().build().unwrap(), doc! { "_id": 1 });
        assert_eq!(ProjectionBuilder::new().build().unwrap(), doc! { "_id": 1 });
    }

    #[test]
    fn empty_builders_without_default_fail() {
        assert!(matches!(UpdateBuilder::new().build(), Err(MongoLayerError::EmptyBuilder("update"))));
        assert!(matches!(IndexBuilder::new().build(), Err(MongoLayerError::EmptyBuilder("index"))));
    }

    #[test]
    fn first_add_is_taken_unchanged() {
        let filter = FilterBuilder::new().or(Filter::eq("a", 1));

        assert_eq!(filter.build().unwrap(), doc! { "a": 1 });
    }

    #[test]
    fn and_chain_is_a_single_conjunction_in_call_order() {
        let filter = FilterBuilder::new()
            .and(Filter::eq("a", 1))
            .and(Filter::gt("b", 2))
            .and(Filter::exists("c"))
            .build()
            .unwrap();

        assert_eq!(
            filter,
            doc! { "$and": [ { "a": 1 }, { "b": { "$gt": 2 } }, { "c": { "$exists": true } } ] }
        );
    }

    #[test]
    fn mixed_operators_nest_left_to_right() {
        let filter = FilterBuilder::from_expr(Filter::eq("a", 1))
            .and(Filter::eq("b", 2))
            .or(Filter::eq("c", 3))
            .nor(Filter::eq("d", 4))
            .build()
            .unwrap();

        assert_eq!(
            filter,
            doc! {
                "$nor": [
                    { "$or": [ { "$and": [ { "a": 1 }, { "b": 2 } ] }, { "c": 3 } ] },
                    { "d": 4 },
                ]
            }
        );
    }

    #[test]
    fn nor_never_flattens() {
        let filter = FilterBuilder::new()
            .nor(Filter::eq("a", 1))
            .nor(Filter::eq("b", 2))
            .nor(Filter::eq("c", 3))
            .build()
            .unwrap();

        assert_eq!(filter, doc! { "$nor": [ { "$nor": [ { "a": 1 }, { "b": 2 } ] }, { "c": 3 } ] });
    }

    #[test]
    fn clone_is_independent() {
        let original = FilterBuilder::from_expr(Filter::eq("a", 1));
        let extended = original.clone().and(Filter::eq("b", 2));

        assert_eq!(original.build().unwrap(), doc! { "a": 1 });
        assert_eq!(extended.build().unwrap(), doc! { "$and": [ { "a": 1 }, { "b": 2 } ] });
    }

    #[test]
    fn add_with_accepts_custom_combinators() {
        let filter = FilterBuilder::new()
            .add_with(|a, b| Filter::or([a, b]), Filter::eq("a", 1))
            .add_with(|a, b| Filter::or([a, b]), Filter::eq("b", 2))
            .build()
            .unwrap();

        assert_eq!(filter, doc! { "$or": [ { "a": 1 }, { "b": 2 } ] });
    }

    #[test]
    fn set_and_clear_replace_state() {
        let builder = SortBuilder::from_expr(Sort::ascending(["name"])).set(Sort::descending(["age"]));
        assert_eq!(builder.build().unwrap(), doc! { "age": -1 });

        let builder = builder.clear();
        assert!(builder.is_empty());
        assert_eq!(builder.build().unwrap(), doc! { "_id": 1 });
    }

    #[test]
    fn sort_and_index_compound_in_order() {
        let sort = SortBuilder::all([Sort::ascending(["a"]), Sort::descending(["b"]), Sort::descending(["a"])]);
        assert_eq!(sort.build().unwrap(), doc! { "a": -1, "b": -1 });

        let index: IndexBuilder = [Index::ascending(["x"]), Index::hashed("y")].into_iter().collect();
        assert_eq!(index.build().unwrap(), doc! { "x": 1, "y": "hashed" });
    }

    #[test]
    fn projection_unions_fields() {
        let projection = ProjectionBuilder::new()
            .add(Projection::include(["name"]))
            .add(Projection::exclude_id())
            .build()
            .unwrap();

        assert_eq!(projection, doc! { "name": 1, "_id": 0 });
    }

    #[test]
    fn update_sets_on_different_fields_coexist() {
        let update = UpdateBuilder::new()
            .add(Update::set("a", 1))
            .add(Update::set("b", 2))
            .add(Update::unset("c"))
            .build()
            .unwrap();

        assert_eq!(update, doc! { "$set": { "a": 1, "b": 2 }, "$unset": { "c": "" } });
    }

    #[test]
    fn update_set_on_same_field_overrides() {
        let update = UpdateBuilder::all([Update::set("a", 1), Update::set("a", 5)]).build().unwrap();

        assert_eq!(update, doc! { "$set": { "a": 5 } });
    }

    #[test]
    fn update_inc_on_same_field_sums() {
        let update = UpdateBuilder::all([Update::inc("n", 1), Update::inc("n", 2_i64), Update::inc("m", 0.5)])
            .build()
            .unwrap();

        assert_eq!(update, doc! { "$inc": { "n": 3_i64, "m": 0.5 } });
    }

    #[test]
    fn update_push_on_same_field_collects_values() {
        let update = UpdateBuilder::all([
            Update::push("tags", "a"),
            Update::push("tags", doc! { "$each": ["b", "c"] }),
        ])
        .build()
        .unwrap();

        assert_eq!(update, doc! { "$push": { "tags": { "$each": ["a", "b", "c"] } } });
    }

    #[test]
    fn update_inc_overflow_fails_build() {
        let builder = UpdateBuilder::all([Update::inc("n", i64::MAX), Update::inc("n", 1_i64)]);

        assert!(matches!(builder.build(), Err(MongoLayerError::InvalidExpression(_))));
        assert_eq!(builder.current(), Some(&doc! { "$inc": { "n": i64::MAX } }));
    }

    #[test]
    fn update_inc_that_cannot_be_summed_is_never_dropped() {
        let decimal = Bson::Decimal128(bson::Decimal128::from_bytes([0; 16]));
        let builder = UpdateBuilder::new()
            .add(Update::inc("n", 5))
            .add(Update::set("a", 1))
            .add(Update::inc("n", decimal));

        assert!(matches!(builder.build(), Err(MongoLayerError::InvalidExpression(_))));
        assert_eq!(builder.current(), Some(&doc! { "$inc": { "n": 5 }, "$set": { "a": 1 } }));

        let builder = builder.set(Update::inc("n", 1));
        assert_eq!(builder.build().unwrap(), doc! { "$inc": { "n": 1 } });
    }

    #[test]
    fn failed_merge_leaves_current_expression_untouched() {
        let builder = UpdateBuilder::from_expr(Update::inc("n", i64::MAX))
            .add(Update::combine([Update::set("a", 1), Update::inc("n", 1)]).unwrap());

        assert_eq!(builder.current(), Some(&doc! { "$inc": { "n": i64::MAX } }));
        assert!(matches!(builder.build(), Err(MongoLayerError::InvalidExpression(_))));
    }
}
