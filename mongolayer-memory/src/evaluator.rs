//! Filter, sort and projection evaluation for in-memory documents.
//!
//! Supports the operator subset that the clause builders produce: implicit
//! equality, dotted paths, `$eq $ne $gt $gte $lt $lte $in $nin $exists $regex`,
//! field-level `$not`, and top-level `$and $or $nor`. Anything else is reported as
//! [`MongoLayerError::InvalidExpression`].

use std::cmp::Ordering;
use bson::{Bson, Document, datetime::DateTime};
use regex::{Regex, RegexBuilder};

use mongolayer_core::error::{MongoLayerError, MongoLayerResult};

use crate::path::{remove_path, resolve, set_path};

/// Comparable representation of BSON values.
///
/// Numeric types are normalized to `f64`. Values of different kinds never compare
/// with [`PartialOrd`]; [`Comparable::total_cmp`] orders them by kind instead.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Number(f64),
    String(&'a str),
    /// Fields in document order; embedded documents are equal only with equal order.
    Map(Vec<(&'a str, Comparable<'a>)>),
    Array(Vec<Comparable<'a>>),
    Binary(&'a [u8]),
    ObjectId([u8; 12]),
    Bool(bool),
    DateTime(DateTime),
    /// Any other type; never equal to anything.
    Other,
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(value.bytes()),
            Bson::Binary(binary) => Comparable::Binary(&binary.bytes),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            _ => Comparable::Other,
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Binary(a), Comparable::Binary(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            (Comparable::Binary(a), Comparable::Binary(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl<'a> Comparable<'a> {
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::Binary(_) => 5,
            Comparable::ObjectId(_) => 6,
            Comparable::Bool(_) => 7,
            Comparable::DateTime(_) => 8,
            Comparable::Other => 9,
        }
    }

    /// Orders values first by kind, then by value.
    pub(crate) fn total_cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| self.partial_cmp(other).unwrap_or(Ordering::Equal))
    }
}

/// Returns `true` if two BSON values are equal under query semantics.
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

fn invalid(message: impl Into<String>) -> MongoLayerError {
    MongoLayerError::InvalidExpression(message.into())
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Evaluates a filter expression against one document.
pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn matches(&self, filter: &Document) -> MongoLayerResult<bool> {
        for (key, value) in filter {
            let matched = match key.as_str() {
                "$and" => self.visit_and(logical_operands(key, value)?)?,
                "$or" => self.visit_or(logical_operands(key, value)?)?,
                "$nor" => !self.visit_or(logical_operands(key, value)?)?,
                op if op.starts_with('$') => return Err(invalid(format!("unsupported top-level operator {op}"))),
                field => matches_condition(resolve(self.document, field), value)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_and(&self, exprs: Vec<&Document>) -> MongoLayerResult<bool> {
        for expr in exprs {
            if !self.matches(expr)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn visit_or(&self, exprs: Vec<&Document>) -> MongoLayerResult<bool> {
        for expr in exprs {
            if self.matches(expr)? {
                return Ok(true);
            }
        }

        Ok(false)
    }
}

fn logical_operands<'f>(op: &str, value: &'f Bson) -> MongoLayerResult<Vec<&'f Document>> {
    let Bson::Array(items) = value else {
        return Err(invalid(format!("{op} expects an array")));
    };

    if items.is_empty() {
        return Err(invalid(format!("{op} expects a non-empty array")));
    }

    items
        .iter()
        .map(|item| {
            item.as_document()
                .ok_or_else(|| invalid(format!("{op} expects an array of documents")))
        })
        .collect()
}

/// Evaluates a field condition: either a literal (implicit `$eq`) or an operator document.
pub(crate) fn matches_condition(value: Option<&Bson>, condition: &Bson) -> MongoLayerResult<bool> {
    match condition {
        Bson::Document(ops) if is_operator_document(ops) => {
            for (op, operand) in ops {
                if !matches_operator(value, op, operand, ops)? {
                    return Ok(false);
                }
            }
            Ok(true)
        }
        Bson::RegularExpression(regex) => regex_matches(value, regex.pattern.as_str(), regex.options.as_str()),
        literal => Ok(equals(value, literal)),
    }
}

fn matches_operator(value: Option<&Bson>, op: &str, operand: &Bson, ops: &Document) -> MongoLayerResult<bool> {
    Ok(match op {
        "$eq" => equals(value, operand),
        "$ne" => !equals(value, operand),
        "$gt" => compare(value, operand, |ordering| ordering == Ordering::Greater),
        "$gte" => compare(value, operand, |ordering| ordering != Ordering::Less),
        "$lt" => compare(value, operand, |ordering| ordering == Ordering::Less),
        "$lte" => compare(value, operand, |ordering| ordering != Ordering::Greater),
        "$in" => in_list(value, op, operand)?,
        "$nin" => !in_list(value, op, operand)?,
        "$exists" => value.is_some() == truthy(operand),
        "$regex" => {
            let options = ops.get_str("$options").unwrap_or_default();
            match operand {
                Bson::String(pattern) => regex_matches(value, pattern, options)?,
                Bson::RegularExpression(regex) => regex_matches(value, regex.pattern.as_str(), regex.options.as_str())?,
                _ => return Err(invalid("$regex expects a string")),
            }
        }
        "$options" if ops.contains_key("$regex") => true,
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => !matches_condition(value, operand)?,
            Bson::RegularExpression(_) => !matches_condition(value, operand)?,
            _ => return Err(invalid("$not expects an operator document")),
        },
        other => return Err(invalid(format!("unsupported operator {other}"))),
    })
}

/// Candidate values for a field: the value itself and, for arrays, each element.
fn candidates(value: &Bson) -> Vec<&Bson> {
    let mut candidates = vec![value];
    if let Bson::Array(items) = value {
        candidates.extend(items.iter());
    }
    candidates
}

fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    match value {
        None => matches!(operand, Bson::Null),
        Some(value) => candidates(value)
            .into_iter()
            .any(|candidate| values_equal(candidate, operand)),
    }
}

fn compare(value: Option<&Bson>, operand: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let Some(value) = value else {
        return false;
    };

    let operand = Comparable::from(operand);
    candidates(value)
        .into_iter()
        .any(|candidate| {
            Comparable::from(candidate)
                .partial_cmp(&operand)
                .is_some_and(&accept)
        })
}

fn in_list(value: Option<&Bson>, op: &str, operand: &Bson) -> MongoLayerResult<bool> {
    let Bson::Array(items) = operand else {
        return Err(invalid(format!("{op} expects an array")));
    };

    Ok(items
        .iter()
        .any(|item| equals(value, item)))
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(flag) => *flag,
        Bson::Int32(number) => *number != 0,
        Bson::Int64(number) => *number != 0,
        Bson::Double(number) => *number != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

/// Compiles a `$regex` pattern with the driver's `i`, `m`, `s` and `x` options.
fn compile_regex(pattern: &str, options: &str) -> MongoLayerResult<Regex> {
    let mut builder = RegexBuilder::new(pattern);

    for option in options.chars() {
        match option {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(invalid(format!("unsupported regular expression option {other}"))),
        };
    }

    builder
        .build()
        .map_err(|e| invalid(format!("invalid regular expression {pattern}: {e}")))
}

fn regex_matches(value: Option<&Bson>, pattern: &str, options: &str) -> MongoLayerResult<bool> {
    let regex = compile_regex(pattern, options)?;

    let Some(value) = value else {
        return Ok(false);
    };

    Ok(candidates(value)
        .into_iter()
        .filter_map(Bson::as_str)
        .any(|text| regex.is_match(text)))
}

/// Parsed sort expression such as `{ "age": -1, "name": 1 }`.
pub(crate) struct SortOrder<'a> {
    keys: Vec<(&'a str, bool)>,
}

impl<'a> SortOrder<'a> {
    pub fn parse(sort: &'a Document) -> MongoLayerResult<Self> {
        let keys = sort
            .iter()
            .map(|(field, direction)| {
                let descending = match direction {
                    Bson::Int32(value) => *value < 0,
                    Bson::Int64(value) => *value < 0,
                    Bson::Double(value) => *value < 0.0,
                    _ => return Err(invalid(format!("sort direction for {field} must be 1 or -1"))),
                };
                Ok((field.as_str(), descending))
            })
            .collect::<MongoLayerResult<Vec<_>>>()?;

        Ok(Self { keys })
    }

    /// Missing fields sort as `null`, before every other value.
    pub fn compare(&self, a: &Document, b: &Document) -> Ordering {
        for (field, descending) in &self.keys {
            let left = resolve(a, field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);
            let right = resolve(b, field)
                .map(Comparable::from)
                .unwrap_or(Comparable::Null);

            let ordering = if *descending { right.total_cmp(&left) } else { left.total_cmp(&right) };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

/// Sorts documents in place. The sort is stable.
pub(crate) fn sort_documents(documents: &mut [Document], sort: &Document) -> MongoLayerResult<()> {
    let order = SortOrder::parse(sort)?;
    documents.sort_by(|a, b| order.compare(a, b));
    Ok(())
}

/// Applies a projection such as `{ "name": 1, "_id": 0 }`.
///
/// Inclusion and exclusion cannot be mixed, except for `_id`, which is included
/// unless explicitly excluded.
pub(crate) fn project(document: &Document, projection: &Document) -> MongoLayerResult<Document> {
    let mut include_id = true;
    let mut included = Vec::new();
    let mut excluded = Vec::new();

    for (field, flag) in projection {
        let keep = truthy(flag);
        if field == "_id" {
            include_id = keep;
        } else if keep {
            included.push(field.as_str());
        } else {
            excluded.push(field.as_str());
        }
    }

    if !included.is_empty() && !excluded.is_empty() {
        return Err(invalid("projection cannot mix inclusion and exclusion"));
    }

    if included.is_empty() {
        let mut projected = document.clone();
        for field in excluded {
            remove_path(&mut projected, field);
        }
        if !include_id {
            projected.remove("_id");
        }
        return Ok(projected);
    }

    let mut projected = Document::new();
    if include_id {
        if let Some(id) = document.get("_id") {
            projected.insert("_id", id.clone());
        }
    }
    for field in included {
        if let Some(value) = resolve(document, field) {
            set_path(&mut projected, field, value.clone())?;
        }
    }

    Ok(projected)
}
