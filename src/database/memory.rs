//! In-process document collection.
//!
//! Matching follows document-store conventions: dotted paths walk into
//! nested objects and across arrays, equality against an array field matches
//! any element, ordered comparisons only succeed between values of the same
//! kind, and missing values sort first.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde_json::Value;

use super::collection::{attach_relation, Collection, CollectionError, FindQuery};
use crate::filter::coerce::{parse_date, ObjectId};
use crate::filter::{CompareOp, Condition, FieldTest, Operand, Predicate};
use crate::types::{SortOrder, SortSpec};

/// Compiled pattern size cap; patterns are client supplied
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

pub struct MemoryCollection {
    name: String,
    documents: Vec<Value>,
    relations: HashMap<String, Arc<MemoryCollection>>,
    id_field: String,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>, documents: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            documents,
            relations: HashMap::new(),
            id_field: "_id".to_string(),
        }
    }

    /// Registers the collection that references stored at `field` point into
    pub fn with_relation(mut self, field: impl Into<String>, related: Arc<MemoryCollection>) -> Self {
        self.relations.insert(field.into(), related);
        self
    }

    pub fn with_id_field(mut self, id_field: impl Into<String>) -> Self {
        self.id_field = id_field.into();
        self
    }

    pub fn insert(&mut self, document: Value) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Value] {
        &self.documents
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Documents matching `predicate`, in insertion order
    pub fn filter(&self, predicate: &Predicate) -> Result<Vec<&Value>, CollectionError> {
        let matcher = Matcher::new(predicate)?;
        Ok(self.documents.iter().filter(|doc| matcher.matches(predicate, doc)).collect())
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    type Record = Value;
    type Error = CollectionError;

    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: FindQuery<'_>) -> Result<Vec<Value>, CollectionError> {
        let mut matched = self.filter(query.predicate)?;
        sort_documents(&mut matched, query.sort);

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(query.limit).unwrap_or(usize::MAX);
        let mut page: Vec<Value> = matched.into_iter().skip(skip).take(limit).cloned().collect();

        for field in query.populate {
            let related = self
                .relations
                .get(field)
                .ok_or_else(|| CollectionError::UnknownRelation(field.clone()))?;
            attach_relation(&mut page, field, &related.documents, &related.id_field);
        }
        Ok(page)
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, CollectionError> {
        Ok(self.filter(predicate)?.len() as u64)
    }
}

struct Matcher {
    patterns: HashMap<String, Regex>,
}

impl Matcher {
    fn new(predicate: &Predicate) -> Result<Self, CollectionError> {
        let mut patterns = HashMap::new();
        collect_patterns(predicate, &mut patterns)?;
        Ok(Self { patterns })
    }

    fn matches(&self, predicate: &Predicate, document: &Value) -> bool {
        match predicate {
            Predicate::True => true,
            Predicate::And(parts) => parts.iter().all(|p| self.matches(p, document)),
            Predicate::Or(parts) => parts.iter().any(|p| self.matches(p, document)),
            Predicate::Condition(condition) => self.matches_condition(condition, document),
        }
    }

    fn matches_condition(&self, condition: &Condition, document: &Value) -> bool {
        let found = resolve(document, &condition.field);
        match &condition.test {
            FieldTest::Compare(CompareOp::Eq, operand) => equals_any(&found, operand),
            FieldTest::Compare(CompareOp::Ne, operand) => !equals_any(&found, operand),
            FieldTest::Compare(op, operand) => flatten(&found).any(|v| satisfies(v, operand, *op)),
            FieldTest::In(operands) => operands.iter().any(|o| equals_any(&found, o)),
            FieldTest::NotIn(operands) => !operands.iter().any(|o| equals_any(&found, o)),
            FieldTest::Pattern(pattern) => match self.patterns.get(pattern) {
                Some(re) => flatten(&found).any(|v| v.as_str().map(|s| re.is_match(s)).unwrap_or(false)),
                None => false,
            },
            FieldTest::Range { gte, lte } => {
                flatten(&found).any(|v| satisfies(v, gte, CompareOp::Gte) && satisfies(v, lte, CompareOp::Lte))
            }
            FieldTest::Exists(present) => found.is_empty() != *present,
            FieldTest::All(operands) => {
                !operands.is_empty()
                    && found.iter().any(|v| match v {
                        Value::Array(items) => operands.iter().all(|o| items.iter().any(|i| operand_equals(i, o))),
                        single => operands.iter().all(|o| operand_equals(single, o)),
                    })
            }
            FieldTest::Size(n) => found.iter().any(|v| v.as_array().map(|a| a.len() as u64 == *n).unwrap_or(false)),
            FieldTest::ElemMatch(inner) => found.iter().any(|v| {
                v.as_array()
                    .map(|items| items.iter().any(|item| self.matches(inner, item)))
                    .unwrap_or(false)
            }),
        }
    }
}

fn collect_patterns(predicate: &Predicate, out: &mut HashMap<String, Regex>) -> Result<(), CollectionError> {
    match predicate {
        Predicate::True => Ok(()),
        Predicate::And(parts) | Predicate::Or(parts) => parts.iter().try_for_each(|p| collect_patterns(p, out)),
        Predicate::Condition(Condition { test: FieldTest::Pattern(pattern), .. }) => {
            if !out.contains_key(pattern) {
                let re = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .size_limit(PATTERN_SIZE_LIMIT)
                    .build()
                    .map_err(|e| CollectionError::Query(format!("invalid pattern '{}': {}", pattern, e)))?;
                out.insert(pattern.clone(), re);
            }
            Ok(())
        }
        Predicate::Condition(Condition { test: FieldTest::ElemMatch(inner), .. }) => collect_patterns(inner, out),
        Predicate::Condition(_) => Ok(()),
    }
}

/// Values reachable at a dotted path. Arrays are crossed element-wise unless
/// the segment is a numeric index. An empty result means the field is missing.
fn resolve<'v>(document: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = vec![document];
    for segment in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(segment)),
                Value::Array(items) => match segment.parse::<usize>() {
                    Ok(index) => next.extend(items.get(index)),
                    Err(_) => next.extend(items.iter().filter_map(|item| item.as_object()?.get(segment))),
                },
                _ => {}
            }
        }
        current = next;
    }
    current
}

/// Each value, followed by its elements when it is an array
fn flatten<'a, 'v>(found: &'a [&'v Value]) -> impl Iterator<Item = &'v Value> + 'a {
    found.iter().flat_map(|&v| {
        let elements: &'v [Value] = match v {
            Value::Array(items) => items.as_slice(),
            _ => &[],
        };
        std::iter::once(v).chain(elements.iter())
    })
}

fn equals_any(found: &[&Value], operand: &Operand) -> bool {
    if found.is_empty() {
        return matches!(operand, Operand::Json(Value::Null));
    }
    flatten(found).any(|v| operand_equals(v, operand))
}

fn operand_equals(value: &Value, operand: &Operand) -> bool {
    match operand {
        Operand::Json(expected) => json_equals(value, expected),
        Operand::Date(expected) => as_date(value).as_ref() == Some(expected),
        Operand::ObjectId(expected) => as_object_id(value).as_ref() == Some(expected),
    }
}

fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn satisfies(value: &Value, operand: &Operand, op: CompareOp) -> bool {
    let Some(ordering) = compare_to_operand(value, operand) else { return false };
    match op {
        CompareOp::Eq => ordering == Ordering::Equal,
        CompareOp::Ne => ordering != Ordering::Equal,
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        CompareOp::Lte => ordering != Ordering::Greater,
    }
}

fn compare_to_operand(value: &Value, operand: &Operand) -> Option<Ordering> {
    match (value, operand) {
        (Value::Number(a), Operand::Json(Value::Number(b))) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Operand::Json(Value::String(b))) => Some(a.cmp(b)),
        (Value::Bool(a), Operand::Json(Value::Bool(b))) => Some(a.cmp(b)),
        (_, Operand::Date(expected)) => as_date(value).map(|d| d.cmp(expected)),
        (_, Operand::ObjectId(expected)) => as_object_id(value).map(|id| id.cmp(expected)),
        _ => None,
    }
}

fn as_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => parse_date(s),
        Value::Object(map) => map.get("$date").and_then(Value::as_str).and_then(parse_date),
        _ => None,
    }
}

fn as_object_id(value: &Value) -> Option<ObjectId> {
    match value {
        Value::String(s) => s.parse().ok(),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).and_then(|s| s.parse().ok()),
        _ => None,
    }
}

fn sort_documents(documents: &mut [&Value], sort: &SortSpec) {
    documents.sort_by(|a, b| {
        let ordering = sort_compare(resolve(a, &sort.field).first().copied(), resolve(b, &sort.field).first().copied());
        match sort.order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

fn sort_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            x.as_f64().unwrap_or(0.0).total_cmp(&y.as_f64().unwrap_or(0.0))
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) if matches!(x, Value::Object(_) | Value::Array(_)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    })
}
