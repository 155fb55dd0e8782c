use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Value};

use super::coerce::ObjectId;

/// A compiled comparison value.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Json(Value),
    Date(DateTime<Utc>),
    ObjectId(ObjectId),
}

impl Operand {
    /// Extended-JSON rendering: dates as `{"$date"}`, ids as `{"$oid"}`
    pub fn to_document(&self) -> Value {
        match self {
            Operand::Json(v) => v.clone(),
            Operand::Date(d) => json!({ "$date": d.to_rfc3339_opts(SecondsFormat::Millis, true) }),
            Operand::ObjectId(id) => json!({ "$oid": id.to_hex() }),
        }
    }
}

impl From<Value> for Operand {
    fn from(value: Value) -> Self {
        Operand::Json(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn document_key(&self) -> &'static str {
        match self {
            CompareOp::Eq => "$eq",
            CompareOp::Ne => "$ne",
            CompareOp::Gt => "$gt",
            CompareOp::Gte => "$gte",
            CompareOp::Lt => "$lt",
            CompareOp::Lte => "$lte",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldTest {
    Compare(CompareOp, Operand),
    In(Vec<Operand>),
    NotIn(Vec<Operand>),
    /// Case-insensitive match against the raw, unescaped pattern
    Pattern(String),
    /// Inclusive on both ends
    Range { gte: Operand, lte: Operand },
    Exists(bool),
    All(Vec<Operand>),
    Size(u64),
    ElemMatch(Box<Predicate>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub test: FieldTest,
}

/// Backend-neutral compiled query condition.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Matches every document
    True,
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Condition(Condition),
}

impl Default for Predicate {
    fn default() -> Self {
        Predicate::True
    }
}

impl Predicate {
    pub fn condition(field: impl Into<String>, test: FieldTest) -> Self {
        Predicate::Condition(Condition { field: field.into(), test })
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Predicate::True)
    }

    /// Number of field conditions in the tree, counting elemMatch bodies
    pub fn condition_count(&self) -> usize {
        match self {
            Predicate::True => 0,
            Predicate::And(parts) | Predicate::Or(parts) => parts.iter().map(Predicate::condition_count).sum(),
            Predicate::Condition(Condition { test: FieldTest::ElemMatch(inner), .. }) => 1 + inner.condition_count(),
            Predicate::Condition(_) => 1,
        }
    }

    /// Renders a MongoDB query document
    pub fn to_document(&self) -> Value {
        match self {
            Predicate::True => Value::Object(Map::new()),
            Predicate::And(parts) => json!({ "$and": parts.iter().map(Predicate::to_document).collect::<Vec<_>>() }),
            Predicate::Or(parts) => json!({ "$or": parts.iter().map(Predicate::to_document).collect::<Vec<_>>() }),
            Predicate::Condition(condition) => {
                let mut doc = Map::new();
                doc.insert(condition.field.clone(), condition.test.to_document());
                Value::Object(doc)
            }
        }
    }
}

impl FieldTest {
    fn to_document(&self) -> Value {
        let operands = |values: &[Operand]| Value::Array(values.iter().map(Operand::to_document).collect());
        match self {
            FieldTest::Compare(op, operand) => {
                let mut doc = Map::new();
                doc.insert(op.document_key().to_string(), operand.to_document());
                Value::Object(doc)
            }
            FieldTest::In(values) => json!({ "$in": operands(values) }),
            FieldTest::NotIn(values) => json!({ "$nin": operands(values) }),
            FieldTest::Pattern(pattern) => json!({ "$regex": pattern, "$options": "i" }),
            FieldTest::Range { gte, lte } => json!({ "$gte": gte.to_document(), "$lte": lte.to_document() }),
            FieldTest::Exists(present) => json!({ "$exists": present }),
            FieldTest::All(values) => json!({ "$all": operands(values) }),
            FieldTest::Size(n) => json!({ "$size": n }),
            FieldTest::ElemMatch(inner) => json!({ "$elemMatch": inner.to_document() }),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_document())
    }
}
