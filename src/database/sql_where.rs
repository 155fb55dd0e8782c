use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use super::collection::CollectionError;
use crate::filter::{CompareOp, Condition, FieldTest, Operand, Predicate};
use crate::types::{SortOrder, SortSpec};

/// Column holding each stored document
pub const DATA_COLUMN: &str = "\"data\"";

/// Text that reads as a date or date-time, in the shapes filter operands are parsed from.
/// Calendar-invalid values such as `2024-13-01` still match and are left to [`DATE_CAST_FUNCTION`].
const DATE_TEXT: &str =
    "'^[0-9]{4}-[0-9]{2}-[0-9]{2}([T ][0-9]{2}:[0-9]{2}(:[0-9]{2}([.][0-9]+)?([Zz]|[+-][0-9]{2}:[0-9]{2})?)?)?$'";

/// Casts text to `timestamptz`, returning NULL where Postgres rejects the value.
pub const DATE_CAST_FUNCTION: &str = "filtering_try_timestamptz";

/// Installs [`DATE_CAST_FUNCTION`]; date filters fail without it.
pub const CREATE_DATE_CAST_FUNCTION: &str = r#"CREATE OR REPLACE FUNCTION filtering_try_timestamptz(value text)
RETURNS timestamptz
LANGUAGE plpgsql STABLE AS $fn$
BEGIN
    RETURN value::timestamptz;
EXCEPTION WHEN data_exception THEN
    RETURN NULL;
END
$fn$"#;
const OBJECT_ID_TEXT: &str = "'^[0-9a-fA-F]{24}$'";

/// Positional parameter for a generated statement
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Json(Value),
    Text(String),
    Timestamp(DateTime<Utc>),
    Int(i64),
}

impl SqlParam {
    pub fn to_json(&self) -> Value {
        match self {
            SqlParam::Json(v) => v.clone(),
            SqlParam::Text(s) => Value::String(s.clone()),
            SqlParam::Timestamp(t) => Value::String(t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            SqlParam::Int(i) => Value::from(*i),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

/// Renders a [`Predicate`] as a WHERE clause over a JSONB document column.
/// Parameters are numbered `$1..` in the order they are bound.
pub struct SqlWhere {
    params: Vec<SqlParam>,
    aliases: usize,
}

impl Default for SqlWhere {
    fn default() -> Self {
        Self::new()
    }
}

impl SqlWhere {
    pub fn new() -> Self {
        Self { params: vec![], aliases: 0 }
    }

    pub fn generate(predicate: &Predicate) -> Result<(String, Vec<SqlParam>), CollectionError> {
        let mut sql_where = Self::new();
        let clause = sql_where.clause(predicate)?;
        Ok((clause, sql_where.into_params()))
    }

    /// WHERE body for `predicate` against the document column
    pub fn clause(&mut self, predicate: &Predicate) -> Result<String, CollectionError> {
        self.render(predicate, DATA_COLUMN)
    }

    /// Binds one more parameter and returns its placeholder
    pub fn bind(&mut self, param: SqlParam) -> String {
        self.params.push(param);
        format!("${}", self.params.len())
    }

    pub fn into_params(self) -> Vec<SqlParam> {
        self.params
    }

    fn render(&mut self, predicate: &Predicate, root: &str) -> Result<String, CollectionError> {
        match predicate {
            Predicate::True => Ok("TRUE".to_string()),
            Predicate::And(parts) if parts.is_empty() => Ok("TRUE".to_string()),
            Predicate::Or(parts) if parts.is_empty() => Ok("FALSE".to_string()),
            Predicate::And(parts) => self.join(parts, root, " AND "),
            Predicate::Or(parts) => self.join(parts, root, " OR "),
            Predicate::Condition(condition) => self.condition(condition, root),
        }
    }

    fn join(&mut self, parts: &[Predicate], root: &str, joiner: &str) -> Result<String, CollectionError> {
        let mut sql_parts = Vec::with_capacity(parts.len());
        for part in parts {
            sql_parts.push(format!("({})", self.render(part, root)?));
        }
        Ok(sql_parts.join(joiner))
    }

    fn condition(&mut self, condition: &Condition, root: &str) -> Result<String, CollectionError> {
        let x = json_path(root, &condition.field)?;
        match &condition.test {
            FieldTest::Compare(CompareOp::Eq, operand) => Ok(self.equals(&x, operand)),
            FieldTest::Compare(CompareOp::Ne, operand) => {
                let eq = self.equals(&x, operand);
                Ok(format!("NOT COALESCE({}, FALSE)", eq))
            }
            FieldTest::Compare(op, operand) => {
                let op = *op;
                Ok(self.any_value(&x, |w, v| w.element_test(v, operand, op)))
            }
            FieldTest::In(operands) => Ok(self.any_of(&x, operands)),
            FieldTest::NotIn(operands) => {
                let any = self.any_of(&x, operands);
                Ok(format!("NOT COALESCE({}, FALSE)", any))
            }
            FieldTest::Pattern(pattern) => {
                let p = self.bind(SqlParam::Text(pattern.clone()));
                Ok(self.any_value(&x, |_, v| {
                    format!("jsonb_typeof({v}) = 'string' AND ({v} #>> '{{}}') ~* {p}", v = v, p = p)
                }))
            }
            FieldTest::Range { gte, lte } => Ok(self.any_value(&x, |w, v| {
                let lower = w.element_test(v, gte, CompareOp::Gte);
                let upper = w.element_test(v, lte, CompareOp::Lte);
                format!("({}) AND ({})", lower, upper)
            })),
            FieldTest::Exists(true) => Ok(format!("{} IS NOT NULL", x)),
            FieldTest::Exists(false) => Ok(format!("{} IS NULL", x)),
            FieldTest::All(operands) => {
                if operands.is_empty() {
                    return Ok("FALSE".to_string());
                }
                let parts: Vec<String> = operands
                    .iter()
                    .map(|operand| self.any_value(&x, |w, v| w.element_test(v, operand, CompareOp::Eq)))
                    .collect();
                Ok(parts.join(" AND "))
            }
            FieldTest::Size(n) => {
                let n = i64::try_from(*n).map_err(|_| CollectionError::Query(format!("array size out of range: {}", n)))?;
                let p = self.bind(SqlParam::Int(n));
                Ok(format!(
                    "CASE WHEN jsonb_typeof({x}) = 'array' THEN jsonb_array_length({x}) = {p} ELSE FALSE END",
                    x = x,
                    p = p
                ))
            }
            FieldTest::ElemMatch(inner) => {
                let alias = self.next_alias();
                let element = format!("{}.value", alias);
                let body = self.render(inner, &element)?;
                Ok(format!(
                    "EXISTS (SELECT 1 FROM jsonb_array_elements(CASE WHEN jsonb_typeof({x}) = 'array' THEN {x} ELSE '[]'::jsonb END) AS {a} WHERE {body})",
                    x = x,
                    a = alias,
                    body = body
                ))
            }
        }
    }

    /// Whole-value or element equality; an explicit null also matches a missing field
    fn equals(&mut self, x: &str, operand: &Operand) -> String {
        match operand {
            Operand::Json(Value::Null) => {
                let any = self.any_value(x, |_, v| format!("{} = 'null'::jsonb", v));
                format!("({} IS NULL OR {})", x, any)
            }
            Operand::Json(value) => {
                let p = self.bind(SqlParam::Json(value.clone()));
                let any = self.any_value(x, |_, v| format!("{} = {}::jsonb", v, p));
                format!("({} = {}::jsonb OR {})", x, p, any)
            }
            other => self.any_value(x, |w, v| w.element_test(v, other, CompareOp::Eq)),
        }
    }

    fn any_of(&mut self, x: &str, operands: &[Operand]) -> String {
        if operands.is_empty() {
            return "FALSE".to_string();
        }
        let parts: Vec<String> = operands.iter().map(|operand| self.equals(x, operand)).collect();
        format!("({})", parts.join(" OR "))
    }

    /// True when `test` holds for the value at `x` or, for arrays, any element
    fn any_value<F>(&mut self, x: &str, test: F) -> String
    where
        F: FnOnce(&mut Self, &str) -> String,
    {
        let alias = self.next_alias();
        let element = format!("{}.value", alias);
        let body = test(self, &element);
        format!(
            "EXISTS (SELECT 1 FROM jsonb_array_elements(CASE WHEN jsonb_typeof({x}) = 'array' THEN {x} ELSE jsonb_build_array({x}) END) AS {a} WHERE {body})",
            x = x,
            a = alias,
            body = body
        )
    }

    fn element_test(&mut self, v: &str, operand: &Operand, op: CompareOp) -> String {
        let sql_op = comparison_sql(op);
        match operand {
            Operand::Json(Value::Null) => match op {
                CompareOp::Eq | CompareOp::Gte | CompareOp::Lte => format!("{} = 'null'::jsonb", v),
                CompareOp::Ne => format!("{} <> 'null'::jsonb", v),
                CompareOp::Gt | CompareOp::Lt => "FALSE".to_string(),
            },
            Operand::Json(value) => {
                let p = self.bind(SqlParam::Json(value.clone()));
                if op == CompareOp::Eq {
                    format!("{} = {}::jsonb", v, p)
                } else {
                    format!("jsonb_typeof({v}) = '{t}' AND {v} {o} {p}::jsonb", v = v, t = jsonb_type(value), o = sql_op, p = p)
                }
            }
            Operand::Date(date) => {
                let p = self.bind(SqlParam::Timestamp(*date));
                let text = tagged_text(v, "$date");
                format!(
                    "CASE WHEN {t} ~ {re} THEN COALESCE({f}({t}) {o} {p}::timestamptz, FALSE) ELSE FALSE END",
                    t = text,
                    re = DATE_TEXT,
                    f = DATE_CAST_FUNCTION,
                    o = sql_op,
                    p = p
                )
            }
            Operand::ObjectId(id) => {
                let p = self.bind(SqlParam::Text(id.to_hex()));
                let text = tagged_text(v, "$oid");
                format!(
                    "CASE WHEN {t} ~ {re} THEN lower({t}) {o} {p} ELSE FALSE END",
                    t = text,
                    re = OBJECT_ID_TEXT,
                    o = sql_op,
                    p = p
                )
            }
        }
    }

    fn next_alias(&mut self) -> String {
        self.aliases += 1;
        format!("e{}", self.aliases)
    }
}

/// `ORDER BY` for a single-field sort, ties broken by insertion order.
/// Missing values sort first ascending and last descending.
pub fn order_by(sort: &SortSpec) -> Result<String, CollectionError> {
    let nulls = match sort.order {
        SortOrder::Asc => "NULLS FIRST",
        SortOrder::Desc => "NULLS LAST",
    };
    Ok(format!(
        "ORDER BY {} {} {}, \"id\" ASC",
        json_path(DATA_COLUMN, &sort.field)?,
        sort.order.to_sql(),
        nulls
    ))
}

/// `root #> '{a,b}'` for a dotted field path
pub fn json_path(root: &str, field: &str) -> Result<String, CollectionError> {
    let segments: Vec<&str> = field.split('.').collect();
    let valid = segments
        .iter()
        .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
    if !valid {
        return Err(CollectionError::Query(format!("Invalid field path: {}", field)));
    }
    Ok(format!("{} #> '{{{}}}'", root, segments.join(",")))
}

/// Text of a scalar, or of the `tag` member of an extended-JSON object
fn tagged_text(v: &str, tag: &str) -> String {
    format!(
        "(CASE WHEN jsonb_typeof({v}) = 'object' THEN {v} ->> '{tag}' ELSE {v} #>> '{{}}' END)",
        v = v,
        tag = tag
    )
}

fn comparison_sql(op: CompareOp) -> &'static str {
    match op {
        CompareOp::Eq => "=",
        CompareOp::Ne => "<>",
        CompareOp::Gt => ">",
        CompareOp::Gte => ">=",
        CompareOp::Lt => "<",
        CompareOp::Lte => "<=",
    }
}

fn jsonb_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
