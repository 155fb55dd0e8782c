use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::FilterError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    In,
    Nin,
    /// Case-insensitive partial match, value used as a pattern fragment
    Contains,
    /// Inclusive `[start, end]` range
    Between,
    Exists,
    NotExists,
    /// Case-insensitive pattern match with the raw value
    Regex,
    /// Array field holds every listed element
    ArrayContains,
    ArraySize,
    /// At least one array element matches every sub-criterion
    ElemMatch,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 16] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::In,
        FilterOperator::Nin,
        FilterOperator::Contains,
        FilterOperator::Between,
        FilterOperator::Exists,
        FilterOperator::NotExists,
        FilterOperator::Regex,
        FilterOperator::ArrayContains,
        FilterOperator::ArraySize,
        FilterOperator::ElemMatch,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Nin => "nin",
            FilterOperator::Contains => "contains",
            FilterOperator::Between => "between",
            FilterOperator::Exists => "exists",
            FilterOperator::NotExists => "not_exists",
            FilterOperator::Regex => "regex",
            FilterOperator::ArrayContains => "array_contains",
            FilterOperator::ArraySize => "array_size",
            FilterOperator::ElemMatch => "elem_match",
        }
    }
}

impl FromStr for FilterOperator {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FilterOperator::ALL
            .iter()
            .copied()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| {
                let known: Vec<&str> = FilterOperator::ALL.iter().map(|op| op.as_str()).collect();
                FilterError::invalid_criteria(format!(
                    "operator must be one of the following values: {} (got '{}')",
                    known.join(", "),
                    s
                ))
            })
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "and", alias = "AND")]
    And,
    #[serde(rename = "or", alias = "OR")]
    Or,
}

impl LogicalOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalOperator::And => "and",
            LogicalOperator::Or => "or",
        }
    }

    /// Recognizes a shorthand group key (`and` / `or`)
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "and" => Some(LogicalOperator::And),
            "or" => Some(LogicalOperator::Or),
            _ => None,
        }
    }
}

/// One filter predicate, or a logical grouping of predicates.
///
/// The canonical JSON form is `{ "field", "operator", "value" }` for a leaf and
/// `{ "logicalOperator", "criteria" }` for a group. Deserializing an object that
/// carries keys of both shapes (or of neither) fails.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawCriterion", into = "RawCriterion")]
pub enum Criterion {
    Leaf {
        field: String,
        operator: FilterOperator,
        value: Value,
    },
    Group {
        logical_operator: LogicalOperator,
        criteria: Vec<Criterion>,
    },
}

impl Criterion {
    pub fn leaf(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Criterion::Leaf { field: field.into(), operator, value }
    }

    pub fn and(criteria: Vec<Criterion>) -> Self {
        Criterion::Group { logical_operator: LogicalOperator::And, criteria }
    }

    pub fn or(criteria: Vec<Criterion>) -> Self {
        Criterion::Group { logical_operator: LogicalOperator::Or, criteria }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Criterion::Group { .. })
    }

    /// Nesting depth; a leaf is depth 1
    pub fn depth(&self) -> usize {
        match self {
            Criterion::Leaf { .. } => 1,
            Criterion::Group { criteria, .. } => 1 + criteria.iter().map(Criterion::depth).max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawCriterion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operator: Option<FilterOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    logical_operator: Option<LogicalOperator>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    criteria: Option<Vec<Criterion>>,
}

impl TryFrom<RawCriterion> for Criterion {
    type Error = FilterError;

    fn try_from(raw: RawCriterion) -> Result<Self, Self::Error> {
        let has_leaf_keys = raw.field.is_some() || raw.operator.is_some() || raw.value.is_some();
        let has_group_keys = raw.logical_operator.is_some() || raw.criteria.is_some();

        match (has_leaf_keys, has_group_keys) {
            (true, false) => {
                let field = raw.field.filter(|f| !f.is_empty()).ok_or_else(|| FilterError::invalid_criteria("field must be a non-empty string"))?;
                let operator = raw.operator.ok_or_else(|| FilterError::invalid_criteria(format!("missing operator for field '{}'", field)))?;
                Ok(Criterion::Leaf { field, operator, value: raw.value.unwrap_or(Value::Null) })
            }
            (false, true) => {
                let logical_operator = raw.logical_operator.ok_or_else(|| FilterError::invalid_criteria("group is missing logicalOperator"))?;
                let criteria = raw.criteria.filter(|c| !c.is_empty()).ok_or_else(|| FilterError::invalid_criteria("group criteria must not be empty"))?;
                Ok(Criterion::Group { logical_operator, criteria })
            }
            (true, true) => Err(FilterError::invalid_criteria("criterion cannot carry both a field and a logicalOperator")),
            (false, false) => Err(FilterError::invalid_criteria("criterion needs either a field or a logicalOperator")),
        }
    }
}

impl From<Criterion> for RawCriterion {
    fn from(criterion: Criterion) -> Self {
        match criterion {
            Criterion::Leaf { field, operator, value } => RawCriterion {
                field: Some(field),
                operator: Some(operator),
                value: Some(value),
                ..Default::default()
            },
            Criterion::Group { logical_operator, criteria } => RawCriterion {
                logical_operator: Some(logical_operator),
                criteria: Some(criteria),
                ..Default::default()
            },
        }
    }
}

/// Field names a caller is forbidden from filtering or sorting on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldPolicy {
    not_allowed: HashSet<String>,
}

impl FieldPolicy {
    pub fn allow_all() -> Self {
        Self::default()
    }

    pub fn deny<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { not_allowed: fields.into_iter().map(Into::into).collect() }
    }

    pub fn is_denied(&self, field: &str) -> bool {
        self.not_allowed.contains(field)
    }

    pub fn check_filter(&self, field: &str) -> Result<(), FilterError> {
        if self.is_denied(field) {
            tracing::warn!("Rejected filter on denied field '{}'", field);
            return Err(FilterError::FilteringNotAllowed(field.to_string()));
        }
        Ok(())
    }

    pub fn check_sort(&self, field: &str) -> Result<(), FilterError> {
        if self.is_denied(field) {
            tracing::warn!("Rejected sort on denied field '{}'", field);
            return Err(FilterError::InvalidSortField(field.to_string()));
        }
        Ok(())
    }
}

impl<S: Into<String>> FromIterator<S> for FieldPolicy {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::deny(iter)
    }
}
