//! Shorthand filter parsing.
//!
//! Grammar accepted from clients:
//!
//! ```text
//! filters := object | array
//! object  := { entry, ... }            one criterion per entry, in order
//! array   := [ { entry }, ... ]        exactly one entry per item
//! entry   := "and" | "or" : filters    logical group
//!          | field : { operator: value }
//! ```
//!
//! The result is a flat list of criteria; the compiler ANDs them together.

use serde_json::{Map, Value};

use super::error::FilterError;
use super::types::{Criterion, FilterOperator, LogicalOperator};
use crate::config::FilterConfig;

pub const DEFAULT_MAX_DEPTH: usize = 32;

/// Filter input in any of the shapes callers hand us.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterInput {
    /// JSON-encoded shorthand, as found in the `filters` query parameter
    Raw(String),
    Json(Value),
    /// Already-built criteria, validated and passed through
    Criteria(Vec<Criterion>),
}

impl From<&str> for FilterInput {
    fn from(s: &str) -> Self {
        FilterInput::Raw(s.to_string())
    }
}

impl From<String> for FilterInput {
    fn from(s: String) -> Self {
        FilterInput::Raw(s)
    }
}

impl From<Value> for FilterInput {
    fn from(v: Value) -> Self {
        FilterInput::Json(v)
    }
}

impl From<Vec<Criterion>> for FilterInput {
    fn from(c: Vec<Criterion>) -> Self {
        FilterInput::Criteria(c)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CriteriaParser {
    max_depth: usize,
}

impl Default for CriteriaParser {
    fn default() -> Self {
        Self { max_depth: DEFAULT_MAX_DEPTH }
    }
}

impl CriteriaParser {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth: max_depth.max(1) }
    }

    pub fn from_config(config: &FilterConfig) -> Self {
        Self::new(config.max_nested_depth as usize)
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn parse(&self, input: impl Into<FilterInput>) -> Result<Vec<Criterion>, FilterError> {
        let criteria = match input.into() {
            FilterInput::Raw(raw) => {
                let value: Value = serde_json::from_str(&raw)?;
                self.parse_value(&value)?
            }
            FilterInput::Json(value) => self.parse_value(&value)?,
            FilterInput::Criteria(criteria) => {
                for criterion in &criteria {
                    self.validate(criterion, 1)?;
                }
                criteria
            }
        };
        tracing::debug!("Parsed {} top-level filter criteria", criteria.len());
        Ok(criteria)
    }

    pub fn parse_value(&self, value: &Value) -> Result<Vec<Criterion>, FilterError> {
        match value {
            // An absent filter is the same as no filter
            Value::Null => Ok(vec![]),
            _ => self.parse_filters(value, 1),
        }
    }

    /// Parses `value` as if it sat `depth` levels down
    pub(crate) fn parse_filters(&self, value: &Value, depth: usize) -> Result<Vec<Criterion>, FilterError> {
        match value {
            Value::Object(entries) => entries
                .iter()
                .map(|(key, body)| self.parse_entry(key, body, depth))
                .collect(),
            Value::Array(items) => items.iter().map(|item| self.parse_item(item, depth)).collect(),
            other => Err(FilterError::invalid_criteria(format!(
                "filters must be an object or an array, got {}",
                json_type(other)
            ))),
        }
    }

    fn parse_item(&self, item: &Value, depth: usize) -> Result<Criterion, FilterError> {
        let entries = item
            .as_object()
            .ok_or_else(|| FilterError::invalid_criteria(format!("filter item must be an object, got {}", json_type(item))))?;
        let mut iter = entries.iter();
        match (iter.next(), iter.next()) {
            (Some((key, body)), None) => self.parse_entry(key, body, depth),
            (None, _) => Err(FilterError::invalid_criteria("filter item must not be empty")),
            (Some(_), Some(_)) => Err(FilterError::invalid_criteria(format!(
                "filter item must hold exactly one field or logical key, got {}",
                entries.len()
            ))),
        }
    }

    fn parse_entry(&self, key: &str, body: &Value, depth: usize) -> Result<Criterion, FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::invalid_criteria(format!("filters nest deeper than {} levels", self.max_depth)));
        }

        match LogicalOperator::from_key(key) {
            Some(logical_operator) => {
                let criteria = self.parse_filters(body, depth + 1)?;
                if criteria.is_empty() {
                    return Err(FilterError::invalid_criteria(format!("'{}' group must hold at least one criterion", key)));
                }
                Ok(Criterion::Group { logical_operator, criteria })
            }
            None => Self::parse_leaf(key, body),
        }
    }

    fn parse_leaf(field: &str, body: &Value) -> Result<Criterion, FilterError> {
        if field.is_empty() {
            return Err(FilterError::invalid_criteria("field name must not be empty"));
        }
        let spec = body.as_object().ok_or_else(|| {
            FilterError::invalid_criteria(format!("filter on '{}' must be an object of the form {{ operator: value }}", field))
        })?;
        let mut iter = spec.iter();
        match (iter.next(), iter.next()) {
            (Some((operator, value)), None) => {
                let operator: FilterOperator = operator.parse()?;
                Ok(Criterion::leaf(field, operator, value.clone()))
            }
            _ => Err(FilterError::invalid_criteria(format!(
                "filter on '{}' must name exactly one operator, got {}",
                field,
                spec.len()
            ))),
        }
    }

    fn validate(&self, criterion: &Criterion, depth: usize) -> Result<(), FilterError> {
        if depth > self.max_depth {
            return Err(FilterError::invalid_criteria(format!("filters nest deeper than {} levels", self.max_depth)));
        }
        match criterion {
            Criterion::Leaf { field, .. } if field.is_empty() => {
                Err(FilterError::invalid_criteria("field name must not be empty"))
            }
            Criterion::Leaf { .. } => Ok(()),
            Criterion::Group { criteria, .. } if criteria.is_empty() => {
                Err(FilterError::invalid_criteria("group must hold at least one criterion"))
            }
            Criterion::Group { criteria, .. } => criteria.iter().try_for_each(|c| self.validate(c, depth + 1)),
        }
    }
}

/// Parses with the default depth limit.
pub fn parse_filters(input: impl Into<FilterInput>) -> Result<Vec<Criterion>, FilterError> {
    CriteriaParser::default().parse(input)
}

/// Renders criteria back to the array shorthand accepted by [`parse_filters`].
pub fn to_shorthand(criteria: &[Criterion]) -> Value {
    Value::Array(criteria.iter().map(criterion_to_shorthand).collect())
}

fn criterion_to_shorthand(criterion: &Criterion) -> Value {
    let mut entry = Map::new();
    match criterion {
        Criterion::Leaf { field, operator, value } => {
            let mut spec = Map::new();
            spec.insert(operator.as_str().to_string(), value.clone());
            entry.insert(field.clone(), Value::Object(spec));
        }
        Criterion::Group { logical_operator, criteria } => {
            entry.insert(logical_operator.as_str().to_string(), to_shorthand(criteria));
        }
    }
    Value::Object(entry)
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
