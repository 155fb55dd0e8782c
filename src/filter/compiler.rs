use serde_json::Value;

use super::coerce::coerce_value;
use super::error::FilterError;
use super::parser::CriteriaParser;
use super::predicate::{CompareOp, FieldTest, Operand, Predicate};
use super::types::{Criterion, FieldPolicy, FilterOperator, LogicalOperator};

/// Turns criteria into a [`Predicate`], enforcing the caller's field policy.
pub struct CriteriaCompiler<'a> {
    policy: &'a FieldPolicy,
    parser: CriteriaParser,
}

impl<'a> CriteriaCompiler<'a> {
    pub fn new(policy: &'a FieldPolicy) -> Self {
        Self { policy, parser: CriteriaParser::default() }
    }

    /// Parser used for `elem_match` sub-criteria
    pub fn with_parser(mut self, parser: CriteriaParser) -> Self {
        self.parser = parser;
        self
    }

    /// Zero criteria compile to [`Predicate::True`], one to itself, more to an implicit AND.
    ///
    /// Groups and `elem_match` bodies share one nesting limit, the parser's `max_depth`.
    pub fn compile(&self, criteria: &[Criterion]) -> Result<Predicate, FilterError> {
        let predicate = self.compile_at(criteria, 1)?;
        tracing::debug!(
            "Compiled {} criteria into {} conditions: {}",
            criteria.len(),
            predicate.condition_count(),
            predicate
        );
        Ok(predicate)
    }

    fn compile_at(&self, criteria: &[Criterion], depth: usize) -> Result<Predicate, FilterError> {
        let mut conditions = self.compile_all(criteria, depth)?;
        Ok(match conditions.len() {
            0 => Predicate::True,
            1 => conditions.remove(0),
            _ => Predicate::And(conditions),
        })
    }

    fn compile_all(&self, criteria: &[Criterion], depth: usize) -> Result<Vec<Predicate>, FilterError> {
        criteria.iter().map(|c| self.compile_criterion(c, depth)).collect()
    }

    fn compile_criterion(&self, criterion: &Criterion, depth: usize) -> Result<Predicate, FilterError> {
        if depth > self.parser.max_depth() {
            return Err(FilterError::invalid_criteria(format!(
                "filters nest deeper than {} levels",
                self.parser.max_depth()
            )));
        }
        match criterion {
            Criterion::Group { criteria, .. } if criteria.is_empty() => Ok(Predicate::True),
            Criterion::Group { logical_operator, criteria } => {
                let parts = self.compile_all(criteria, depth + 1)?;
                Ok(match logical_operator {
                    LogicalOperator::And => Predicate::And(parts),
                    LogicalOperator::Or => Predicate::Or(parts),
                })
            }
            Criterion::Leaf { field, operator, value } => {
                self.policy.check_filter(field)?;
                if field.is_empty() {
                    return Err(FilterError::invalid_criteria("field name must not be empty"));
                }
                let test = self.build_test(field, *operator, value, depth)?;
                Ok(Predicate::condition(field.clone(), test))
            }
        }
    }

    fn build_test(
        &self,
        field: &str,
        operator: FilterOperator,
        value: &Value,
        depth: usize,
    ) -> Result<FieldTest, FilterError> {
        let compare = |op| FieldTest::Compare(op, coerce_value(value.clone()));
        Ok(match operator {
            FilterOperator::Eq => compare(CompareOp::Eq),
            FilterOperator::Ne => compare(CompareOp::Ne),
            FilterOperator::Gt => compare(CompareOp::Gt),
            FilterOperator::Gte => compare(CompareOp::Gte),
            FilterOperator::Lt => compare(CompareOp::Lt),
            FilterOperator::Lte => compare(CompareOp::Lte),
            FilterOperator::In => FieldTest::In(operand_list(value)),
            FilterOperator::Nin => FieldTest::NotIn(operand_list(value)),
            FilterOperator::Contains | FilterOperator::Regex => FieldTest::Pattern(pattern_source(value)),
            FilterOperator::Between => match value.as_array().map(Vec::as_slice) {
                Some([start, end]) => FieldTest::Range {
                    gte: coerce_value(start.clone()),
                    lte: coerce_value(end.clone()),
                },
                _ => return Err(FilterError::InvalidBetween),
            },
            FilterOperator::Exists => FieldTest::Exists(true),
            FilterOperator::NotExists => FieldTest::Exists(false),
            FilterOperator::ArrayContains => FieldTest::All(operand_list(value)),
            FilterOperator::ArraySize => {
                let size = value.as_u64().ok_or_else(|| {
                    FilterError::invalid_criteria(format!("array_size on '{}' requires a non-negative integer", field))
                })?;
                FieldTest::Size(size)
            }
            FilterOperator::ElemMatch => {
                if !value.is_object() {
                    return Err(FilterError::invalid_criteria(format!(
                        "elem_match on '{}' requires an object of sub-criteria",
                        field
                    )));
                }
                // sub-criteria sit one level below the field that owns them
                let sub_criteria = self.parser.parse_filters(value, depth + 1)?;
                FieldTest::ElemMatch(Box::new(self.compile_at(&sub_criteria, depth + 1)?))
            }
        })
    }
}

/// Compiles with the default parser settings.
pub fn compile_query(criteria: &[Criterion], policy: &FieldPolicy) -> Result<Predicate, FilterError> {
    CriteriaCompiler::new(policy).compile(criteria)
}

/// Arrays pass through element by element; a lone value becomes a one-element list.
fn operand_list(value: &Value) -> Vec<Operand> {
    match value {
        Value::Array(items) => items.iter().cloned().map(Operand::Json).collect(),
        other => vec![coerce_value(other.clone())],
    }
}

fn pattern_source(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
