mod common;

use anyhow::Result;
use filtering_system::filter::{
    parse_filters, to_shorthand, Criterion, CriteriaParser, FilterError, FilterOperator, LogicalOperator,
};
use serde_json::json;

#[test]
fn single_field_yields_one_leaf() -> Result<()> {
    let criteria = parse_filters(r#"{ "email": { "eq": "x@y.com" } }"#)?;
    assert_eq!(criteria, vec![Criterion::leaf("email", FilterOperator::Eq, json!("x@y.com"))]);
    Ok(())
}

#[test]
fn wire_example_parses_to_an_or_group() -> Result<()> {
    let raw = r#"{ "or": [ { "email": { "eq": "x@y.com" } }, { "status": { "in": ["active","pending"] } } ] }"#;
    let criteria = parse_filters(raw)?;
    assert_eq!(
        criteria,
        vec![Criterion::or(vec![
            Criterion::leaf("email", FilterOperator::Eq, json!("x@y.com")),
            Criterion::leaf("status", FilterOperator::In, json!(["active", "pending"])),
        ])]
    );
    Ok(())
}

#[test]
fn nested_groups_keep_shape_and_depth() -> Result<()> {
    let criteria = parse_filters(json!({
        "and": [
            { "status": { "eq": "active" } },
            { "or": [
                { "age": { "lt": 18 } },
                { "and": [{ "role": { "eq": "admin" } }, { "verified": { "exists": true } }] }
            ] }
        ]
    }))?;

    assert_eq!(criteria.len(), 1);
    assert_eq!(criteria[0].depth(), 4);
    match &criteria[0] {
        Criterion::Group { logical_operator: LogicalOperator::And, criteria } => {
            assert_eq!(criteria.len(), 2);
            assert!(matches!(&criteria[1], Criterion::Group { logical_operator: LogicalOperator::Or, criteria } if criteria.len() == 2));
        }
        other => panic!("expected an AND group, got {:?}", other),
    }
    Ok(())
}

#[test]
fn keys_keep_insertion_order() -> Result<()> {
    let criteria = parse_filters(r#"{ "zeta": { "eq": 1 }, "alpha": { "eq": 2 }, "mid": { "eq": 3 } }"#)?;
    let fields: Vec<_> = criteria
        .iter()
        .filter_map(|c| match c {
            Criterion::Leaf { field, .. } => Some(field.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(fields, vec!["zeta", "alpha", "mid"]);
    Ok(())
}

#[test]
fn shorthand_round_trip_is_idempotent() -> Result<()> {
    let original = parse_filters(json!({
        "name": { "contains": "ad" },
        "or": [{ "age": { "between": [18, 65] } }, { "tags": { "array_contains": ["vip"] } }],
        "orders": { "elem_match": { "qty": { "gt": 2 } } }
    }))?;
    let reparsed = parse_filters(to_shorthand(&original))?;
    assert_eq!(reparsed, original);
    assert_eq!(parse_filters(to_shorthand(&reparsed))?, reparsed);
    Ok(())
}

#[test]
fn canonical_form_round_trips_through_serde() -> Result<()> {
    let criteria = parse_filters(json!({ "or": [{ "age": { "gte": 21 } }, { "vip": { "eq": true } }] }))?;
    let canonical = serde_json::to_value(&criteria)?;
    assert_eq!(
        canonical,
        json!([{
            "logicalOperator": "or",
            "criteria": [
                { "field": "age", "operator": "gte", "value": 21 },
                { "field": "vip", "operator": "eq", "value": true }
            ]
        }])
    );
    let back: Vec<Criterion> = serde_json::from_value(canonical)?;
    assert_eq!(back, criteria);
    Ok(())
}

#[test]
fn ambiguous_canonical_shapes_are_rejected() {
    let both = json!({ "field": "a", "operator": "eq", "value": 1, "logicalOperator": "and", "criteria": [] });
    assert!(serde_json::from_value::<Criterion>(both).is_err());
    assert!(serde_json::from_value::<Criterion>(json!({})).is_err());
}

#[test]
fn malformed_input_is_invalid_criteria() {
    let cases = [
        json!("just a string"),
        json!({ "age": { "like": 3 } }),
        json!({ "age": { "gt": 1, "lt": 9 } }),
        json!({ "age": 42 }),
        json!([{ "a": { "eq": 1 }, "b": { "eq": 2 } }]),
        json!([{}]),
        json!({ "or": [] }),
        json!({ "": { "eq": 1 } }),
    ];
    for case in cases {
        let err = parse_filters(case.clone()).unwrap_err();
        assert!(matches!(err, FilterError::InvalidCriteria { .. }), "{} gave {:?}", case, err);
    }
    assert!(matches!(parse_filters("{ not json"), Err(FilterError::InvalidCriteria { .. })));
}

#[test]
fn depth_guard_rejects_deep_nesting() {
    let mut filters = json!({ "leaf": { "eq": 1 } });
    for _ in 0..5 {
        filters = json!({ "and": [filters] });
    }
    assert!(CriteriaParser::new(6).parse(filters.clone()).is_ok());
    assert!(CriteriaParser::new(5).parse(filters).is_err());
}
