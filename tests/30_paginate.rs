mod common;

use std::sync::Arc;

use anyhow::Result;
use common::{seeded, users, SpyCollection};
use filtering_system::database::{CollectionError, MemoryCollection};
use filtering_system::filter::{compile_query, parse_filters, FieldPolicy, FilterError, Predicate};
use filtering_system::pagination::{paginate, PageInfo, PageRequest, PaginateError};
use filtering_system::types::SortOrder;
use serde_json::json;

#[tokio::test]
async fn first_page_of_twenty_five() -> Result<()> {
    let users = seeded(25);
    let page = paginate(&users, &Predicate::True, &PageRequest::new(1, 10), &FieldPolicy::allow_all(), &[]).await?;

    assert_eq!(page.data.len(), 10);
    assert_eq!(
        page.pagination,
        PageInfo { total: 25, page: 1, per_page: 10, total_pages: 3, next_page: Some(2), prev_page: None }
    );
    // Default sort is createdAt descending
    assert_eq!(page.data[0]["name"], "user-25");
    Ok(())
}

#[tokio::test]
async fn last_page_has_no_next() -> Result<()> {
    let users = seeded(25);
    let page = paginate(&users, &Predicate::True, &PageRequest::new(3, 10), &FieldPolicy::allow_all(), &[]).await?;

    assert_eq!(page.data.len(), 5);
    assert_eq!(page.pagination.next_page, None);
    assert_eq!(page.pagination.prev_page, Some(2));
    Ok(())
}

#[tokio::test]
async fn page_beyond_the_end_is_empty_not_clamped() -> Result<()> {
    let users = seeded(25);
    let page = paginate(&users, &Predicate::True, &PageRequest::new(99, 10), &FieldPolicy::allow_all(), &[]).await?;

    assert!(page.data.is_empty());
    assert_eq!(page.pagination.page, 99);
    assert_eq!(page.pagination.total, 25);
    assert_eq!(page.pagination.next_page, None);
    assert_eq!(page.pagination.prev_page, Some(98));
    Ok(())
}

#[tokio::test]
async fn filters_and_sorting_apply_before_slicing() -> Result<()> {
    let users = seeded(25);
    let criteria = parse_filters(r#"{ "status": { "eq": "active" }, "age": { "between": [25, 40] } }"#)?;
    let predicate = compile_query(&criteria, &FieldPolicy::allow_all())?;
    let request = PageRequest::new(2, 5).sorted_by("age", SortOrder::Asc);

    let page = paginate(&users, &predicate, &request, &FieldPolicy::allow_all(), &[]).await?;

    // ages 25..=40 are users 6..=21; every third user is inactive
    assert_eq!(page.pagination.total, 10);
    assert_eq!(page.pagination.total_pages, 2);
    let ages: Vec<u64> = page.data.iter().filter_map(|u| u["age"].as_u64()).collect();
    assert_eq!(ages, vec![33, 35, 36, 38, 39]);
    Ok(())
}

#[tokio::test]
async fn denied_sort_field_never_reaches_the_collection() {
    let spy = SpyCollection::new(seeded(25));
    let policy = FieldPolicy::deny(["password"]);
    let request = PageRequest::new(1, 10).sorted_by("password", SortOrder::Asc);

    let err = paginate(&spy, &Predicate::True, &request, &policy, &[]).await.unwrap_err();

    assert!(matches!(err, PaginateError::Filter(FilterError::InvalidSortField(ref field)) if field == "password"));
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn invalid_page_never_reaches_the_collection() {
    let spy = SpyCollection::new(seeded(5));
    let err = paginate(&spy, &Predicate::True, &PageRequest::new(0, 10), &FieldPolicy::allow_all(), &[])
        .await
        .unwrap_err();

    assert!(matches!(err, PaginateError::Filter(FilterError::InvalidPagination(_))));
    assert_eq!(spy.calls(), 0);
}

#[tokio::test]
async fn find_and_count_are_both_issued() -> Result<()> {
    let spy = SpyCollection::new(seeded(25));
    paginate(&spy, &Predicate::True, &PageRequest::default(), &FieldPolicy::allow_all(), &[]).await?;
    assert_eq!((spy.finds(), spy.counts()), (1, 1));
    Ok(())
}

#[tokio::test]
async fn backend_failure_is_passed_through() {
    let spy = SpyCollection::new(seeded(25)).failing_count();
    let err = paginate(&spy, &Predicate::True, &PageRequest::default(), &FieldPolicy::allow_all(), &[])
        .await
        .unwrap_err();

    match err {
        PaginateError::Backend(CollectionError::Query(message)) => assert_eq!(message, "count unavailable"),
        other => panic!("expected backend error, got {:?}", other),
    }
}

#[tokio::test]
async fn populate_replaces_references() -> Result<()> {
    let teams = Arc::new(MemoryCollection::new(
        "teams",
        vec![json!({ "_id": "t1", "name": "Platform" }), json!({ "_id": "t2", "name": "Billing" })],
    ));
    let members: Vec<_> = users(4)
        .into_iter()
        .enumerate()
        .map(|(i, mut user)| {
            user["team"] = json!(if i % 2 == 0 { "t1" } else { "t2" });
            user
        })
        .collect();
    let collection = MemoryCollection::new("users", members).with_relation("team", teams);
    let populate = vec!["team".to_string()];
    let request = PageRequest::new(1, 10).sorted_by("name", SortOrder::Asc);

    let page = paginate(&collection, &Predicate::True, &request, &FieldPolicy::allow_all(), &populate).await?;

    assert_eq!(page.data[0]["team"], json!({ "_id": "t1", "name": "Platform" }));
    assert_eq!(page.data[1]["team"]["name"], "Billing");
    Ok(())
}
