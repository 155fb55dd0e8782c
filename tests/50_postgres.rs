//! Runs against a real Postgres when TEST_DATABASE_URL is set; skipped otherwise.

mod common;

use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::Result;
use filtering_system::config::DatabaseConfig;
use filtering_system::database::{DatabaseManager, MemoryCollection, PgCollection};
use filtering_system::filter::{compile_query, parse_filters, FieldPolicy};
use filtering_system::pagination::{paginate, PageRequest};
use filtering_system::types::SortOrder;
use serde_json::{json, Value};
use sqlx::PgPool;

async fn test_pool() -> Result<Option<PgPool>> {
    let Ok(url) = std::env::var("TEST_DATABASE_URL") else {
        eprintln!("TEST_DATABASE_URL not set, skipping");
        return Ok(None);
    };
    let config = DatabaseConfig { url: Some(url), max_connections: 2, connection_timeout: 5 };
    Ok(Some(DatabaseManager::connect(&config).await?))
}

fn table_name() -> Result<String> {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH)?.as_nanos();
    Ok(format!("filtering_test_{}_{}", std::process::id(), nanos))
}

fn events() -> Vec<Value> {
    vec![
        json!({ "n": 1, "d": "2024-02-01T00:00:00Z" }),
        json!({ "n": 2, "d": "2024-05-01 standup notes" }),
        json!({ "n": 3, "d": "2024-13-01" }),
        json!({ "n": 4, "d": "2023-12-31" }),
        json!({ "n": 5, "d": { "$date": "2024-03-01T00:00:00Z" } }),
        json!({ "n": 6 }),
    ]
}

fn numbers(documents: &[Value]) -> Vec<u64> {
    documents.iter().filter_map(|d| d["n"].as_u64()).collect()
}

#[tokio::test]
async fn date_filters_skip_text_that_is_not_a_date() -> Result<()> {
    common::init_tracing();
    let Some(pool) = test_pool().await? else { return Ok(()) };

    let table = table_name()?;
    let collection = PgCollection::new(pool.clone(), table.clone())?;
    collection.ensure_table().await?;
    for event in events() {
        collection.insert(&event).await?;
    }

    let criteria = parse_filters(json!({ "d": { "gte": "2024-01-01" } }))?;
    let predicate = compile_query(&criteria, &FieldPolicy::allow_all())?;
    let request = PageRequest::new(1, 10).sorted_by("n", SortOrder::Asc);
    let policy = FieldPolicy::allow_all();

    let stored = paginate(&collection, &predicate, &request, &policy, &[]).await;
    let memory = MemoryCollection::new("events", events());
    let in_memory = paginate(&memory, &predicate, &request, &policy, &[]).await?;

    sqlx::query(&format!("DROP TABLE IF EXISTS \"{}\"", table)).execute(&pool).await?;

    let stored = stored?;
    assert_eq!(numbers(&stored.data), vec![1, 5]);
    assert_eq!(stored.pagination.total, 2);
    assert_eq!(numbers(&stored.data), numbers(&in_memory.data));
    Ok(())
}
