#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use async_trait::async_trait;
use filtering_system::database::{Collection, CollectionError, FindQuery, MemoryCollection};
use filtering_system::filter::Predicate;
use serde_json::{json, Value};

static TRACING: OnceLock<()> = OnceLock::new();

/// Routes `tracing` output through the test harness; set RUST_LOG to see it
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// `count` users: every third inactive, ages 20.., one created per day of January 2024
pub fn users(count: usize) -> Vec<Value> {
    (1..=count)
        .map(|i| {
            json!({
                "_id": format!("{:024x}", i),
                "name": format!("user-{:02}", i),
                "email": format!("user{}@example.com", i),
                "status": if i % 3 == 0 { "inactive" } else { "active" },
                "age": 19 + i,
                "createdAt": format!("2024-01-{:02}T09:00:00Z", i),
                "password": "hunter2",
            })
        })
        .collect()
}

pub fn seeded(count: usize) -> MemoryCollection {
    init_tracing();
    MemoryCollection::new("users", users(count))
}

/// Wraps a collection and records how often it is read
pub struct SpyCollection {
    inner: MemoryCollection,
    finds: AtomicUsize,
    counts: AtomicUsize,
    fail_count: bool,
}

impl SpyCollection {
    pub fn new(inner: MemoryCollection) -> Self {
        Self { inner, finds: AtomicUsize::new(0), counts: AtomicUsize::new(0), fail_count: false }
    }

    /// Makes every `count` call fail
    pub fn failing_count(mut self) -> Self {
        self.fail_count = true;
        self
    }

    pub fn finds(&self) -> usize {
        self.finds.load(Ordering::SeqCst)
    }

    pub fn counts(&self) -> usize {
        self.counts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.finds() + self.counts()
    }
}

#[async_trait]
impl Collection for SpyCollection {
    type Record = Value;
    type Error = CollectionError;

    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn find(&self, query: FindQuery<'_>) -> Result<Vec<Value>, CollectionError> {
        self.finds.fetch_add(1, Ordering::SeqCst);
        self.inner.find(query).await
    }

    async fn count(&self, predicate: &Predicate) -> Result<u64, CollectionError> {
        self.counts.fetch_add(1, Ordering::SeqCst);
        if self.fail_count {
            return Err(CollectionError::Query("count unavailable".to_string()));
        }
        self.inner.count(predicate).await
    }
}
