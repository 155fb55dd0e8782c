pub mod types;

pub use types::{PageInfo, PageRequest, PageResult};

use thiserror::Error;
use tracing::{debug, warn};

use crate::config::FilterConfig;
use crate::database::{Collection, FindQuery};
use crate::filter::{FieldPolicy, FilterError, Predicate};

#[derive(Debug, Error)]
pub enum PaginateError<E>
where
    E: std::error::Error + 'static,
{
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// Failure from the collection, passed through unmodified
    #[error(transparent)]
    Backend(E),
}

/// Runs one page of `predicate` against `collection`.
///
/// The request is validated before the collection is touched. The page read
/// and the total count are issued together; if either fails the whole call
/// fails with that error.
pub async fn paginate<C>(
    collection: &C,
    predicate: &Predicate,
    request: &PageRequest,
    policy: &FieldPolicy,
    populate: &[String],
) -> Result<PageResult<C::Record>, PaginateError<C::Error>>
where
    C: Collection + ?Sized,
{
    validate_request(request, policy)?;

    let sort = request.sort_spec();
    let query = FindQuery {
        predicate,
        sort: &sort,
        skip: request.skip(),
        limit: request.limit,
        populate,
    };

    let (data, total) =
        futures::try_join!(collection.find(query), collection.count(predicate)).map_err(PaginateError::Backend)?;

    let pagination = PageInfo::new(total, request.page, request.limit);
    debug!(
        "Paged {}: page {} of {} ({} of {} records)",
        collection.name(),
        pagination.page,
        pagination.total_pages,
        data.len(),
        pagination.total
    );
    Ok(PageResult { data, pagination })
}

pub fn validate_request(request: &PageRequest, policy: &FieldPolicy) -> Result<(), FilterError> {
    if request.page < 1 {
        return Err(FilterError::InvalidPagination("page must be at least 1".to_string()));
    }
    if request.limit < 1 {
        return Err(FilterError::InvalidPagination("limit must be at least 1".to_string()));
    }
    policy.check_sort(&request.sort_by)
}

/// Caps the page size at the configured maximum, if any
pub fn cap_limit(mut request: PageRequest, config: &FilterConfig) -> PageRequest {
    if let Some(max) = config.max_limit {
        if request.limit > max {
            warn!("Requested limit {} exceeds maximum {}, capping", request.limit, max);
            request.limit = max;
        }
    }
    request
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCollection;
    use crate::types::SortOrder;
    use serde_json::json;

    fn numbers(n: u64) -> MemoryCollection {
        MemoryCollection::new("numbers", (1..=n).map(|i| json!({ "n": i })).collect())
    }

    #[tokio::test]
    async fn pages_through_a_collection() {
        let collection = numbers(25);
        let request = PageRequest::new(2, 10).sorted_by("n", SortOrder::Asc);
        let page = paginate(&collection, &Predicate::True, &request, &FieldPolicy::allow_all(), &[])
            .await
            .unwrap();
        assert_eq!(page.data.first(), Some(&json!({ "n": 11 })));
        assert_eq!(page.data.len(), 10);
        assert_eq!(page.pagination, PageInfo::new(25, 2, 10));
    }

    #[tokio::test]
    async fn rejects_zero_page_and_limit() {
        let collection = numbers(1);
        for request in [PageRequest::new(0, 10), PageRequest::new(1, 0)] {
            let err = paginate(&collection, &Predicate::True, &request, &FieldPolicy::allow_all(), &[])
                .await
                .unwrap_err();
            assert!(matches!(err, PaginateError::Filter(FilterError::InvalidPagination(_))));
        }
    }

    #[test]
    fn caps_limit_when_configured() {
        let mut config = FilterConfig::default();
        assert_eq!(cap_limit(PageRequest::new(1, 1000), &config).limit, 1000);
        config.max_limit = Some(100);
        assert_eq!(cap_limit(PageRequest::new(1, 1000), &config).limit, 100);
        assert_eq!(cap_limit(PageRequest::new(1, 5), &config).limit, 5);
    }
}
