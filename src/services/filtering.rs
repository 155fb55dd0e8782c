use tracing::debug;

use crate::api::FilterQuery;
use crate::config::FilterConfig;
use crate::database::Collection;
use crate::filter::{Criterion, CriteriaCompiler, CriteriaParser, FieldPolicy, FilterError, FilterInput, Predicate};
use crate::pagination::{self, PageRequest, PageResult, PaginateError};

/// Parse, compile and page in one place, configured once.
#[derive(Debug, Clone)]
pub struct FilteringService {
    config: FilterConfig,
    parser: CriteriaParser,
}

impl Default for FilteringService {
    fn default() -> Self {
        Self::new(FilterConfig::default())
    }
}

impl FilteringService {
    pub fn new(config: FilterConfig) -> Self {
        let parser = CriteriaParser::from_config(&config);
        Self { config, parser }
    }

    /// Service configured from the process-wide settings
    pub fn from_global_config() -> Self {
        Self::new(crate::config::config().filter.clone())
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn parse_filters(&self, input: impl Into<FilterInput>) -> Result<Vec<Criterion>, FilterError> {
        self.parser.parse(input)
    }

    pub fn compile_query(&self, criteria: &[Criterion], policy: &FieldPolicy) -> Result<Predicate, FilterError> {
        CriteriaCompiler::new(policy).with_parser(self.parser).compile(criteria)
    }

    /// Pages `predicate`, capping the page size at the configured maximum
    pub async fn paginate<C>(
        &self,
        collection: &C,
        predicate: &Predicate,
        request: PageRequest,
        policy: &FieldPolicy,
        populate: &[String],
    ) -> Result<PageResult<C::Record>, PaginateError<C::Error>>
    where
        C: Collection + ?Sized,
    {
        let request = pagination::cap_limit(request, &self.config);
        pagination::paginate(collection, predicate, &request, policy, populate).await
    }

    /// Query string in, page envelope out
    pub async fn find_page<C>(
        &self,
        collection: &C,
        query: FilterQuery,
        policy: &FieldPolicy,
        populate: &[String],
    ) -> Result<PageResult<C::Record>, PaginateError<C::Error>>
    where
        C: Collection + ?Sized,
    {
        let request = query.into_page_request(&self.parser, &self.config)?;
        if self.config.debug_logging {
            debug!(
                "find_page on {}: page {} limit {} sort {} {}",
                collection.name(),
                request.page,
                request.limit,
                request.sort_by,
                request.sort_order
            );
        }
        let predicate = self.compile_query(&request.filters, policy)?;
        self.paginate(collection, &predicate, request, policy, populate).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryCollection;
    use serde_json::json;

    fn inventory() -> MemoryCollection {
        MemoryCollection::new(
            "inventory",
            (1..=30)
                .map(|i| json!({ "sku": format!("SKU-{:02}", i), "qty": i, "createdAt": format!("2024-01-{:02}T00:00:00Z", i) }))
                .collect(),
        )
    }

    #[tokio::test]
    async fn find_page_runs_the_whole_pipeline() {
        let service = FilteringService::default();
        let query = FilterQuery {
            filters: Some(r#"{"qty":{"gt":20}}"#.into()),
            limit: Some(4),
            ..Default::default()
        };
        let page = service.find_page(&inventory(), query, &FieldPolicy::allow_all(), &[]).await.unwrap();
        assert_eq!(page.pagination.total, 10);
        assert_eq!(page.pagination.total_pages, 3);
        // createdAt descending by default
        assert_eq!(page.data[0]["sku"], "SKU-30");
    }

    #[tokio::test]
    async fn configured_maximum_caps_limit() {
        let service = FilteringService::new(FilterConfig { max_limit: Some(5), ..Default::default() });
        let query = FilterQuery { limit: Some(50), ..Default::default() };
        let page = service.find_page(&inventory(), query, &FieldPolicy::allow_all(), &[]).await.unwrap();
        assert_eq!(page.data.len(), 5);
        assert_eq!(page.pagination.per_page, 5);
    }

    #[test]
    fn depth_limit_follows_config() {
        let service = FilteringService::new(FilterConfig { max_nested_depth: 1, ..Default::default() });
        assert!(service.parse_filters(json!({ "a": { "eq": 1 } })).is_ok());
        assert!(service.parse_filters(json!({ "or": [{ "and": [{ "a": { "eq": 1 } }] }] })).is_err());
    }
}
