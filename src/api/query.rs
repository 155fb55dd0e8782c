use serde::{Deserialize, Serialize};

use crate::config::FilterConfig;
use crate::filter::{CriteriaParser, FilterError};
use crate::pagination::PageRequest;
use crate::types::SortOrder;

/// Query-string form of a page request:
/// `?filters={"status":{"eq":"active"}}&page=2&limit=20&sortBy=name&sortOrder=asc`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    /// JSON-encoded filter shorthand
    pub filters: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<u64>,
    pub sort_by: Option<String>,
    pub sort_order: Option<SortOrder>,
}

impl FilterQuery {
    /// Parses `filters` and fills unset fields from `config`
    pub fn into_page_request(self, parser: &CriteriaParser, config: &FilterConfig) -> Result<PageRequest, FilterError> {
        let filters = match self.filters.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => parser.parse(raw)?,
            _ => vec![],
        };

        Ok(PageRequest {
            filters,
            page: self.page.unwrap_or(1),
            limit: self.limit.unwrap_or(config.default_limit),
            sort_by: self.sort_by.unwrap_or_else(|| config.default_sort_by.clone()),
            sort_order: self.sort_order.unwrap_or_default(),
        })
    }
}
