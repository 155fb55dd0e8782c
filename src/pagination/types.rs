use serde::{Deserialize, Serialize};

use crate::filter::Criterion;
use crate::types::{SortOrder, SortSpec};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 10;
pub const DEFAULT_SORT_BY: &str = "createdAt";

/// One page worth of query: filters, position and ordering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PageRequest {
    pub filters: Vec<Criterion>,
    pub page: u64,
    pub limit: u64,
    pub sort_by: String,
    pub sort_order: SortOrder,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            filters: vec![],
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
            sort_by: DEFAULT_SORT_BY.to_string(),
            sort_order: SortOrder::default(),
        }
    }
}

impl PageRequest {
    pub fn new(page: u64, limit: u64) -> Self {
        Self { page, limit, ..Default::default() }
    }

    pub fn with_filters(mut self, filters: Vec<Criterion>) -> Self {
        self.filters = filters;
        self
    }

    pub fn sorted_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = field.into();
        self.sort_order = order;
        self
    }

    /// Records before this page
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }

    pub fn sort_spec(&self) -> SortSpec {
        SortSpec::new(self.sort_by.clone(), self.sort_order)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
    pub next_page: Option<u64>,
    pub prev_page: Option<u64>,
}

impl PageInfo {
    /// Page metadata for `total` matches. The requested page is reported as
    /// is, even past the last page.
    pub fn new(total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = if per_page == 0 { 0 } else { total.div_ceil(per_page) };
        Self {
            total,
            page,
            per_page,
            total_pages,
            next_page: (page < total_pages).then(|| page + 1),
            prev_page: (page > 1).then(|| page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult<T> {
    pub data: Vec<T>,
    pub pagination: PageInfo,
}

impl<T> PageResult<T> {
    pub fn map<U, F>(self, f: F) -> PageResult<U>
    where
        F: FnMut(T) -> U,
    {
        PageResult { data: self.data.into_iter().map(f).collect(), pagination: self.pagination }
    }

    pub fn try_map<U, E, F>(self, f: F) -> Result<PageResult<U>, E>
    where
        F: FnMut(T) -> Result<U, E>,
    {
        Ok(PageResult {
            data: self.data.into_iter().map(f).collect::<Result<_, _>>()?,
            pagination: self.pagination,
        })
    }
}
