use thiserror::Error;

/// Client-input errors raised while parsing, compiling or paging a filter.
/// Every variant maps to a 400-class response.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid criteria format")]
    InvalidCriteria { details: Option<String> },

    #[error("Between operator requires an array of two values")]
    InvalidBetween,

    #[error("Filtering by {0} is not allowed")]
    FilteringNotAllowed(String),

    #[error("Invalid sort field: {0}")]
    InvalidSortField(String),

    #[error("Invalid pagination: {0}")]
    InvalidPagination(String),
}

impl FilterError {
    pub fn invalid_criteria(details: impl Into<String>) -> Self {
        FilterError::InvalidCriteria { details: Some(details.into()) }
    }

    /// Stable machine-readable code for client handling
    pub fn code(&self) -> &'static str {
        match self {
            FilterError::InvalidCriteria { .. } => "INVALID_CRITERIA",
            FilterError::InvalidBetween => "INVALID_BETWEEN",
            FilterError::FilteringNotAllowed(_) => "FILTERING_NOT_ALLOWED",
            FilterError::InvalidSortField(_) => "INVALID_SORT_FIELD",
            FilterError::InvalidPagination(_) => "INVALID_PAGINATION",
        }
    }

    pub fn details(&self) -> Option<&str> {
        match self {
            FilterError::InvalidCriteria { details } => details.as_deref(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for FilterError {
    fn from(err: serde_json::Error) -> Self {
        FilterError::invalid_criteria(err.to_string())
    }
}
