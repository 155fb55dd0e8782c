pub mod api;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod filter;
pub mod pagination;
pub mod services;
pub mod types;

pub use error::ApiError;
pub use filter::{compile_query, parse_filters, Criterion, FieldPolicy, FilterError, Predicate};
pub use pagination::{paginate, PageRequest, PageResult, PaginateError};
