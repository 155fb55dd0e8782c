pub mod query;

pub use query::FilterQuery;
