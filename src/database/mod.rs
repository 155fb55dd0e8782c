pub mod collection;
pub mod manager;
pub mod memory;
pub mod postgres;
pub mod sql_where;

pub use collection::{Collection, CollectionError, FindQuery};
pub use manager::DatabaseManager;
pub use memory::MemoryCollection;
pub use postgres::PgCollection;
pub use sql_where::{SqlParam, SqlResult, SqlWhere};
