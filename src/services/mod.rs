pub mod filtering;

pub use filtering::FilteringService;
