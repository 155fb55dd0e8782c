pub mod compile;
pub mod paginate;
pub mod parse;
