pub mod types;
pub mod coerce;
pub mod parser;
pub mod predicate;
pub mod compiler;
pub mod error;

pub use types::*;
pub use coerce::{coerce_value, ObjectId};
pub use parser::{parse_filters, to_shorthand, CriteriaParser, FilterInput};
pub use predicate::{CompareOp, Condition, FieldTest, Operand, Predicate};
pub use compiler::{compile_query, CriteriaCompiler};
pub use error::FilterError;
