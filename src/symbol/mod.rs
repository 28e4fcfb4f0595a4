//! Symbol model: persisted records and their hydrated counterparts.

mod records;
mod symbols;

pub use records::{method_key, split_method_key, ClassRecord, MethodRecord};
pub use symbols::{ClassSymbol, MethodSymbol, Symbol};
