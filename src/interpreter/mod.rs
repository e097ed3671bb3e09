//! Executes checked programs: runtime values, the operator and cast tables, and the tree-walking
//! interpreter itself.

pub mod values;
pub mod operators;
pub mod casts;
pub mod errors;
pub mod evaluation;
