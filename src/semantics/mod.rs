//! Name and type resolution over the AST, run before any code is executed.

pub mod errors;
pub mod symbol_table;
pub mod typechecking;
