//! This module contains everything necessary to go from a file of source code to an abstract
//! syntax tree (AST) of that source code. That AST is then checked by the semantic analyzer and
//! executed by the interpreter.

pub mod source;
pub mod lexing;
pub mod token;
pub mod errors;
pub mod ast;
pub mod parsing;
pub mod types;
