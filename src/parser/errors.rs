use thiserror::Error;

use crate::diagnostics::ErrorKind;

use super::source::Position;


/// The first syntax (or lexical) error a parse ran into.
///
/// By the time a production returns this, the error and any enclosing "error parsing ..."
/// diagnostics have already been reported to the sink; the value only tells the caller that
/// no AST can be produced.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{} at {position}", kind)]
pub struct ParsingError {
    pub kind: ErrorKind,
    pub position: Position,
}


impl ParsingError {
    pub fn new(kind: ErrorKind, position: Position) -> Self {
        Self { kind, position }
    }
}
