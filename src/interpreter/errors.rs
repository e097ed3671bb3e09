use std::io;

use thiserror::Error;

use crate::semantics::errors::EnvironmentError;


/// Anything that stops a running program.
///
/// Most variants are ordinary runtime failures of a well-typed program. The ones for which
/// [`RuntimeError::is_fatal()`] holds mean an invariant the analyzer should have guaranteed was
/// broken, or that the recursion limit was hit.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("integer overflow in '{operator}'")]
    IntegerOverflow { operator: &'static str },
    #[error("variant holds a {actual}, not a {expected}")]
    InvalidVariantAccess { expected: String, actual: String },
    #[error("cannot cast {value} to {target}")]
    InvalidCast { value: String, target: &'static str },
    #[error("could not read '{word}' as {expected}")]
    InvalidInput { word: String, expected: String },
    #[error("input ended while reading a value")]
    UnexpectedEndOfInput,
    #[error("function '{function}' ended without returning a value")]
    MissingReturn { function: String },

    #[error("operator '{operator}' is not defined for {operands}")]
    UnsupportedOperation { operator: &'static str, operands: String },
    #[error("{0}")]
    InvalidProgram(String),
    #[error(transparent)]
    Environment(#[from] EnvironmentError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}


impl RuntimeError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::UnsupportedOperation { .. } | Self::InvalidProgram(_) => true,
            // reading a global before its initializer ran is the only lookup failure a checked
            // program can still run into
            Self::Environment(error) => !matches!(error, EnvironmentError::Uninitialized(_)),
            _ => false,
        }
    }
}
