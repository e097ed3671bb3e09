use thiserror::Error;

use crate::diagnostics::{Aborted, ErrorKind};


/// Errors raised by [`super::symbol_table::Environment`] operations.
///
/// The first group are mistakes in the user's program, which the analyzer turns into
/// diagnostics. The rest mean the caller broke the environment's contract (or the program
/// recursed too deeply) and end the run outright; see [`EnvironmentError::is_fatal()`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvironmentError {
    #[error("'{0}' is already declared in this scope")]
    NameConflict(String),
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),
    #[error("undefined type '{0}'")]
    UndefinedType(String),
    #[error("undefined function '{0}'")]
    UndefinedFunction(String),
    #[error("cannot assign to constant '{0}'")]
    ConstAssignment(String),
    #[error("'{0}' is already defined")]
    AlreadyDefined(String),
    #[error("variable '{0}' was read before being initialized")]
    Uninitialized(String),

    #[error("recursion limit reached with {depth} active stack frames")]
    RecursionLimit { depth: usize },
    #[error("no active stack frame")]
    NoActiveFrame,
    #[error("attempted to pop the argument scope of a stack frame")]
    ArgumentScopePop,
}


impl EnvironmentError {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::RecursionLimit { .. } | Self::NoActiveFrame | Self::ArgumentScopePop)
    }


    /// The diagnostic a user-level error is reported as, or `None` for fatal errors.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::NameConflict(_) | Self::AlreadyDefined(_) => Some(ErrorKind::Redefinition),
            Self::UndefinedVariable(_) | Self::UndefinedFunction(_) => Some(ErrorKind::UndefinedVariable),
            Self::UndefinedType(_) => Some(ErrorKind::UndefinedType),
            Self::ConstAssignment(_) => Some(ErrorKind::ConstAssignment),
            Self::Uninitialized(_) => Some(ErrorKind::UndefinedVariable),
            Self::RecursionLimit { .. } | Self::NoActiveFrame | Self::ArgumentScopePop => None,
        }
    }
}


/// Why semantic analysis stopped early.
#[derive(Debug, Error)]
pub enum AnalysisError {
    /// The diagnostic sink ran out of tolerance.
    #[error(transparent)]
    Aborted(#[from] Aborted),
    /// The analyzer misused its environment.
    #[error("internal error during analysis: {0}")]
    Internal(#[from] EnvironmentError),
}
