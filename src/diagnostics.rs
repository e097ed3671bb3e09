//! The diagnostic table and the sink every phase reports into.
//!
//! Every user-facing problem is one [`ErrorKind`]. The kinds form a closed, versioned table
//! grouped into lexical, syntax and semantic categories; each kind has a fixed message and the
//! category supplies a fixed label. The table is part of the external contract, so kinds are
//! only ever appended and [`ERROR_TABLE_VERSION`] is bumped when that happens.
//!
//! [`Diagnostics`] records what it is told and decides when the run has to stop: an
//! [`Severity::Error`] aborts immediately, while [`Severity::Warning`] diagnostics accumulate
//! until the configured tolerance is exceeded.
use std::fmt;

use thiserror::Error;
use tracing::debug;

use crate::parser::source::Position;


/// Version of the [`ErrorKind`] table.
pub const ERROR_TABLE_VERSION: u32 = 1;


/// The three groups diagnostics belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Lexical,
    Syntax,
    Semantic,
}


impl Category {
    /// The fixed human-readable label printed in front of every message of this category.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Lexical => "Lexical error",
            Self::Syntax => "Syntax error",
            Self::Semantic => "Semantic error",
        }
    }
}


/// Every diagnostic the front end and analyzer can produce.
///
/// The `Display` text of a kind is its message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ErrorKind {
    // Lexical
    #[error("invalid number literal")]
    InvalidNumberLiteral,
    #[error("invalid char literal")]
    InvalidCharLiteral,
    #[error("missing closing quote")]
    MissingClosingQuote,
    #[error("unexpected character")]
    UnexpectedCharacter,
    #[error("unexpected end of file")]
    UnexpectedEndOfFile,

    // Syntax: program level
    #[error("expected a definition")]
    ExpectedDefinition,
    #[error("missing main function")]
    MissingMain,
    #[error("name already used by another top-level definition")]
    DefinitionNameConflict,

    // Syntax: variable definitions
    #[error("expected identifier in var definition")]
    VarDefExpectedIdentifier,
    #[error("expected colon in var definition")]
    VarDefExpectedColon,
    #[error("expected type in var definition")]
    VarDefExpectedType,
    #[error("expected '=' in var definition")]
    VarDefExpectedAssign,
    #[error("expected semicolon after var definition")]
    VarDefExpectedSemicolon,
    #[error("error parsing var definition")]
    VarDefFailed,

    // Syntax: constant definitions
    #[error("expected identifier in const definition")]
    ConstDefExpectedIdentifier,
    #[error("expected colon in const definition")]
    ConstDefExpectedColon,
    #[error("expected type in const definition")]
    ConstDefExpectedType,
    #[error("expected '=' in const definition")]
    ConstDefExpectedAssign,
    #[error("expected semicolon after const definition")]
    ConstDefExpectedSemicolon,
    #[error("error parsing const definition")]
    ConstDefFailed,

    // Syntax: struct definitions
    #[error("expected type name in struct definition")]
    StructDefExpectedTypeName,
    #[error("expected '{{' in struct definition")]
    StructDefExpectedOpeningBrace,
    #[error("expected colon after struct member name")]
    StructMemberExpectedColon,
    #[error("expected type of struct member")]
    StructMemberExpectedType,
    #[error("expected semicolon after struct member")]
    StructMemberExpectedSemicolon,
    #[error("expected '}}' in struct definition")]
    StructDefExpectedClosingBrace,
    #[error("expected semicolon after struct definition")]
    StructDefExpectedSemicolon,
    #[error("error parsing struct definition")]
    StructDefFailed,

    // Syntax: variant definitions
    #[error("expected type name in variant definition")]
    VariantDefExpectedTypeName,
    #[error("expected '{{' in variant definition")]
    VariantDefExpectedOpeningBrace,
    #[error("expected '}}' in variant definition")]
    VariantDefExpectedClosingBrace,
    #[error("expected semicolon after variant definition")]
    VariantDefExpectedSemicolon,
    #[error("error parsing variant definition")]
    VariantDefFailed,

    // Syntax: function definitions
    #[error("expected identifier in function definition")]
    FnDefExpectedIdentifier,
    #[error("expected '(' in function definition")]
    FnDefExpectedOpeningParen,
    #[error("expected ')' in function definition")]
    FnDefExpectedClosingParen,
    #[error("expected '->' in function definition")]
    FnDefExpectedArrow,
    #[error("expected return type in function definition")]
    FnDefExpectedReturnType,
    #[error("expected function body")]
    FnDefExpectedBody,
    #[error("expected parameter name")]
    ParamExpectedIdentifier,
    #[error("expected colon after parameter name")]
    ParamExpectedColon,
    #[error("expected parameter type")]
    ParamExpectedType,
    #[error("error parsing function definition")]
    FnDefFailed,

    // Syntax: statements
    #[error("expected '{{' to open a block")]
    ExpectedBlock,
    #[error("expected '}}' to close a block")]
    BlockExpectedClosingBrace,
    #[error("expected semicolon after statement")]
    ExpectedSemicolon,
    #[error("expected identifier after 'for'")]
    ForExpectedIdentifier,
    #[error("expected 'in' in for statement")]
    ForExpectedIn,
    #[error("expected 'until' in for statement")]
    ForExpectedUntil,
    #[error("expected '{{' after match expression")]
    MatchExpectedOpeningBrace,
    #[error("expected 'case' or '}}' in match statement")]
    MatchExpectedCase,
    #[error("expected type name after 'case'")]
    CaseExpectedType,
    #[error("expected '->' after case type")]
    CaseExpectedArrow,
    #[error("type already has a case in this match")]
    DuplicateMatchCase,
    #[error("expected '>>' in stdin statement")]
    StdinExpectedExtraction,
    #[error("expected '<<' in stdout statement")]
    StdoutExpectedInsertion,

    // Syntax: expressions
    #[error("expected expression")]
    ExpectedExpression,
    #[error("expected ')'")]
    ExpectedClosingParen,
    #[error("expected member name after '.'")]
    MemberExpectedIdentifier,
    #[error("expected type name after 'as'")]
    AsExpectedType,
    #[error("expected '(' after cast type")]
    CastExpectedOpeningParen,
    #[error("expected member name in object")]
    ObjectExpectedIdentifier,
    #[error("expected colon after object member name")]
    ObjectExpectedColon,
    #[error("expected '}}' to close object")]
    ObjectExpectedClosingBrace,
    #[error("object member given twice")]
    DuplicateObjectMember,

    // Semantic
    #[error("name is already defined")]
    Redefinition,
    #[error("type is not defined")]
    UndefinedType,
    #[error("variable is not defined")]
    UndefinedVariable,
    #[error("type mismatch")]
    TypeMismatch,
    #[error("operator is not defined for these operand types")]
    InvalidOperandTypes,
    #[error("cannot assign to a constant")]
    ConstAssignment,
    #[error("expression cannot be assigned to")]
    NotAssignable,
    #[error("expression is not callable")]
    NotCallable,
    #[error("wrong number of arguments")]
    ArgumentCountMismatch,
    #[error("struct has no such member")]
    UnknownMember,
    #[error("invalid cast")]
    InvalidCast,
    #[error("expression is not a variant")]
    NotAVariant,
    #[error("type is not a member of the variant")]
    NotAVariantMember,
    #[error("variant has no member types")]
    EmptyVariant,
    #[error("variant lists a member type twice")]
    DuplicateVariantMember,
    #[error("object does not match the expected struct")]
    ObjectMismatch,
    #[error("object literal needs an expected struct type")]
    UntypedObject,
    #[error("condition must be bool")]
    ConditionNotBool,
    #[error("range bounds must be int")]
    RangeNotInt,
    #[error("break outside of a loop")]
    BreakOutsideLoop,
    #[error("continue outside of a loop")]
    ContinueOutsideLoop,
    #[error("returned value does not match the function's return type")]
    ReturnTypeMismatch,
    #[error("variable cannot have type void")]
    VoidVariable,
    #[error("value cannot be written to stdout")]
    NotPrintable,
    #[error("value cannot be read from stdin")]
    NotReadable,
    #[error("main must not take parameters")]
    InvalidMainSignature,
}


impl ErrorKind {
    /// The group this kind belongs to.
    pub fn category(&self) -> Category {
        use ErrorKind::*;
        match self {
            InvalidNumberLiteral
            | InvalidCharLiteral
            | MissingClosingQuote
            | UnexpectedCharacter
            | UnexpectedEndOfFile => Category::Lexical,

            Redefinition
            | UndefinedType
            | UndefinedVariable
            | TypeMismatch
            | InvalidOperandTypes
            | ConstAssignment
            | NotAssignable
            | NotCallable
            | ArgumentCountMismatch
            | UnknownMember
            | InvalidCast
            | NotAVariant
            | NotAVariantMember
            | EmptyVariant
            | DuplicateVariantMember
            | ObjectMismatch
            | UntypedObject
            | ConditionNotBool
            | RangeNotInt
            | BreakOutsideLoop
            | ContinueOutsideLoop
            | ReturnTypeMismatch
            | VoidVariable
            | NotPrintable
            | NotReadable
            | InvalidMainSignature => Category::Semantic,

            _ => Category::Syntax,
        }
    }
}


/// How a diagnostic affects the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Recorded, then the run stops.
    Error,
    /// Recorded; the run stops once more of these than the tolerance have been seen.
    Warning,
}


/// A single recorded problem.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: ErrorKind,
    pub position: Position,
    pub severity: Severity,
}


impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}: {} at {}", self.kind.category().label(), self.kind, self.position)
    }
}


/// Signals that the sink has decided the run must stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("run aborted after reported diagnostics")]
pub struct Aborted;


/// Collects diagnostics from every phase of a run.
#[derive(Debug)]
pub struct Diagnostics {
    records: Vec<Diagnostic>,
    tolerance: usize,
    warnings: usize,
}


impl Diagnostics {
    /// Creates an empty sink that tolerates up to `tolerance` warnings.
    pub fn new(tolerance: usize) -> Self {
        Self { records: vec![], tolerance, warnings: 0 }
    }


    /// Records a diagnostic and tells the caller whether it may carry on.
    ///
    /// # Errors
    ///
    /// Returns [`Aborted`] for every [`Severity::Error`], and for a [`Severity::Warning`] once
    /// the number of warnings exceeds the tolerance.
    pub fn report(&mut self, kind: ErrorKind, position: Position, severity: Severity) -> Result<(), Aborted> {
        debug!(%position, ?kind, ?severity, "diagnostic reported");
        self.records.push(Diagnostic { kind, position, severity });

        match severity {
            Severity::Error => Err(Aborted),
            Severity::Warning => {
                self.warnings += 1;
                if self.warnings > self.tolerance {
                    Err(Aborted)
                } else {
                    Ok(())
                }
            }
        }
    }


    /// Everything reported so far, oldest first.
    pub fn records(&self) -> &[Diagnostic] {
        &self.records
    }


    /// The kinds of all recorded diagnostics, in the order they were reported.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.records.iter().map(|d| d.kind).collect()
    }


    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
