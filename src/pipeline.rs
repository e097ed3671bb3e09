//! Runs a script from source text to its result: parse, analyze, then interpret.
//!
//! Every phase reports user-facing problems to one shared [`Diagnostics`] sink. The interpreter
//! only runs when the sink is still empty after analysis.
use std::io::{BufRead, Write};
use std::panic;
use std::thread;

use thiserror::Error;
use tracing::info;

use crate::config::{Config, ConfigError};
use crate::diagnostics::Diagnostics;
use crate::interpreter::errors::RuntimeError;
use crate::interpreter::evaluation::Interpreter;
use crate::interpreter::values::Value;
use crate::parser::ast::Program;
use crate::parser::parsing::Parser;
use crate::parser::source::CharSource;
use crate::semantics::errors::{AnalysisError, EnvironmentError};
use crate::semantics::typechecking::SemanticAnalyzer;


/// Failures that are not diagnostics about the script's text.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),
    #[error("internal error during analysis: {0}")]
    Internal(EnvironmentError),
}


impl PipelineError {
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => false,
            Self::Runtime(error) => error.is_fatal(),
            Self::Internal(_) => true,
        }
    }
}


/// The result of a run that got as far as it could.
#[derive(Debug)]
pub struct Outcome {
    pub diagnostics: Diagnostics,
    /// What `main` returned, if the program was run.
    pub return_value: Option<Value>,
}


impl Outcome {
    /// The process exit code the run asks for: the value returned by an `int` main, and zero
    /// otherwise.
    pub fn exit_code(&self) -> i32 {
        match &self.return_value {
            Some(Value::Int(n)) => *n as i32,
            _ => 0,
        }
    }
}


/// Parses, checks and runs a script read from `source`, with `stdin >>` reading from `input`
/// and `stdout <<` writing to `output`.
///
/// The interpreter runs on its own thread with a native stack sized for the configured
/// recursion limit, so hitting the limit is always reported as an error rather than
/// overflowing the stack.
///
/// # Errors
///
/// Problems with the script's text are not errors here; they are recorded in the returned
/// [`Outcome`]'s diagnostics and stop the run before the interpreter starts. Errors are only
/// returned for an unusable configuration, runtime failures and broken internal invariants.
pub fn run<S: CharSource, R: BufRead + Send, W: Write + Send>(
    source: S,
    config: &Config,
    input: R,
    mut output: W,
) -> Result<Outcome, PipelineError> {
    config.validate()?;
    let mut diagnostics = Diagnostics::new(config.diagnostic_tolerance);

    let parsed = Parser::new(source, &mut diagnostics).parse_program();
    let program = match parsed {
        Ok(program) => program,
        Err(_) => return Ok(Outcome { diagnostics, return_value: None }),
    };

    let analyzed = SemanticAnalyzer::new(&mut diagnostics).analyze(&program);
    match analyzed {
        Ok(()) | Err(AnalysisError::Aborted(_)) => {}
        Err(AnalysisError::Internal(error)) => return Err(PipelineError::Internal(error)),
    }

    if !diagnostics.is_empty() {
        info!(count = diagnostics.records().len(), "not running a program with diagnostics");
        return Ok(Outcome { diagnostics, return_value: None });
    }

    let value = interpret(&program, config, input, &mut output)?;
    output.flush().map_err(RuntimeError::from)?;

    Ok(Outcome { diagnostics, return_value: Some(value) })
}


fn interpret<R: BufRead + Send, W: Write + Send>(
    program: &Program,
    config: &Config,
    input: R,
    output: W,
) -> Result<Value, RuntimeError> {
    let recursion_limit = config.recursion_limit;

    thread::scope(|scope| -> Result<Value, RuntimeError> {
        let handle = thread::Builder::new()
            .name("interpreter".to_owned())
            .stack_size(config.interpreter_stack_size())
            .spawn_scoped(scope, move || Interpreter::new(program, recursion_limit, input, output).run())?;

        // the interpreter does not panic; if it somehow did, keep the panic
        handle.join().unwrap_or_else(|payload| panic::resume_unwind(payload))
    })
}
