//! Settings that shape a single run of a script.
use thiserror::Error;

/// How deep calls may nest before the run is stopped.
pub const DEFAULT_RECURSION_LIMIT: usize = 200;

/// The deepest recursion limit the interpreter thread can be given a stack for.
pub const MAX_RECURSION_LIMIT: usize = 8192;

/// How many semantic warnings are tolerated before analysis gives up.
pub const DEFAULT_DIAGNOSTIC_TOLERANCE: usize = 10;

/// Native stack reserved for each script-level call. One call passes through the block,
/// statement, expression and postfix evaluators, several times over for nested constructs.
const STACK_PER_CALL: usize = 128 * 1024;

/// Native stack reserved for `main` itself and for deeply nested code outside any call.
const BASE_STACK: usize = 16 * 1024 * 1024;


/// Settings that cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("recursion limit must be between 1 and {max}, got {limit}")]
    RecursionLimit { limit: usize, max: usize },
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub recursion_limit: usize,
    pub diagnostic_tolerance: usize,
}


impl Config {
    /// Checks that the settings can actually be honoured.
    ///
    /// # Errors
    ///
    /// [`ConfigError::RecursionLimit`] if the limit is zero or above [`MAX_RECURSION_LIMIT`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.recursion_limit == 0 || self.recursion_limit > MAX_RECURSION_LIMIT {
            return Err(ConfigError::RecursionLimit { limit: self.recursion_limit, max: MAX_RECURSION_LIMIT });
        }

        Ok(())
    }


    /// Size of the native stack the interpreter runs on, enough for `recursion_limit` nested
    /// calls.
    pub fn interpreter_stack_size(&self) -> usize {
        BASE_STACK + self.recursion_limit.min(MAX_RECURSION_LIMIT) * STACK_PER_CALL
    }
}


impl Default for Config {
    fn default() -> Self {
        Self {
            recursion_limit: DEFAULT_RECURSION_LIMIT,
            diagnostic_tolerance: DEFAULT_DIAGNOSTIC_TOLERANCE,
        }
    }
}
