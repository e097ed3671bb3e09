//! The tree-walking [`Interpreter`].
//!
//! Programs are executed directly from the AST. Every statement returns a [`Flow`] telling the
//! enclosing construct whether to carry on, or to unwind for a `break`, `continue` or `return`.
//! Loops absorb `Break` and `Continue` and function calls absorb `Return`, so no other construct
//! needs to know about them beyond passing them upwards.
use std::collections::VecDeque;
use std::io::{BufRead, Write};

use indexmap::IndexMap;
use tracing::{debug, info, trace};

use crate::parser::ast::*;
use crate::parser::types::{FunctionType, Type, TypeId};
use crate::semantics::errors::EnvironmentError;
use crate::semantics::symbol_table::{Environment, Modifier};

use super::casts;
use super::errors::RuntimeError;
use super::operators;
use super::values::{coerce, Value};


type RunResult<T> = Result<T, RuntimeError>;


/// How control leaves a statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow {
    Normal,
    Continue,
    Break,
    Return(Value),
}


/// Tree-walking interpreter for a program that passed analysis.
pub struct Interpreter<'p, R: BufRead, W: Write> {
    program: &'p Program,
    env: Environment,
    input: R,
    output: W,
    /// Words read from the input but not yet consumed by `stdin >>`.
    pending_input: VecDeque<String>,
    last_return_value: Option<Value>,
}


impl<'p, R: BufRead, W: Write> Interpreter<'p, R, W> {
    /// Prepares to run `program`, allowing at most `recursion_limit` nested calls. `stdin >>`
    /// reads whitespace separated words from `input` and `stdout <<` writes to `output`.
    pub fn new(program: &'p Program, recursion_limit: usize, input: R, output: W) -> Self {
        Self {
            program,
            env: Environment::new(recursion_limit),
            input,
            output,
            pending_input: VecDeque::new(),
            last_return_value: None,
        }
    }


    /// Runs a program which has passed semantic analysis and returns what `main` returned.
    ///
    /// Types and functions are registered first. Global variables are then all declared
    /// before their initializers run in source order, so an initializer may call any function
    /// but only read globals defined above it.
    pub fn run(&mut self) -> RunResult<Value> {
        info!("interpreting program");
        let program = self.program;

        for definition in &program.definitions {
            match definition {
                Definition::Struct(def) => self.register_struct(def)?,
                Definition::Variant(def) => self.register_variant(def)?,
                _ => {}
            }
        }

        for (index, definition) in program.definitions.iter().enumerate() {
            if let Definition::Fn(def) = definition {
                self.register_function(def, index)?;
            }
        }

        let mut globals: Vec<(&VarDef, TypeId)> = vec![];
        for definition in &program.definitions {
            let (def, modifier) = match definition {
                Definition::Var(def) => (def, Modifier::Mutable),
                Definition::Const(def) => (def, Modifier::Const),
                _ => continue,
            };

            let ty = self.env.get_type(&def.type_name)?;
            self.env.declare_var(&def.name, ty, modifier)?;
            globals.push((def, ty));
        }

        for (def, ty) in globals {
            let value = self.eval_expression(&def.initializer)?;
            let value = coerce(value, ty, self.env.types());
            debug!(name = def.name.as_str(), %value, "initialized global");
            self.env.define_var(&def.name, value)?;
        }

        let value = self.call_function("main", vec![])?;
        self.output.flush()?;
        info!(%value, "main returned");

        self.last_return_value = Some(value.clone());
        Ok(value)
    }


    pub fn last_return_value(&self) -> Option<&Value> {
        self.last_return_value.as_ref()
    }


    fn register_struct(&mut self, def: &StructDef) -> RunResult<()> {
        let mut members: IndexMap<String, TypeId> = IndexMap::new();
        for member in &def.members {
            members.insert(member.name.clone(), self.env.get_type(&member.type_name)?);
        }

        self.env.define_type(&def.name, Type::Struct(members))?;
        Ok(())
    }


    fn register_variant(&mut self, def: &VariantDef) -> RunResult<()> {
        let members = def.members.iter()
            .map(|name| self.env.get_type(name))
            .collect::<Result<Vec<TypeId>, EnvironmentError>>()?;

        self.env.define_type(&def.name, Type::Variant(members))?;
        Ok(())
    }


    fn register_function(&mut self, def: &FnDef, index: usize) -> RunResult<()> {
        let mut params: Vec<(String, TypeId, Modifier)> = vec![];
        for param in &def.params {
            let ty = self.env.get_type(&param.type_name)?;
            params.push((param.name.clone(), ty, Modifier::from_const(param.constant)));
        }

        let return_type = self.env.get_type(&def.return_type)?;
        self.env.declare_fn(&def.name, params, return_type)?;
        self.env.define_fn(&def.name, index)?;
        Ok(())
    }


    /// Calls a function with already evaluated arguments.
    fn call_function(&mut self, name: &str, args: Vec<Value>) -> RunResult<Value> {
        let entry = self.env.get_fn(name)?.clone();
        let FunctionType { params, return_type, body } = match self.env.resolve_type(entry.signature) {
            Type::Function(function) => function.clone(),
            other => return Err(RuntimeError::InvalidProgram(format!("'{}' has non-function type {:?}", name, other))),
        };

        let program = self.program;
        let def = match body.and_then(|index| program.definitions.get(index)) {
            Some(Definition::Fn(def)) => def,
            _ => return Err(RuntimeError::InvalidProgram(format!("function '{}' has no body", name))),
        };

        if args.len() != params.len() {
            return Err(RuntimeError::InvalidProgram(format!(
                "'{}' takes {} arguments but was given {}", name, params.len(), args.len()
            )));
        }

        self.env.push_stack_frame(name)?;
        trace!(function = name, depth = self.env.depth(), "calling function");

        let flow = self.bind_arguments(&entry.params, &params, args)
            .and_then(|_| self.exec_block(&def.body));
        self.env.pop_stack_frame()?;

        match flow? {
            Flow::Return(value) => Ok(coerce(value, return_type, self.env.types())),
            _ if return_type == TypeId::VOID => Ok(Value::Void),
            _ => Err(RuntimeError::MissingReturn { function: name.to_owned() }),
        }
    }


    fn bind_arguments(&mut self, names: &[(String, Modifier)], types: &[TypeId], args: Vec<Value>) -> RunResult<()> {
        for (((name, modifier), ty), arg) in names.iter().zip(types).zip(args) {
            self.env.declare_var(name, *ty, *modifier)?;
            let value = coerce(arg, *ty, self.env.types());
            self.env.define_var(name, value)?;
        }

        Ok(())
    }


    /// Runs a block in its own scope, stopping at the first statement that does not complete
    /// normally.
    fn exec_block(&mut self, block: &Block) -> RunResult<Flow> {
        self.env.enter_scope()?;

        let mut flow = Ok(Flow::Normal);
        for statement in &block.statements {
            flow = self.exec_statement(statement);
            if !matches!(flow, Ok(Flow::Normal)) {
                break;
            }
        }

        self.env.exit_scope()?;
        flow
    }


    fn exec_statement(&mut self, statement: &Statement) -> RunResult<Flow> {
        match &statement.kind {
            StatementKind::VarDef(def) => self.exec_variable(def, Modifier::Mutable),
            StatementKind::ConstDef(def) => self.exec_variable(def, Modifier::Const),

            StatementKind::Expression(expression) => {
                self.eval_expression(expression)?;
                Ok(Flow::Normal)
            }

            StatementKind::Assignment { target, value } => {
                let value = self.eval_expression(value)?;
                self.store(target, value)?;
                Ok(Flow::Normal)
            }

            StatementKind::StdinExtraction(targets) => {
                for target in targets {
                    let ty = self.place_type(target)?;
                    let value = self.read_value(ty)?;
                    self.store(target, value)?;
                }
                Ok(Flow::Normal)
            }

            StatementKind::StdoutInsertion(values) => {
                for expression in values {
                    let value = self.eval_expression(expression)?;
                    write!(self.output, "{}", value)?;
                }
                self.output.flush()?;
                Ok(Flow::Normal)
            }

            StatementKind::VariantMatch(variant_match) => self.exec_match(variant_match),
            StatementKind::Block(block) => self.exec_block(block),

            StatementKind::If(if_stmt) => {
                if self.eval_condition(&if_stmt.condition)? {
                    return self.exec_block(&if_stmt.then_block);
                }

                for (condition, block) in &if_stmt.elifs {
                    if self.eval_condition(condition)? {
                        return self.exec_block(block);
                    }
                }

                match &if_stmt.else_block {
                    Some(block) => self.exec_block(block),
                    None => Ok(Flow::Normal),
                }
            }

            StatementKind::For(for_stmt) => self.exec_for(for_stmt),

            StatementKind::While { condition, body } => {
                while self.eval_condition(condition)? {
                    match self.exec_block(body)? {
                        Flow::Break => break,
                        Flow::Normal | Flow::Continue => {}
                        flow @ Flow::Return(_) => return Ok(flow),
                    }
                }
                Ok(Flow::Normal)
            }

            StatementKind::Continue => Ok(Flow::Continue),
            StatementKind::Break => Ok(Flow::Break),

            StatementKind::Return(value) => {
                let value = match value {
                    Some(expression) => self.eval_expression(expression)?,
                    None => Value::Void,
                };
                Ok(Flow::Return(value))
            }
        }
    }


    fn exec_variable(&mut self, def: &VarDef, modifier: Modifier) -> RunResult<Flow> {
        let value = self.eval_expression(&def.initializer)?;
        let ty = self.env.get_type(&def.type_name)?;
        let value = coerce(value, ty, self.env.types());

        self.env.declare_var(&def.name, ty, modifier)?;
        self.env.define_var(&def.name, value)?;
        Ok(Flow::Normal)
    }


    /// Runs `for i in start until end`: the bounds are evaluated once and each iteration gets a
    /// fresh constant `i` in a scope wrapping the body.
    fn exec_for(&mut self, for_stmt: &ForStmt) -> RunResult<Flow> {
        let start = self.eval_int(&for_stmt.start)?;
        let end = self.eval_int(&for_stmt.end)?;

        for i in start..end {
            self.env.enter_scope()?;
            let flow = self.env.declare_var(&for_stmt.variable, TypeId::INT, Modifier::Const)
                .and_then(|_| self.env.define_var(&for_stmt.variable, Value::Int(i)))
                .map_err(RuntimeError::from)
                .and_then(|_| self.exec_block(&for_stmt.body));
            self.env.exit_scope()?;

            match flow? {
                Flow::Break => break,
                Flow::Normal | Flow::Continue => {}
                flow @ Flow::Return(_) => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }


    /// Runs the case whose type is the scrutinee's active member type, if there is one.
    fn exec_match(&mut self, variant_match: &VariantMatch) -> RunResult<Flow> {
        let active = match self.eval_expression(&variant_match.scrutinee)? {
            Value::Variant { type_id, .. } => type_id,
            other => return Err(RuntimeError::InvalidProgram(format!("cannot match on a {}", other.tag_name()))),
        };

        for (type_name, block) in &variant_match.cases {
            if self.env.get_type(type_name)? == active {
                return self.exec_block(block);
            }
        }

        Ok(Flow::Normal)
    }


    fn eval_condition(&mut self, expression: &Expression) -> RunResult<bool> {
        match self.eval_expression(expression)? {
            Value::Bool(b) => Ok(b),
            other => Err(RuntimeError::InvalidProgram(format!("condition evaluated to a {}", other.tag_name()))),
        }
    }


    fn eval_int(&mut self, expression: &Expression) -> RunResult<i64> {
        match self.eval_expression(expression)? {
            Value::Int(n) => Ok(n),
            other => Err(RuntimeError::InvalidProgram(format!("range bound evaluated to a {}", other.tag_name()))),
        }
    }


    fn eval_expression(&mut self, expression: &Expression) -> RunResult<Value> {
        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(Value::from(literal)),
            ExpressionKind::Paren(inner) => self.eval_expression(inner),

            ExpressionKind::Identifier(name) => match self.env.get_value(name) {
                Ok(value) => Ok(value.clone()),
                Err(EnvironmentError::UndefinedVariable(_)) if self.env.get_fn(name).is_ok() => {
                    Ok(Value::Function(name.clone()))
                }
                Err(error) => Err(error.into()),
            },

            ExpressionKind::Binary { operator: operator @ (BinaryOperator::And | BinaryOperator::Or), left, right } => {
                let left = self.eval_expression(left)?;
                // `false && _` and `true || _` are decided without the right operand
                if left == Value::Bool(*operator == BinaryOperator::Or) {
                    return Ok(left);
                }

                let right = self.eval_expression(right)?;
                operators::apply_binary(*operator, left, right)
            }

            ExpressionKind::Binary { operator, left, right } => {
                let left = self.eval_expression(left)?;
                let right = self.eval_expression(right)?;
                operators::apply_binary(*operator, left, right)
            }

            ExpressionKind::Unary { operator, operand } => {
                let operand = self.eval_expression(operand)?;
                operators::apply_unary(*operator, operand)
            }

            ExpressionKind::Cast { target, operand } => {
                let operand = self.eval_expression(operand)?;
                casts::cast(operand, *target)
            }

            ExpressionKind::Object(members) => {
                let mut values: IndexMap<String, Value> = IndexMap::new();
                for (name, member) in members {
                    values.insert(name.clone(), self.eval_expression(member)?);
                }
                Ok(Value::Object(values))
            }

            ExpressionKind::Functional { base, postfixes } => {
                let mut value = self.eval_expression(base)?;
                for postfix in postfixes {
                    value = self.apply_postfix(value, &postfix.kind)?;
                }
                Ok(value)
            }
        }
    }


    fn apply_postfix(&mut self, value: Value, postfix: &PostfixKind) -> RunResult<Value> {
        match (value, postfix) {
            (Value::Function(name), PostfixKind::Call(args)) => {
                let mut values: Vec<Value> = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval_expression(arg)?);
                }
                self.call_function(&name, values)
            }

            (Value::Object(mut members), PostfixKind::Member(name)) => members.swap_remove(name)
                .ok_or_else(|| RuntimeError::InvalidProgram(format!("object has no member '{}'", name))),

            (Value::Variant { type_id, inner }, PostfixKind::VariantAccess(type_name)) => {
                let expected = self.env.get_type(type_name)?;
                if type_id == expected {
                    Ok(*inner)
                } else {
                    Err(RuntimeError::InvalidVariantAccess {
                        expected: type_name.clone(),
                        actual: self.env.types().name(type_id).to_owned(),
                    })
                }
            }

            (value, postfix) => Err(RuntimeError::InvalidProgram(format!(
                "cannot apply {:?} to a {}", postfix, value.tag_name()
            ))),
        }
    }


    /// The static type of an assignable place.
    fn place_type(&self, target: &Expression) -> RunResult<TypeId> {
        let (root, path) = target.as_place()
            .ok_or_else(|| RuntimeError::InvalidProgram("expression is not assignable".to_owned()))?;

        let mut ty = self.env.get_var(root)?.ty;
        for member in path {
            ty = match self.env.resolve_type(ty) {
                Type::Struct(fields) => fields.get(member).copied(),
                _ => None,
            }
            .ok_or_else(|| RuntimeError::InvalidProgram(format!("no member '{}' to assign to", member)))?;
        }

        Ok(ty)
    }


    /// Writes a value into a variable or into a member of a struct held by a variable.
    fn store(&mut self, target: &Expression, value: Value) -> RunResult<()> {
        let (root, path) = target.as_place()
            .ok_or_else(|| RuntimeError::InvalidProgram("expression is not assignable".to_owned()))?;
        let value = coerce(value, self.place_type(target)?, self.env.types());

        if path.is_empty() {
            self.env.assign_var(root, value)?;
            return Ok(());
        }

        let mut whole = self.env.get_value(root)?.clone();
        let mut slot = &mut whole;
        for member in path {
            slot = match slot {
                Value::Object(members) => members.get_mut(member),
                _ => None,
            }
            .ok_or_else(|| RuntimeError::InvalidProgram(format!("no member '{}' to assign to", member)))?;
        }
        *slot = value;

        self.env.assign_var(root, whole)?;
        Ok(())
    }


    /// Reads the next whitespace-separated word of input and parses it as a value of `ty`.
    fn read_value(&mut self, ty: TypeId) -> RunResult<Value> {
        let word = self.next_word()?;
        let parsed = match ty {
            TypeId::INT => word.parse::<i64>().ok().map(Value::Int),
            TypeId::FLOAT => word.parse::<f64>().ok().map(Value::Float),
            TypeId::BOOL => word.parse::<bool>().ok().map(Value::Bool),
            TypeId::CHAR => {
                let mut chars = word.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Value::Char(c)),
                    _ => None,
                }
            }
            TypeId::STRING => Some(Value::Str(word.clone())),
            _ => None,
        };

        parsed.ok_or_else(|| RuntimeError::InvalidInput { word, expected: self.env.types().name(ty).to_owned() })
    }


    fn next_word(&mut self) -> RunResult<String> {
        while self.pending_input.is_empty() {
            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                return Err(RuntimeError::UnexpectedEndOfInput);
            }
            self.pending_input.extend(line.split_whitespace().map(str::to_owned));
        }

        self.pending_input.pop_front().ok_or(RuntimeError::UnexpectedEndOfInput)
    }
}
