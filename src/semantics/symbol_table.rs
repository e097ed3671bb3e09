//! # Symbol Table Module
//!
//! The [`Environment`] tracks every name a running (or analyzed) program can see: variables,
//! types and functions. Names are held in [`Scope`]s. The global scope lives for the whole run;
//! every function activation pushes a [`StackFrame`] whose first scope holds the arguments and
//! whose later scopes are the nested blocks of the body.
//!
//! Lookup walks the scopes of the current frame from innermost to outermost and then falls back
//! to the global scope, so a function never sees the locals of its caller.
//!
//! Variables are bound in two phases. A [`Variable`] is first declared, which reserves its name
//! and type, and later defined with a value. This lets globals be declared together and then
//! initialized in source order.
use std::collections::HashMap;

use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::config::DEFAULT_RECURSION_LIMIT;
use crate::interpreter::values::Value;
use crate::parser::types::{Type, TypeArena, TypeId, PRIMITIVES};

use super::errors::EnvironmentError;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Modifier {
    Mutable,
    Const,
}


impl Modifier {
    pub fn from_const(constant: bool) -> Self {
        if constant { Self::Const } else { Self::Mutable }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    Declared,
    Defined(Value),
}


#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: TypeId,
    pub modifier: Modifier,
    pub binding: Binding,
}


/// A set of names introduced by one block, or by the program at global level.
#[derive(Debug, Default)]
pub struct Scope {
    variables: HashMap<String, Variable>,
    types: HashMap<String, TypeId>,
}


impl Scope {
    fn declares(&self, name: &str) -> bool {
        self.variables.contains_key(name) || self.types.contains_key(name)
    }
}


/// The scopes of one function activation; `scopes[0]` holds the arguments.
#[derive(Debug)]
pub struct StackFrame {
    pub function: String,
    scopes: Vec<Scope>,
}


#[derive(Debug, Clone, PartialEq)]
pub struct FunctionEntry {
    pub name: String,
    /// Handle of the [`Type::Function`] describing the signature and body.
    pub signature: TypeId,
    pub params: Vec<(String, Modifier)>,
}


#[derive(Debug)]
pub struct Environment {
    types: TypeArena,
    global: Scope,
    frames: Vec<StackFrame>,
    functions: IndexMap<String, FunctionEntry>,
    recursion_limit: usize,
}


impl Environment {
    /// Creates an environment whose global scope knows only the primitive types.
    pub fn new(recursion_limit: usize) -> Self {
        let mut global = Scope::default();
        for (index, (name, _)) in PRIMITIVES.iter().enumerate() {
            global.types.insert((*name).to_owned(), primitive_id(index));
        }

        Self {
            types: TypeArena::new(),
            global,
            frames: vec![],
            functions: IndexMap::new(),
            recursion_limit,
        }
    }


    pub fn types(&self) -> &TypeArena {
        &self.types
    }


    /// The number of active stack frames.
    pub fn depth(&self) -> usize {
        self.frames.len()
    }


    fn current_scope(&self) -> &Scope {
        self.frames.last()
            .and_then(|frame| frame.scopes.last())
            .unwrap_or(&self.global)
    }


    fn current_scope_mut(&mut self) -> &mut Scope {
        match self.frames.last_mut().and_then(|frame| frame.scopes.last_mut()) {
            Some(scope) => scope,
            None => &mut self.global,
        }
    }


    /// Whether declaring `name` now would clash with an existing declaration.
    ///
    /// Variables and types of the current scope share one namespace. At global level the
    /// function table is part of that namespace too.
    pub fn name_conflict(&self, name: &str) -> bool {
        if self.current_scope().declares(name) {
            return true;
        }

        self.frames.is_empty() && self.functions.contains_key(name)
    }


    /// Reserves a variable in the current scope without giving it a value.
    pub fn declare_var(&mut self, name: &str, ty: TypeId, modifier: Modifier) -> Result<(), EnvironmentError> {
        if self.name_conflict(name) {
            return Err(EnvironmentError::NameConflict(name.to_owned()));
        }

        trace!(name, %ty, ?modifier, "declared variable");
        self.current_scope_mut().variables.insert(name.to_owned(), Variable {
            name: name.to_owned(),
            ty,
            modifier,
            binding: Binding::Declared,
        });
        Ok(())
    }


    /// Gives a declared variable its first value.
    pub fn define_var(&mut self, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let variable = self.lookup_var_mut(name)?;
        if let Binding::Defined(_) = variable.binding {
            return Err(EnvironmentError::AlreadyDefined(name.to_owned()));
        }

        variable.binding = Binding::Defined(value);
        Ok(())
    }


    /// Replaces the value of a mutable variable.
    pub fn assign_var(&mut self, name: &str, value: Value) -> Result<(), EnvironmentError> {
        let variable = self.lookup_var_mut(name)?;
        if variable.modifier == Modifier::Const {
            return Err(EnvironmentError::ConstAssignment(name.to_owned()));
        }

        variable.binding = Binding::Defined(value);
        Ok(())
    }


    /// Looks `name` up in the innermost scope of the current frame first, then outwards, and
    /// finally among the globals.
    ///
    /// # Errors
    ///
    /// [`EnvironmentError::UndefinedVariable`] if no visible scope declares `name`.
    pub fn get_var(&self, name: &str) -> Result<&Variable, EnvironmentError> {
        let frame_scopes = self.frames.last().map(|frame| frame.scopes.as_slice()).unwrap_or(&[]);

        frame_scopes.iter()
            .rev()
            .chain(std::iter::once(&self.global))
            .find_map(|scope| scope.variables.get(name))
            .ok_or_else(|| EnvironmentError::UndefinedVariable(name.to_owned()))
    }


    /// The current value of a variable, failing if it was declared but never defined.
    pub fn get_value(&self, name: &str) -> Result<&Value, EnvironmentError> {
        match &self.get_var(name)?.binding {
            Binding::Defined(value) => Ok(value),
            Binding::Declared => Err(EnvironmentError::Uninitialized(name.to_owned())),
        }
    }


    fn lookup_var_mut(&mut self, name: &str) -> Result<&mut Variable, EnvironmentError> {
        let frame_scopes = match self.frames.last_mut() {
            Some(frame) => frame.scopes.as_mut_slice(),
            None => &mut [],
        };

        frame_scopes.iter_mut()
            .rev()
            .chain(std::iter::once(&mut self.global))
            .find_map(|scope| scope.variables.get_mut(name))
            .ok_or_else(|| EnvironmentError::UndefinedVariable(name.to_owned()))
    }


    /// Makes an existing type visible under `name` in the current scope.
    pub fn declare_type(&mut self, name: &str, id: TypeId) -> Result<(), EnvironmentError> {
        if self.name_conflict(name) {
            return Err(EnvironmentError::NameConflict(name.to_owned()));
        }

        self.current_scope_mut().types.insert(name.to_owned(), id);
        Ok(())
    }


    /// Stores a new type in the arena and declares it under `name`.
    pub fn define_type(&mut self, name: &str, ty: Type) -> Result<TypeId, EnvironmentError> {
        if self.name_conflict(name) {
            return Err(EnvironmentError::NameConflict(name.to_owned()));
        }

        let id = self.types.add(name, ty);
        debug!(name, %id, "defined type");
        self.declare_type(name, id)?;
        Ok(id)
    }


    pub fn get_type(&self, name: &str) -> Result<TypeId, EnvironmentError> {
        let frame_scopes = self.frames.last().map(|frame| frame.scopes.as_slice()).unwrap_or(&[]);

        frame_scopes.iter()
            .rev()
            .chain(std::iter::once(&self.global))
            .find_map(|scope| scope.types.get(name).copied())
            .ok_or_else(|| EnvironmentError::UndefinedType(name.to_owned()))
    }


    pub fn resolve_type(&self, id: TypeId) -> &Type {
        self.types.get(id)
    }


    /// Registers a function signature. Functions always live at global level.
    pub fn declare_fn(
        &mut self,
        name: &str,
        params: Vec<(String, TypeId, Modifier)>,
        return_type: TypeId,
    ) -> Result<TypeId, EnvironmentError> {
        if self.global.declares(name) || self.functions.contains_key(name) {
            return Err(EnvironmentError::NameConflict(name.to_owned()));
        }

        let signature = self.types.add_function(params.iter().map(|(_, ty, _)| *ty).collect(), return_type);
        let params = params.into_iter().map(|(name, _, modifier)| (name, modifier)).collect();
        debug!(name, signature = self.types.name(signature), "declared function");

        self.functions.insert(name.to_owned(), FunctionEntry { name: name.to_owned(), signature, params });
        Ok(signature)
    }


    /// Attaches a body, given as the index of its definition in the program, to a declared
    /// function.
    pub fn define_fn(&mut self, name: &str, body: usize) -> Result<(), EnvironmentError> {
        let signature = self.get_fn(name)?.signature;

        match self.types.get_mut(signature) {
            Type::Function(function) if function.body.is_none() => {
                function.body = Some(body);
                Ok(())
            }
            _ => Err(EnvironmentError::AlreadyDefined(name.to_owned())),
        }
    }


    /// The signature, and the body once defined, of the function called `name`.
    pub fn get_fn(&self, name: &str) -> Result<&FunctionEntry, EnvironmentError> {
        self.functions.get(name).ok_or_else(|| EnvironmentError::UndefinedFunction(name.to_owned()))
    }


    /// Starts an activation of `function` with an empty argument scope.
    ///
    /// # Errors
    ///
    /// Fails with [`EnvironmentError::RecursionLimit`] rather than let the number of frames
    /// exceed the limit.
    pub fn push_stack_frame(&mut self, function: &str) -> Result<(), EnvironmentError> {
        if self.frames.len() >= self.recursion_limit {
            return Err(EnvironmentError::RecursionLimit { depth: self.frames.len() });
        }

        trace!(function, depth = self.frames.len() + 1, "pushed stack frame");
        self.frames.push(StackFrame { function: function.to_owned(), scopes: vec![Scope::default()] });
        Ok(())
    }


    pub fn pop_stack_frame(&mut self) -> Result<StackFrame, EnvironmentError> {
        let frame = self.frames.pop().ok_or(EnvironmentError::NoActiveFrame)?;
        trace!(function = frame.function.as_str(), "popped stack frame");
        Ok(frame)
    }


    /// Opens a nested block scope in the current frame.
    pub fn enter_scope(&mut self) -> Result<(), EnvironmentError> {
        let frame = self.frames.last_mut().ok_or(EnvironmentError::NoActiveFrame)?;
        frame.scopes.push(Scope::default());
        Ok(())
    }


    /// Drops the innermost scope and everything declared in it.
    pub fn exit_scope(&mut self) -> Result<(), EnvironmentError> {
        let frame = self.frames.last_mut().ok_or(EnvironmentError::NoActiveFrame)?;
        if frame.scopes.len() <= 1 {
            return Err(EnvironmentError::ArgumentScopePop);
        }

        frame.scopes.pop();
        Ok(())
    }
}


impl Default for Environment {
    fn default() -> Self {
        Self::new(DEFAULT_RECURSION_LIMIT)
    }
}


fn primitive_id(index: usize) -> TypeId {
    [TypeId::VOID, TypeId::INT, TypeId::FLOAT, TypeId::BOOL, TypeId::CHAR, TypeId::STRING][index]
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;


    fn defined(env: &mut Environment, name: &str, ty: TypeId, modifier: Modifier, value: Value) {
        env.declare_var(name, ty, modifier).unwrap();
        env.define_var(name, value).unwrap();
    }


    #[test]
    fn test_primitives_are_seeded() {
        let env = Environment::default();
        assert_eq!(env.get_type("int"), Ok(TypeId::INT));
        assert_eq!(env.get_type("void"), Ok(TypeId::VOID));
        assert_eq!(env.get_type("string"), Ok(TypeId::STRING));
        assert_eq!(env.get_type("Point"), Err(EnvironmentError::UndefinedType("Point".to_owned())));
    }


    #[test]
    fn test_nested_scope_resolution() {
        let mut env = Environment::default();
        defined(&mut env, "x", TypeId::INT, Modifier::Mutable, Value::Int(1));
        defined(&mut env, "g", TypeId::INT, Modifier::Mutable, Value::Int(100));

        env.push_stack_frame("f").unwrap();
        defined(&mut env, "x", TypeId::INT, Modifier::Mutable, Value::Int(2));
        env.enter_scope().unwrap();
        defined(&mut env, "x", TypeId::INT, Modifier::Mutable, Value::Int(3));
        env.enter_scope().unwrap();

        // nearest declaration in the frame wins
        assert_eq!(env.get_value("x"), Ok(&Value::Int(3)));
        // globals are visible when the frame has no declaration
        assert_eq!(env.get_value("g"), Ok(&Value::Int(100)));

        env.exit_scope().unwrap();
        env.exit_scope().unwrap();
        assert_eq!(env.get_value("x"), Ok(&Value::Int(2)));

        // a callee does not see its caller's locals
        env.push_stack_frame("h").unwrap();
        assert_eq!(env.get_value("x"), Ok(&Value::Int(1)));
        env.pop_stack_frame().unwrap();

        env.pop_stack_frame().unwrap();
        assert_eq!(env.get_value("x"), Ok(&Value::Int(1)));
    }


    #[test]
    fn test_assignment_updates_nearest_declaration() {
        let mut env = Environment::default();
        defined(&mut env, "x", TypeId::INT, Modifier::Mutable, Value::Int(1));

        env.push_stack_frame("f").unwrap();
        env.assign_var("x", Value::Int(5)).unwrap();
        env.pop_stack_frame().unwrap();

        assert_eq!(env.get_value("x"), Ok(&Value::Int(5)));
    }


    #[test]
    fn test_const_reassignment_is_rejected() {
        let mut env = Environment::default();
        defined(&mut env, "limit", TypeId::INT, Modifier::Const, Value::Int(10));

        assert_eq!(
            env.assign_var("limit", Value::Int(11)),
            Err(EnvironmentError::ConstAssignment("limit".to_owned()))
        );
        assert_eq!(env.get_value("limit"), Ok(&Value::Int(10)));
    }


    #[test]
    fn test_two_phase_binding() {
        let mut env = Environment::default();
        env.declare_var("later", TypeId::BOOL, Modifier::Mutable).unwrap();

        assert_eq!(env.get_var("later").map(|v| v.ty), Ok(TypeId::BOOL));
        assert_eq!(env.get_value("later"), Err(EnvironmentError::Uninitialized("later".to_owned())));

        env.define_var("later", Value::Bool(true)).unwrap();
        assert_eq!(env.get_value("later"), Ok(&Value::Bool(true)));
        assert_eq!(
            env.define_var("later", Value::Bool(false)),
            Err(EnvironmentError::AlreadyDefined("later".to_owned()))
        );
    }


    #[test]
    fn test_name_conflicts() {
        let mut env = Environment::default();
        env.declare_var("x", TypeId::INT, Modifier::Mutable).unwrap();
        assert_eq!(env.declare_var("x", TypeId::INT, Modifier::Mutable), Err(EnvironmentError::NameConflict("x".to_owned())));
        assert_eq!(env.declare_type("x", TypeId::INT), Err(EnvironmentError::NameConflict("x".to_owned())));
        assert!(env.name_conflict("int"));

        env.declare_fn("f", vec![], TypeId::VOID).unwrap();
        assert!(env.name_conflict("f"));
        assert_eq!(env.declare_fn("x", vec![], TypeId::VOID), Err(EnvironmentError::NameConflict("x".to_owned())));

        // locals may shadow globals and functions
        env.push_stack_frame("f").unwrap();
        assert!(!env.name_conflict("f"));
        env.declare_var("x", TypeId::FLOAT, Modifier::Mutable).unwrap();
        assert_eq!(env.get_var("x").map(|v| v.ty), Ok(TypeId::FLOAT));
    }


    #[test]
    fn test_functions() {
        let mut env = Environment::default();
        let params = vec![("a".to_owned(), TypeId::INT, Modifier::Const)];
        let signature = env.declare_fn("inc", params, TypeId::INT).unwrap();

        assert_eq!(env.types().name(signature), "fn(int) -> int");
        env.define_fn("inc", 3).unwrap();
        assert_eq!(env.define_fn("inc", 4), Err(EnvironmentError::AlreadyDefined("inc".to_owned())));

        match env.resolve_type(env.get_fn("inc").unwrap().signature) {
            Type::Function(function) => assert_eq!(function.body, Some(3)),
            other => panic!("expected function type, got {:?}", other),
        }
        assert_eq!(env.get_fn("inc").unwrap().params, vec![("a".to_owned(), Modifier::Const)]);
        assert_eq!(env.get_fn("dec"), Err(EnvironmentError::UndefinedFunction("dec".to_owned())));
    }


    #[test]
    fn test_recursion_ceiling() {
        let mut env = Environment::new(3);
        for _ in 0..3 {
            env.push_stack_frame("f").unwrap();
        }

        assert_eq!(env.push_stack_frame("f"), Err(EnvironmentError::RecursionLimit { depth: 3 }));
        assert_eq!(env.depth(), 3);
    }


    #[test]
    fn test_contract_violations() {
        let mut env = Environment::default();
        assert_eq!(env.enter_scope(), Err(EnvironmentError::NoActiveFrame));
        assert_eq!(env.exit_scope(), Err(EnvironmentError::NoActiveFrame));
        assert!(matches!(env.pop_stack_frame(), Err(EnvironmentError::NoActiveFrame)));

        env.push_stack_frame("f").unwrap();
        assert_eq!(env.exit_scope(), Err(EnvironmentError::ArgumentScopePop));
    }
}
