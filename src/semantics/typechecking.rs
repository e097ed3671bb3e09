//! This module typechecks a parsed program before it is run.
//!
//! The [`SemanticAnalyzer`] walks the AST once with its own [`Environment`], declaring names as
//! it meets them and computing the static type of every expression. Problems are reported to the
//! diagnostic sink as warnings so that one mistake does not hide the next; the walk only stops
//! early once the sink runs out of tolerance.
//!
//! Types must match exactly. The only implicit conversion is storing a value into a place whose
//! type is a variant containing the value's type; every other conversion needs a cast.
use indexmap::IndexMap;
use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, ErrorKind, Severity};
use crate::interpreter::{casts, operators};
use crate::parser::ast::*;
use crate::parser::source::Position;
use crate::parser::types::{Type, TypeId};

use super::errors::{AnalysisError, EnvironmentError};
use super::symbol_table::{Environment, Modifier};


/// Analysis stops either because the tolerance ran out or because the analyzer itself broke.
pub type Check<T> = Result<T, AnalysisError>;


/// Walks a parsed program once, resolving names and checking types, and reports every
/// problem it finds to the diagnostics sink.
pub struct SemanticAnalyzer<'d> {
    env: Environment,
    diagnostics: &'d mut Diagnostics,
    /// How many loops enclose the statement being checked.
    loop_depth: usize,
    /// Return type of the function whose body is being checked.
    return_type: TypeId,
}


impl<'d> SemanticAnalyzer<'d> {
    /// An analyzer with an empty environment apart from the primitive types, reporting to
    /// `diagnostics`.
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            env: Environment::default(),
            diagnostics,
            loop_depth: 0,
            return_type: TypeId::VOID,
        }
    }


    /// Checks a whole program.
    ///
    /// Definitions are visited in phases: type definitions in source order, then function
    /// signatures, then global variable declarations, then global initializers, and finally
    /// function bodies. This lets any function body or initializer refer to any function and
    /// any global.
    ///
    /// # Errors
    ///
    /// Returns [`AnalysisError::Aborted`] once the sink's tolerance is exceeded. Whether the
    /// program is fit to run is decided by the sink being empty, not by this result.
    pub fn analyze(&mut self, program: &Program) -> Check<()> {
        info!("analyzing program");

        for definition in &program.definitions {
            match definition {
                Definition::Struct(def) => self.define_struct(def)?,
                Definition::Variant(def) => self.define_variant(def)?,
                _ => {}
            }
        }

        for (index, definition) in program.definitions.iter().enumerate() {
            if let Definition::Fn(def) = definition {
                self.declare_function(def, index)?;
            }
        }

        let mut globals: Vec<(&VarDef, TypeId)> = vec![];
        for definition in &program.definitions {
            let (def, modifier) = match definition {
                Definition::Var(def) => (def, Modifier::Mutable),
                Definition::Const(def) => (def, Modifier::Const),
                _ => continue,
            };

            if let Some(ty) = self.declare_variable(def, modifier)? {
                globals.push((def, ty));
            }
        }

        for (def, ty) in globals {
            if ty != TypeId::VOID {
                self.expect_type(&def.initializer, ty, ErrorKind::TypeMismatch)?;
            }
        }

        for definition in &program.definitions {
            if let Definition::Fn(def) = definition {
                self.check_function(def)?;
            }
        }

        Ok(())
    }


    fn report(&mut self, kind: ErrorKind, position: &Position) -> Check<()> {
        self.diagnostics.report(kind, position.clone(), Severity::Warning)?;
        Ok(())
    }


    /// Reports a user-level environment error and hands back the value on success. Fatal
    /// environment errors end the analysis.
    fn check_env<T>(&mut self, result: Result<T, EnvironmentError>, position: &Position) -> Check<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(error) => match error.kind() {
                Some(kind) => {
                    self.report(kind, position)?;
                    Ok(None)
                }
                None => Err(error.into()),
            },
        }
    }


    fn lookup_type(&mut self, name: &str, position: &Position) -> Check<Option<TypeId>> {
        let result = self.env.get_type(name);
        self.check_env(result, position)
    }


    /// Whether a value of type `source` may be stored in a place of type `target`.
    fn assignable(&self, target: TypeId, source: TypeId) -> bool {
        if target == source {
            return true;
        }

        match self.env.resolve_type(target) {
            Type::Variant(options) => options.iter().any(|option| self.assignable(*option, source)),
            _ => false,
        }
    }


    /// Checks that an expression can be stored in a place of type `expected`, reporting `kind`
    /// if not.
    fn expect_type(&mut self, expression: &Expression, expected: TypeId, kind: ErrorKind) -> Check<()> {
        if let Some(actual) = self.expression_type(expression, Some(expected))? {
            if !self.assignable(expected, actual) {
                self.report(kind, &expression.position)?;
            }
        }

        Ok(())
    }


    fn define_struct(&mut self, def: &StructDef) -> Check<()> {
        let mut members: IndexMap<String, TypeId> = IndexMap::new();
        let mut valid = true;

        for member in &def.members {
            if members.contains_key(&member.name) {
                self.report(ErrorKind::Redefinition, &member.position)?;
                valid = false;
                continue;
            }

            match self.lookup_type(&member.type_name, &member.position)? {
                Some(TypeId::VOID) => {
                    self.report(ErrorKind::VoidVariable, &member.position)?;
                    valid = false;
                }
                Some(ty) => {
                    members.insert(member.name.clone(), ty);
                }
                None => valid = false,
            }
        }

        // a struct with a broken member is left undefined
        if valid {
            let result = self.env.define_type(&def.name, Type::Struct(members));
            self.check_env(result, &def.position)?;
            debug!(name = def.name.as_str(), "checked struct");
        }

        Ok(())
    }


    fn define_variant(&mut self, def: &VariantDef) -> Check<()> {
        if def.members.is_empty() {
            return self.report(ErrorKind::EmptyVariant, &def.position);
        }

        let mut members: Vec<TypeId> = vec![];
        let mut valid = true;

        for name in &def.members {
            match self.lookup_type(name, &def.position)? {
                Some(TypeId::VOID) => {
                    self.report(ErrorKind::VoidVariable, &def.position)?;
                    valid = false;
                }
                Some(ty) if members.contains(&ty) => {
                    self.report(ErrorKind::DuplicateVariantMember, &def.position)?;
                    valid = false;
                }
                Some(ty) => members.push(ty),
                None => valid = false,
            }
        }

        if valid {
            let result = self.env.define_type(&def.name, Type::Variant(members));
            self.check_env(result, &def.position)?;
            debug!(name = def.name.as_str(), "checked variant");
        }

        Ok(())
    }


    fn declare_function(&mut self, def: &FnDef, index: usize) -> Check<()> {
        let mut params: Vec<(String, TypeId, Modifier)> = vec![];
        let mut valid = true;

        for param in &def.params {
            match self.lookup_type(&param.type_name, &param.position)? {
                Some(TypeId::VOID) => {
                    self.report(ErrorKind::VoidVariable, &param.position)?;
                    valid = false;
                }
                Some(ty) => params.push((param.name.clone(), ty, Modifier::from_const(param.constant))),
                None => valid = false,
            }
        }

        let return_type = self.lookup_type(&def.return_type, &def.position)?;

        if def.name == "main" && !def.params.is_empty() {
            self.report(ErrorKind::InvalidMainSignature, &def.position)?;
        }

        let (true, Some(return_type)) = (valid, return_type) else {
            return Ok(());
        };

        let result = self.env.declare_fn(&def.name, params, return_type);
        if self.check_env(result, &def.position)?.is_some() {
            let result = self.env.define_fn(&def.name, index);
            self.check_env(result, &def.position)?;
        }

        Ok(())
    }


    /// Declares a variable after resolving its type, returning the type if it resolved.
    fn declare_variable(&mut self, def: &VarDef, modifier: Modifier) -> Check<Option<TypeId>> {
        let Some(ty) = self.lookup_type(&def.type_name, &def.position)? else {
            return Ok(None);
        };

        if ty == TypeId::VOID {
            self.report(ErrorKind::VoidVariable, &def.position)?;
        }

        let result = self.env.declare_var(&def.name, ty, modifier);
        self.check_env(result, &def.position)?;
        Ok(Some(ty))
    }


    fn check_function(&mut self, def: &FnDef) -> Check<()> {
        // the signature was already reported if it did not resolve
        let Ok(entry) = self.env.get_fn(&def.name) else {
            return Ok(());
        };
        let Type::Function(function) = self.env.resolve_type(entry.signature).clone() else {
            return Ok(());
        };

        self.env.push_stack_frame(&def.name)?;
        for (param, ty) in def.params.iter().zip(&function.params) {
            let result = self.env.declare_var(&param.name, *ty, Modifier::from_const(param.constant));
            self.check_env(result, &param.position)?;
        }

        self.return_type = function.return_type;
        self.loop_depth = 0;
        self.check_block(&def.body)?;
        self.env.pop_stack_frame()?;

        debug!(name = def.name.as_str(), "checked function");
        Ok(())
    }


    fn check_block(&mut self, block: &Block) -> Check<()> {
        self.env.enter_scope()?;
        for statement in &block.statements {
            self.check_statement(statement)?;
        }
        self.env.exit_scope()?;

        Ok(())
    }


    fn check_loop_body(&mut self, body: &Block) -> Check<()> {
        self.loop_depth += 1;
        let result = self.check_block(body);
        self.loop_depth -= 1;
        result
    }


    fn check_statement(&mut self, statement: &Statement) -> Check<()> {
        let position = &statement.position;

        match &statement.kind {
            StatementKind::VarDef(def) => self.check_local(def, Modifier::Mutable),
            StatementKind::ConstDef(def) => self.check_local(def, Modifier::Const),

            StatementKind::Expression(expression) => {
                self.expression_type(expression, None)?;
                Ok(())
            }

            StatementKind::Assignment { target, value } => {
                if let Some(ty) = self.place_type(target)? {
                    self.expect_type(value, ty, ErrorKind::TypeMismatch)?;
                }
                Ok(())
            }

            StatementKind::StdinExtraction(targets) => {
                for target in targets {
                    if let Some(ty) = self.place_type(target)? {
                        if ty == TypeId::VOID || !self.env.types().is_primitive(ty) {
                            self.report(ErrorKind::NotReadable, &target.position)?;
                        }
                    }
                }
                Ok(())
            }

            StatementKind::StdoutInsertion(values) => {
                for value in values {
                    if self.expression_type(value, None)? == Some(TypeId::VOID) {
                        self.report(ErrorKind::NotPrintable, &value.position)?;
                    }
                }
                Ok(())
            }

            StatementKind::VariantMatch(variant_match) => self.check_match(variant_match),
            StatementKind::Block(block) => self.check_block(block),

            StatementKind::If(if_stmt) => {
                self.check_condition(&if_stmt.condition)?;
                self.check_block(&if_stmt.then_block)?;

                for (condition, block) in &if_stmt.elifs {
                    self.check_condition(condition)?;
                    self.check_block(block)?;
                }

                if let Some(block) = &if_stmt.else_block {
                    self.check_block(block)?;
                }
                Ok(())
            }

            StatementKind::For(for_stmt) => {
                for bound in [&for_stmt.start, &for_stmt.end] {
                    if let Some(ty) = self.expression_type(bound, None)? {
                        if ty != TypeId::INT {
                            self.report(ErrorKind::RangeNotInt, &bound.position)?;
                        }
                    }
                }

                self.env.enter_scope()?;
                let result = self.env.declare_var(&for_stmt.variable, TypeId::INT, Modifier::Const);
                self.check_env(result, position)?;
                self.check_loop_body(&for_stmt.body)?;
                self.env.exit_scope()?;
                Ok(())
            }

            StatementKind::While { condition, body } => {
                self.check_condition(condition)?;
                self.check_loop_body(body)
            }

            StatementKind::Continue if self.loop_depth == 0 => self.report(ErrorKind::ContinueOutsideLoop, position),
            StatementKind::Break if self.loop_depth == 0 => self.report(ErrorKind::BreakOutsideLoop, position),
            StatementKind::Continue | StatementKind::Break => Ok(()),

            StatementKind::Return(None) => {
                if self.return_type != TypeId::VOID {
                    self.report(ErrorKind::ReturnTypeMismatch, position)?;
                }
                Ok(())
            }

            StatementKind::Return(Some(value)) => {
                let return_type = self.return_type;
                self.expect_type(value, return_type, ErrorKind::ReturnTypeMismatch)
            }
        }
    }


    /// Checks a local definition. The initializer is checked before the name is declared, so
    /// it still sees any outer variable of the same name.
    fn check_local(&mut self, def: &VarDef, modifier: Modifier) -> Check<()> {
        let Some(ty) = self.lookup_type(&def.type_name, &def.position)? else {
            return Ok(());
        };

        if ty == TypeId::VOID {
            self.report(ErrorKind::VoidVariable, &def.position)?;
        } else {
            self.expect_type(&def.initializer, ty, ErrorKind::TypeMismatch)?;
        }

        let result = self.env.declare_var(&def.name, ty, modifier);
        self.check_env(result, &def.position)?;
        Ok(())
    }


    fn check_condition(&mut self, condition: &Expression) -> Check<()> {
        if let Some(ty) = self.expression_type(condition, None)? {
            if ty != TypeId::BOOL {
                self.report(ErrorKind::ConditionNotBool, &condition.position)?;
            }
        }

        Ok(())
    }


    fn check_match(&mut self, variant_match: &VariantMatch) -> Check<()> {
        let scrutinee_type = self.expression_type(&variant_match.scrutinee, None)?;
        let options = match scrutinee_type.map(|ty| self.env.resolve_type(ty)) {
            Some(Type::Variant(options)) => Some(options.clone()),
            _ => None,
        };

        if scrutinee_type.is_some() && options.is_none() {
            self.report(ErrorKind::NotAVariant, &variant_match.scrutinee.position)?;
        }

        for (type_name, block) in &variant_match.cases {
            let case_type = self.lookup_type(type_name, &block.position)?;
            if let (Some(options), Some(case_type)) = (&options, case_type) {
                if !options.contains(&case_type) {
                    self.report(ErrorKind::NotAVariantMember, &block.position)?;
                }
            }

            self.check_block(block)?;
        }

        Ok(())
    }


    /// The type of an assignment or `stdin` target, which must be a non-const variable or a
    /// member path rooted at one.
    fn place_type(&mut self, target: &Expression) -> Check<Option<TypeId>> {
        let Some((root, path)) = target.as_place() else {
            self.report(ErrorKind::NotAssignable, &target.position)?;
            return Ok(None);
        };

        let variable = match self.env.get_var(root).cloned() {
            Ok(variable) => variable,
            Err(_) if self.env.get_fn(root).is_ok() => {
                self.report(ErrorKind::NotAssignable, &target.position)?;
                return Ok(None);
            }
            Err(error) => {
                self.check_env::<()>(Err(error), &target.position)?;
                return Ok(None);
            }
        };

        if variable.modifier == Modifier::Const {
            self.report(ErrorKind::ConstAssignment, &target.position)?;
            return Ok(None);
        }

        let mut ty = variable.ty;
        for member in path {
            match self.member_type(ty, member) {
                Some(member_type) => ty = member_type,
                None => {
                    self.report(ErrorKind::UnknownMember, &target.position)?;
                    return Ok(None);
                }
            }
        }

        Ok(Some(ty))
    }


    fn member_type(&self, ty: TypeId, member: &str) -> Option<TypeId> {
        match self.env.resolve_type(ty) {
            Type::Struct(fields) => fields.get(member).copied(),
            _ => None,
        }
    }


    /// Computes the static type of an expression.
    ///
    /// `expected` is the type of the place the value is headed for, if known; object literals
    /// need it to know which struct they build. Returns `None` when the expression contains an
    /// error that has already been reported.
    pub fn expression_type(&mut self, expression: &Expression, expected: Option<TypeId>) -> Check<Option<TypeId>> {
        let position = &expression.position;

        match &expression.kind {
            ExpressionKind::Literal(literal) => Ok(Some(match literal {
                Literal::Int(_) => TypeId::INT,
                Literal::Float(_) => TypeId::FLOAT,
                Literal::Bool(_) => TypeId::BOOL,
                Literal::Char(_) => TypeId::CHAR,
                Literal::String(_) => TypeId::STRING,
            })),

            ExpressionKind::Identifier(name) => {
                if let Ok(variable) = self.env.get_var(name) {
                    return Ok(Some(variable.ty));
                }
                if let Ok(entry) = self.env.get_fn(name) {
                    return Ok(Some(entry.signature));
                }

                self.report(ErrorKind::UndefinedVariable, position)?;
                Ok(None)
            }

            ExpressionKind::Paren(inner) => self.expression_type(inner, expected),

            ExpressionKind::Binary { operator, left, right } => {
                let left = self.expression_type(left, None)?;
                let right = self.expression_type(right, None)?;
                let (Some(left), Some(right)) = (left, right) else {
                    return Ok(None);
                };

                match operators::binary_result_type(*operator, left, right) {
                    Some(ty) => Ok(Some(ty)),
                    None => {
                        self.report(ErrorKind::InvalidOperandTypes, position)?;
                        Ok(None)
                    }
                }
            }

            ExpressionKind::Unary { operator, operand } => {
                let Some(operand) = self.expression_type(operand, None)? else {
                    return Ok(None);
                };

                match operators::unary_result_type(*operator, operand) {
                    Some(ty) => Ok(Some(ty)),
                    None => {
                        self.report(ErrorKind::InvalidOperandTypes, position)?;
                        Ok(None)
                    }
                }
            }

            ExpressionKind::Cast { target, operand } => {
                let Some(operand) = self.expression_type(operand, None)? else {
                    return Ok(None);
                };

                if !casts::castable(operand, target.type_id()) {
                    self.report(ErrorKind::InvalidCast, position)?;
                    return Ok(None);
                }
                Ok(Some(target.type_id()))
            }

            ExpressionKind::Object(members) => self.object_type(members, expected, position),

            ExpressionKind::Functional { base, postfixes } => {
                let Some(mut ty) = self.expression_type(base, None)? else {
                    return Ok(None);
                };

                for postfix in postfixes {
                    match self.postfix_type(ty, postfix)? {
                        Some(next) => ty = next,
                        None => return Ok(None),
                    }
                }

                Ok(Some(ty))
            }
        }
    }


    fn postfix_type(&mut self, ty: TypeId, postfix: &Postfix) -> Check<Option<TypeId>> {
        let position = &postfix.position;

        match &postfix.kind {
            PostfixKind::Call(args) => {
                let Type::Function(function) = self.env.resolve_type(ty).clone() else {
                    self.report(ErrorKind::NotCallable, position)?;
                    return Ok(None);
                };

                if args.len() != function.params.len() {
                    self.report(ErrorKind::ArgumentCountMismatch, position)?;
                    return Ok(None);
                }

                for (arg, param) in args.iter().zip(&function.params) {
                    self.expect_type(arg, *param, ErrorKind::TypeMismatch)?;
                }

                Ok(Some(function.return_type))
            }

            PostfixKind::Member(name) => match self.member_type(ty, name) {
                Some(member_type) => Ok(Some(member_type)),
                None => {
                    self.report(ErrorKind::UnknownMember, position)?;
                    Ok(None)
                }
            },

            PostfixKind::VariantAccess(type_name) => {
                let Type::Variant(options) = self.env.resolve_type(ty).clone() else {
                    self.report(ErrorKind::NotAVariant, position)?;
                    return Ok(None);
                };

                let Some(target) = self.lookup_type(type_name, position)? else {
                    return Ok(None);
                };

                if !options.contains(&target) {
                    self.report(ErrorKind::NotAVariantMember, position)?;
                    return Ok(None);
                }

                Ok(Some(target))
            }
        }
    }


    /// Types an object literal against the struct it is expected to build. When a variant is
    /// expected, the literal builds the first struct member with exactly its member names.
    fn object_type(
        &mut self,
        members: &IndexMap<String, Expression>,
        expected: Option<TypeId>,
        position: &Position,
    ) -> Check<Option<TypeId>> {
        let same_names = |fields: &IndexMap<String, TypeId>| {
            fields.len() == members.len() && members.keys().all(|name| fields.contains_key(name))
        };

        let target = match expected.map(|ty| (ty, self.env.resolve_type(ty))) {
            Some((ty, Type::Struct(fields))) => Some((ty, fields.clone())),
            Some((_, Type::Variant(options))) => options.iter()
                .find_map(|option| match self.env.resolve_type(*option) {
                    Type::Struct(fields) if same_names(fields) => Some((*option, fields.clone())),
                    _ => None,
                }),
            _ => None,
        };

        let Some((target, fields)) = target else {
            let expects_variant = expected.is_some_and(|ty| matches!(self.env.resolve_type(ty), Type::Variant(_)));
            let kind = if expects_variant { ErrorKind::ObjectMismatch } else { ErrorKind::UntypedObject };
            self.report(kind, position)?;
            return Ok(None);
        };

        if !same_names(&fields) {
            self.report(ErrorKind::ObjectMismatch, position)?;
            return Ok(None);
        }

        for (name, value) in members {
            if let Some(field_type) = fields.get(name) {
                self.expect_type(value, *field_type, ErrorKind::TypeMismatch)?;
            }
        }

        Ok(Some(target))
    }
}
