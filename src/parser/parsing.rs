//! The recursive-descent [`Parser`] which turns the lexer's tokens into a [`Program`].
//!
//! The parser keeps exactly one token of lookahead in `self.token`. Each `parse_x` production
//! inspects that token, consumes what it recognises and returns the node it built. When the
//! input does not fit, the production reports the specific [`ErrorKind`] for what it expected
//! at the current token and returns an error straight away; no attempt is made to resynchronise,
//! so the first syntax error ends the parse. Definition productions additionally report a
//! coarser "error parsing X" diagnostic at the start of the definition on their way out.
use std::collections::HashSet;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::diagnostics::{Diagnostics, ErrorKind, Severity};

use super::ast::*;
use super::errors::ParsingError;
use super::lexing::Lexer;
use super::source::{CharSource, Position};
use super::token::{Token, TokenType, TokenValue};


pub type ParseResult<T> = Result<T, ParsingError>;


/// Builds a left-associative chain of binary operations over the next tighter precedence level.
macro_rules! parse_binary_operator {
    ($self:ident, $next:ident, $($token_type:ident => $operator:ident),*) => {{
        let mut root: Expression = $self.$next()?;

        loop {
            let operator = match $self.token.token_type {
                $(TokenType::$token_type => BinaryOperator::$operator,)*

                // End of this level of precedence
                _ => break,
            };

            $self.consume_token()?;
            let right: Expression = $self.$next()?;
            let position = root.position.clone();
            root = Expression::new(ExpressionKind::Binary {
                operator,
                left: Box::new(root),
                right: Box::new(right),
            }, position);
        }

        Ok(root)
    }};
}


/// Consumes the current token if it has the given type, otherwise fails the production with
/// the given error kind.
macro_rules! expect_token {
    ($self:ident, $token_type:ident, $kind:expr) => {
        match $self.token.token_type {
            TokenType::$token_type => {
                $self.consume_token()?;
            }
            _ => return $self.syntax_error($kind),
        }
    };
}


/// The error kinds reported by the two variable-like definition productions.
struct VariableKinds {
    identifier: ErrorKind,
    colon: ErrorKind,
    type_name: ErrorKind,
    assign: ErrorKind,
    semicolon: ErrorKind,
    failed: ErrorKind,
}


const VAR_DEF: VariableKinds = VariableKinds {
    identifier: ErrorKind::VarDefExpectedIdentifier,
    colon: ErrorKind::VarDefExpectedColon,
    type_name: ErrorKind::VarDefExpectedType,
    assign: ErrorKind::VarDefExpectedAssign,
    semicolon: ErrorKind::VarDefExpectedSemicolon,
    failed: ErrorKind::VarDefFailed,
};


const CONST_DEF: VariableKinds = VariableKinds {
    identifier: ErrorKind::ConstDefExpectedIdentifier,
    colon: ErrorKind::ConstDefExpectedColon,
    type_name: ErrorKind::ConstDefExpectedType,
    assign: ErrorKind::ConstDefExpectedAssign,
    semicolon: ErrorKind::ConstDefExpectedSemicolon,
    failed: ErrorKind::ConstDefFailed,
};


type DefinitionProduction<P> = fn(&mut P) -> ParseResult<Definition>;


/// Parses a whole program from a character source, reporting problems into a [`Diagnostics`]
/// sink.
pub struct Parser<'d, S: CharSource> {
    lexer: Lexer<S>,
    token: Token,
    diagnostics: &'d mut Diagnostics,
}


impl<'d, S: CharSource> Parser<'d, S> {
    /// Creates a parser and loads the first token of the source.
    pub fn new(source: S, diagnostics: &'d mut Diagnostics) -> Self {
        let mut lexer = Lexer::new(source);
        let token = next_significant_token(&mut lexer);
        Self { lexer, token, diagnostics }
    }


    /// Parses the complete program.
    ///
    /// The program must consist of definitions only, must contain a `main` function, and no two
    /// top-level definitions may share a name.
    ///
    /// # Errors
    ///
    /// Returns the first error encountered after it has been reported to the sink.
    pub fn parse_program(&mut self) -> ParseResult<Program> {
        info!("parsing program");
        self.check_current_token()?;

        let mut definitions: Vec<Definition> = vec![];
        while let Some(production) = Self::definition_production(self.token.token_type) {
            let definition = production(self)?;
            debug!(name = definition.name(), "parsed definition");
            definitions.push(definition);
        }

        if self.token.token_type != TokenType::EndOfInput {
            return self.syntax_error(ErrorKind::ExpectedDefinition);
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for definition in &definitions {
            if !seen.insert(definition.name()) {
                let position = definition.position().clone();
                return self.error_at(ErrorKind::DefinitionNameConflict, position);
            }
        }

        let has_main = definitions.iter().any(|d| matches!(d, Definition::Fn(f) if f.name == "main"));
        if !has_main {
            return self.syntax_error(ErrorKind::MissingMain);
        }

        Ok(Program { definitions })
    }


    /// Looks up the production for a definition introduced by the given keyword.
    fn definition_production(token_type: TokenType) -> Option<DefinitionProduction<Self>> {
        let production: DefinitionProduction<Self> = match token_type {
            TokenType::Var => Self::var_definition,
            TokenType::Const => Self::const_definition,
            TokenType::Struct => Self::struct_definition,
            TokenType::Variant => Self::variant_definition,
            TokenType::Fn => Self::fn_definition,
            _ => return None,
        };

        Some(production)
    }


    fn var_definition(&mut self) -> ParseResult<Definition> {
        self.parse_var_def().map(Definition::Var)
    }


    fn const_definition(&mut self) -> ParseResult<Definition> {
        self.parse_const_def().map(Definition::Const)
    }


    fn struct_definition(&mut self) -> ParseResult<Definition> {
        self.parse_struct_def().map(Definition::Struct)
    }


    fn variant_definition(&mut self) -> ParseResult<Definition> {
        self.parse_variant_def().map(Definition::Variant)
    }


    fn fn_definition(&mut self) -> ParseResult<Definition> {
        self.parse_fn_def().map(Definition::Fn)
    }


    /// Advances to the next token that is not a comment and returns the token it replaces.
    ///
    /// # Errors
    ///
    /// Fails if the new current token is a lexical error, after reporting it.
    fn consume_token(&mut self) -> ParseResult<Token> {
        let next = next_significant_token(&mut self.lexer);
        let previous = std::mem::replace(&mut self.token, next);
        self.check_current_token()?;
        Ok(previous)
    }


    fn check_current_token(&mut self) -> ParseResult<()> {
        match self.token.error_kind() {
            Some(kind) => self.syntax_error(kind),
            None => Ok(()),
        }
    }


    /// Reports `kind` at the current token and fails the production.
    fn syntax_error<T>(&mut self, kind: ErrorKind) -> ParseResult<T> {
        let found = self.token.token_type.spelling().unwrap_or(self.token.value.as_str());
        debug!(found, ?kind, "unexpected token");

        let position = self.token.position.clone();
        self.error_at(kind, position)
    }


    fn error_at<T>(&mut self, kind: ErrorKind, position: Position) -> ParseResult<T> {
        // a syntax error always ends the parse, so the sink's abort signal adds nothing here
        self.diagnostics.report(kind, position.clone(), Severity::Error).ok();
        Err(ParsingError::new(kind, position))
    }


    /// Reports the aggregate "error parsing X" diagnostic if the production failed.
    fn aggregate<T>(&mut self, result: ParseResult<T>, kind: ErrorKind, position: Position) -> ParseResult<T> {
        if result.is_err() {
            self.diagnostics.report(kind, position, Severity::Error).ok();
        }

        result
    }


    fn expect_identifier(&mut self, kind: ErrorKind) -> ParseResult<String> {
        match self.token.token_type {
            TokenType::Identifier => Ok(self.consume_token()?.value),
            _ => self.syntax_error(kind),
        }
    }


    /// Parses a type name, which is an identifier or one of the primitive type keywords.
    fn parse_type_name(&mut self, kind: ErrorKind) -> ParseResult<String> {
        if self.token.token_type == TokenType::Identifier || self.token.token_type.is_primitive_type() {
            return Ok(self.consume_token()?.value);
        }

        self.syntax_error(kind)
    }


    /// Parses a variable definition: `"var" id ":" typeId "=" Expr ";"`.
    fn parse_var_def(&mut self) -> ParseResult<VarDef> {
        self.parse_variable(&VAR_DEF)
    }


    /// Parses a constant definition: `"const" id ":" typeId "=" Expr ";"`.
    fn parse_const_def(&mut self) -> ParseResult<ConstDef> {
        self.parse_variable(&CONST_DEF)
    }


    fn parse_variable(&mut self, kinds: &VariableKinds) -> ParseResult<VarDef> {
        let position = self.token.position.clone();
        let result = self.parse_variable_body(kinds, position.clone());
        self.aggregate(result, kinds.failed, position)
    }


    fn parse_variable_body(&mut self, kinds: &VariableKinds, position: Position) -> ParseResult<VarDef> {
        self.consume_token()?;
        let name = self.expect_identifier(kinds.identifier)?;
        expect_token!(self, Colon, kinds.colon);
        let type_name = self.parse_type_name(kinds.type_name)?;
        expect_token!(self, Assign, kinds.assign);
        let initializer = self.parse_expression()?;
        expect_token!(self, Semicolon, kinds.semicolon);

        Ok(VarDef { name, type_name, initializer, position })
    }


    /// Parses a struct definition:
    ///
    /// `"struct" typeId "{" { id ":" typeId ";" } "}" ";"`
    fn parse_struct_def(&mut self) -> ParseResult<StructDef> {
        let position = self.token.position.clone();
        let result = self.parse_struct_body(position.clone());
        self.aggregate(result, ErrorKind::StructDefFailed, position)
    }


    fn parse_struct_body(&mut self, position: Position) -> ParseResult<StructDef> {
        self.consume_token()?;
        let name = self.expect_identifier(ErrorKind::StructDefExpectedTypeName)?;
        expect_token!(self, LeftBrace, ErrorKind::StructDefExpectedOpeningBrace);

        let mut members: Vec<StructMember> = vec![];
        loop {
            match self.token.token_type {
                TokenType::RightBrace => break,
                TokenType::Identifier => {
                    let member_position = self.token.position.clone();
                    let member_name = self.consume_token()?.value;
                    expect_token!(self, Colon, ErrorKind::StructMemberExpectedColon);
                    let type_name = self.parse_type_name(ErrorKind::StructMemberExpectedType)?;
                    expect_token!(self, Semicolon, ErrorKind::StructMemberExpectedSemicolon);

                    members.push(StructMember { name: member_name, type_name, position: member_position });
                }
                _ => return self.syntax_error(ErrorKind::StructDefExpectedClosingBrace),
            }
        }

        self.consume_token()?;
        expect_token!(self, Semicolon, ErrorKind::StructDefExpectedSemicolon);
        Ok(StructDef { name, members, position })
    }


    /// Parses a variant definition, whose member list may be empty or end with a comma:
    ///
    /// `"variant" typeId "{" [ typeId { "," typeId } [","] ] "}" ";"`
    fn parse_variant_def(&mut self) -> ParseResult<VariantDef> {
        let position = self.token.position.clone();
        let result = self.parse_variant_body(position.clone());
        self.aggregate(result, ErrorKind::VariantDefFailed, position)
    }


    fn parse_variant_body(&mut self, position: Position) -> ParseResult<VariantDef> {
        self.consume_token()?;
        let name = self.expect_identifier(ErrorKind::VariantDefExpectedTypeName)?;
        expect_token!(self, LeftBrace, ErrorKind::VariantDefExpectedOpeningBrace);

        let mut members: Vec<String> = vec![];
        while self.token.token_type != TokenType::RightBrace {
            members.push(self.parse_type_name(ErrorKind::VariantDefExpectedClosingBrace)?);

            match self.token.token_type {
                TokenType::Comma => {
                    self.consume_token()?;
                }
                TokenType::RightBrace => break,
                _ => return self.syntax_error(ErrorKind::VariantDefExpectedClosingBrace),
            }
        }

        self.consume_token()?;
        expect_token!(self, Semicolon, ErrorKind::VariantDefExpectedSemicolon);
        Ok(VariantDef { name, members, position })
    }


    /// Parses a function definition:
    ///
    /// `"fn" id "(" [ Param { "," Param } ] ")" "->" typeId Block`
    fn parse_fn_def(&mut self) -> ParseResult<FnDef> {
        let position = self.token.position.clone();
        let result = self.parse_fn_body(position.clone());
        self.aggregate(result, ErrorKind::FnDefFailed, position)
    }


    fn parse_fn_body(&mut self, position: Position) -> ParseResult<FnDef> {
        self.consume_token()?;
        let name = self.expect_identifier(ErrorKind::FnDefExpectedIdentifier)?;
        expect_token!(self, LeftParen, ErrorKind::FnDefExpectedOpeningParen);

        let mut params: Vec<Param> = vec![];
        if matches!(self.token.token_type, TokenType::Identifier | TokenType::Const) {
            loop {
                params.push(self.parse_param()?);
                if self.token.token_type != TokenType::Comma {
                    break;
                }
                self.consume_token()?;
            }
        }

        expect_token!(self, RightParen, ErrorKind::FnDefExpectedClosingParen);
        expect_token!(self, Arrow, ErrorKind::FnDefExpectedArrow);
        let return_type = self.parse_type_name(ErrorKind::FnDefExpectedReturnType)?;

        if self.token.token_type != TokenType::LeftBrace {
            return self.syntax_error(ErrorKind::FnDefExpectedBody);
        }
        let body = self.parse_block()?;

        Ok(FnDef { name, params, return_type, body, position })
    }


    /// Parses a parameter: `[ "const" ] id ":" typeId`.
    fn parse_param(&mut self) -> ParseResult<Param> {
        let position = self.token.position.clone();
        let constant = self.token.token_type == TokenType::Const;
        if constant {
            self.consume_token()?;
        }

        let name = self.expect_identifier(ErrorKind::ParamExpectedIdentifier)?;
        expect_token!(self, Colon, ErrorKind::ParamExpectedColon);
        let type_name = self.parse_type_name(ErrorKind::ParamExpectedType)?;

        Ok(Param { name, type_name, constant, position })
    }


    /// Parses a braced list of statements.
    fn parse_block(&mut self) -> ParseResult<Block> {
        let position = self.token.position.clone();
        expect_token!(self, LeftBrace, ErrorKind::ExpectedBlock);

        let mut statements: Vec<Statement> = vec![];
        loop {
            match self.token.token_type {
                TokenType::RightBrace => break,
                // these can only start a top-level definition, so the block was never closed
                TokenType::EndOfInput
                | TokenType::Fn
                | TokenType::Struct
                | TokenType::Variant => return self.syntax_error(ErrorKind::BlockExpectedClosingBrace),
                _ => statements.push(self.parse_statement()?),
            }
        }

        self.consume_token()?;
        Ok(Block { statements, position })
    }


    fn parse_statement(&mut self) -> ParseResult<Statement> {
        let position = self.token.position.clone();
        let kind = match self.token.token_type {
            TokenType::Var => StatementKind::VarDef(self.parse_var_def()?),
            TokenType::Const => StatementKind::ConstDef(self.parse_const_def()?),
            TokenType::If => StatementKind::If(self.parse_if()?),
            TokenType::For => StatementKind::For(self.parse_for()?),
            TokenType::While => self.parse_while()?,
            TokenType::Match => StatementKind::VariantMatch(self.parse_match()?),
            // an object literal can never stand alone as a statement, so `{` always opens a block
            TokenType::LeftBrace => StatementKind::Block(self.parse_block()?),

            TokenType::Continue => {
                self.consume_token()?;
                expect_token!(self, Semicolon, ErrorKind::ExpectedSemicolon);
                StatementKind::Continue
            }

            TokenType::Break => {
                self.consume_token()?;
                expect_token!(self, Semicolon, ErrorKind::ExpectedSemicolon);
                StatementKind::Break
            }

            TokenType::Return => {
                self.consume_token()?;
                let value = match self.token.token_type {
                    TokenType::Semicolon => None,
                    _ => Some(self.parse_expression()?),
                };
                expect_token!(self, Semicolon, ErrorKind::ExpectedSemicolon);
                StatementKind::Return(value)
            }

            TokenType::Stdin => {
                let targets = self.parse_stream(TokenType::StreamExtract, ErrorKind::StdinExpectedExtraction)?;
                StatementKind::StdinExtraction(targets)
            }

            TokenType::Stdout => {
                let values = self.parse_stream(TokenType::StreamInsert, ErrorKind::StdoutExpectedInsertion)?;
                StatementKind::StdoutInsertion(values)
            }

            _ => self.parse_expression_or_assignment()?,
        };

        Ok(Statement { kind, position })
    }


    /// Parses the operand list of `stdin >> a >> b;` or `stdout << a << b;`.
    fn parse_stream(&mut self, operator: TokenType, kind: ErrorKind) -> ParseResult<Vec<Expression>> {
        self.consume_token()?;
        if self.token.token_type != operator {
            return self.syntax_error(kind);
        }

        let mut operands: Vec<Expression> = vec![];
        while self.token.token_type == operator {
            self.consume_token()?;
            operands.push(self.parse_expression()?);
        }

        expect_token!(self, Semicolon, ErrorKind::ExpectedSemicolon);
        Ok(operands)
    }


    fn parse_expression_or_assignment(&mut self) -> ParseResult<StatementKind> {
        let expression = self.parse_expression()?;

        let kind = match self.token.token_type {
            TokenType::Assign => {
                self.consume_token()?;
                let value = self.parse_expression()?;
                StatementKind::Assignment { target: expression, value }
            }
            _ => StatementKind::Expression(expression),
        };

        expect_token!(self, Semicolon, ErrorKind::ExpectedSemicolon);
        Ok(kind)
    }


    /// Parses `"if" Expr Block { "elif" Expr Block } [ "else" Block ]`.
    fn parse_if(&mut self) -> ParseResult<IfStmt> {
        self.consume_token()?;
        let condition = self.parse_expression()?;
        let then_block = self.parse_block()?;

        let mut elifs: Vec<(Expression, Block)> = vec![];
        while self.token.token_type == TokenType::Elif {
            self.consume_token()?;
            let condition = self.parse_expression()?;
            elifs.push((condition, self.parse_block()?));
        }

        let else_block = match self.token.token_type {
            TokenType::Else => {
                self.consume_token()?;
                Some(self.parse_block()?)
            }
            _ => None,
        };

        Ok(IfStmt { condition, then_block, elifs, else_block })
    }


    /// Parses `"for" id "in" Expr "until" Expr Block`.
    fn parse_for(&mut self) -> ParseResult<ForStmt> {
        self.consume_token()?;
        let variable = self.expect_identifier(ErrorKind::ForExpectedIdentifier)?;
        expect_token!(self, In, ErrorKind::ForExpectedIn);
        let start = self.parse_expression()?;
        expect_token!(self, Until, ErrorKind::ForExpectedUntil);
        let end = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(ForStmt { variable, start, end, body })
    }


    fn parse_while(&mut self) -> ParseResult<StatementKind> {
        self.consume_token()?;
        let condition = self.parse_expression()?;
        let body = self.parse_block()?;

        Ok(StatementKind::While { condition, body })
    }


    /// Parses `"match" Expr "{" { "case" typeId "->" Block } "}"`.
    fn parse_match(&mut self) -> ParseResult<VariantMatch> {
        self.consume_token()?;
        let scrutinee = self.parse_expression()?;
        expect_token!(self, LeftBrace, ErrorKind::MatchExpectedOpeningBrace);

        let mut cases: IndexMap<String, Block> = IndexMap::new();
        loop {
            match self.token.token_type {
                TokenType::RightBrace => break,
                TokenType::Case => {
                    let case_position = self.token.position.clone();
                    self.consume_token()?;
                    let type_name = self.parse_type_name(ErrorKind::CaseExpectedType)?;
                    expect_token!(self, Arrow, ErrorKind::CaseExpectedArrow);
                    let block = self.parse_block()?;

                    if cases.contains_key(&type_name) {
                        return self.error_at(ErrorKind::DuplicateMatchCase, case_position);
                    }
                    cases.insert(type_name, block);
                }
                _ => return self.syntax_error(ErrorKind::MatchExpectedCase),
            }
        }

        self.consume_token()?;
        Ok(VariantMatch { scrutinee, cases })
    }


    /// Parses an expression, such as `x * 3 > 20 && done`.
    ///
    /// Uses recursive descent with a separate rule for each level of precedence, from
    /// logical-or (loosest) down to multiplicative, unary and postfix expressions.
    fn parse_expression(&mut self) -> ParseResult<Expression> {
        self.parse_logical_or()
    }


    fn parse_logical_or(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_logical_and, Or => Or)
    }


    fn parse_logical_and(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_equality, And => And)
    }


    fn parse_equality(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_relational, Equal => Equal, NotEqual => NotEqual)
    }


    fn parse_relational(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_additive,
            Less => Less, LessEqual => LessEqual, Greater => Greater, GreaterEqual => GreaterEqual)
    }


    fn parse_additive(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_multiplicative, Plus => Add, Minus => Subtract)
    }


    fn parse_multiplicative(&mut self) -> ParseResult<Expression> {
        parse_binary_operator!(self, parse_unary, Star => Multiply, Slash => Divide, Percent => Modulo)
    }


    fn parse_unary(&mut self) -> ParseResult<Expression> {
        let operator = match self.token.token_type {
            TokenType::Minus => UnaryOperator::Negate,
            TokenType::Bang => UnaryOperator::Not,
            _ => return self.parse_functional(),
        };

        let position = self.consume_token()?.position;
        let operand = self.parse_unary()?;
        Ok(Expression::new(ExpressionKind::Unary { operator, operand: Box::new(operand) }, position))
    }


    /// Parses a primary expression followed by any chain of calls, member accesses and
    /// `as` variant accesses.
    fn parse_functional(&mut self) -> ParseResult<Expression> {
        let base = self.parse_primary()?;

        let mut postfixes: Vec<Postfix> = vec![];
        loop {
            let position = self.token.position.clone();
            let kind = match self.token.token_type {
                TokenType::LeftParen => {
                    self.consume_token()?;
                    PostfixKind::Call(self.parse_call_args()?)
                }
                TokenType::Dot => {
                    self.consume_token()?;
                    PostfixKind::Member(self.expect_identifier(ErrorKind::MemberExpectedIdentifier)?)
                }
                TokenType::As => {
                    self.consume_token()?;
                    PostfixKind::VariantAccess(self.parse_type_name(ErrorKind::AsExpectedType)?)
                }
                _ => break,
            };

            postfixes.push(Postfix { kind, position });
        }

        if postfixes.is_empty() {
            return Ok(base);
        }

        let position = base.position.clone();
        Ok(Expression::new(ExpressionKind::Functional { base: Box::new(base), postfixes }, position))
    }


    /// Parses call arguments after the opening parenthesis, up to and including the `)`.
    fn parse_call_args(&mut self) -> ParseResult<Vec<Expression>> {
        let mut args: Vec<Expression> = vec![];
        if self.token.token_type != TokenType::RightParen {
            loop {
                args.push(self.parse_expression()?);
                if self.token.token_type != TokenType::Comma {
                    break;
                }
                self.consume_token()?;
            }
        }

        expect_token!(self, RightParen, ErrorKind::ExpectedClosingParen);
        Ok(args)
    }


    /// Parses an identifier, literal, object, parenthesized expression or primitive cast.
    fn parse_primary(&mut self) -> ParseResult<Expression> {
        let position = self.token.position.clone();
        let literal = match (&self.token.token_type, &self.token.typed_value) {
            (TokenType::IntegerLiteral, Some(TokenValue::Integer(n))) => Some(Literal::Int(*n)),
            (TokenType::FloatLiteral, Some(TokenValue::Float(n))) => Some(Literal::Float(*n)),
            (TokenType::BoolLiteral, Some(TokenValue::Bool(b))) => Some(Literal::Bool(*b)),
            (TokenType::CharLiteral, Some(TokenValue::Char(c))) => Some(Literal::Char(*c)),
            (TokenType::StringLiteral, Some(TokenValue::String(s))) => Some(Literal::String(s.clone())),
            _ => None,
        };

        if let Some(literal) = literal {
            self.consume_token()?;
            return Ok(Expression::new(ExpressionKind::Literal(literal), position));
        }

        let cast_target = match self.token.token_type {
            TokenType::Int => Some(Primitive::Int),
            TokenType::Float => Some(Primitive::Float),
            TokenType::Bool => Some(Primitive::Bool),
            TokenType::Char => Some(Primitive::Char),
            TokenType::String => Some(Primitive::String),
            _ => None,
        };

        if let Some(target) = cast_target {
            self.consume_token()?;
            expect_token!(self, LeftParen, ErrorKind::CastExpectedOpeningParen);
            let operand = self.parse_expression()?;
            expect_token!(self, RightParen, ErrorKind::ExpectedClosingParen);
            return Ok(Expression::new(ExpressionKind::Cast { target, operand: Box::new(operand) }, position));
        }

        match self.token.token_type {
            TokenType::Identifier => {
                let name = self.consume_token()?.value;
                Ok(Expression::new(ExpressionKind::Identifier(name), position))
            }

            TokenType::LeftParen => {
                self.consume_token()?;
                let inner = self.parse_expression()?;
                expect_token!(self, RightParen, ErrorKind::ExpectedClosingParen);
                Ok(Expression::new(ExpressionKind::Paren(Box::new(inner)), position))
            }

            TokenType::LeftBrace => self.parse_object(position),
            _ => self.syntax_error(ErrorKind::ExpectedExpression),
        }
    }


    /// Parses an object literal; a trailing comma is allowed.
    ///
    /// `"{" [ id ":" Expr { "," id ":" Expr } [","] ] "}"`
    fn parse_object(&mut self, position: Position) -> ParseResult<Expression> {
        self.consume_token()?;

        let mut members: IndexMap<String, Expression> = IndexMap::new();
        while self.token.token_type != TokenType::RightBrace {
            let member_position = self.token.position.clone();
            let name = self.expect_identifier(ErrorKind::ObjectExpectedIdentifier)?;
            expect_token!(self, Colon, ErrorKind::ObjectExpectedColon);
            let value = self.parse_expression()?;

            if members.contains_key(&name) {
                return self.error_at(ErrorKind::DuplicateObjectMember, member_position);
            }
            members.insert(name, value);

            match self.token.token_type {
                TokenType::Comma => {
                    self.consume_token()?;
                }
                TokenType::RightBrace => break,
                _ => return self.syntax_error(ErrorKind::ObjectExpectedClosingBrace),
            }
        }

        self.consume_token()?;
        Ok(Expression::new(ExpressionKind::Object(members), position))
    }
}


/// Pulls tokens until one that is not a comment turns up.
fn next_significant_token<S: CharSource>(lexer: &mut Lexer<S>) -> Token {
    loop {
        let token = lexer.next_token();
        match token.token_type {
            TokenType::Comment | TokenType::MultilineComment => continue,
            _ => return token,
        }
    }
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::source::StringSource;

    const MAIN: &str = "fn main() -> int { return 0; }";


    fn parse(text: &str) -> (ParseResult<Program>, Vec<ErrorKind>) {
        let mut diagnostics = Diagnostics::new(0);
        let result = Parser::new(StringSource::new(text, "test"), &mut diagnostics).parse_program();
        (result, diagnostics.kinds())
    }


    fn parse_expr(text: &str) -> Expression {
        let mut diagnostics = Diagnostics::new(0);
        let mut parser = Parser::new(StringSource::new(text, "test"), &mut diagnostics);
        let expression = parser.parse_expression().unwrap();
        assert_eq!(parser.token.token_type, TokenType::EndOfInput);
        expression
    }


    /// Renders an expression as an s-expression so tests can compare tree shapes compactly.
    fn sexpr(expression: &Expression) -> String {
        match &expression.kind {
            ExpressionKind::Binary { operator, left, right } =>
                format!("({} {} {})", operator.symbol(), sexpr(left), sexpr(right)),
            ExpressionKind::Unary { operator, operand } => format!("({} {})", operator.symbol(), sexpr(operand)),
            ExpressionKind::Functional { base, postfixes } => {
                let mut text = sexpr(base);
                for postfix in postfixes {
                    text = match &postfix.kind {
                        PostfixKind::Call(args) =>
                            format!("(call {} [{}])", text, args.iter().map(sexpr).collect::<Vec<String>>().join(" ")),
                        PostfixKind::Member(name) => format!("(. {} {})", text, name),
                        PostfixKind::VariantAccess(name) => format!("(as {} {})", text, name),
                    };
                }
                text
            }
            ExpressionKind::Identifier(name) => name.clone(),
            ExpressionKind::Literal(Literal::Int(n)) => n.to_string(),
            ExpressionKind::Literal(Literal::Float(n)) => format!("{:?}", n),
            ExpressionKind::Literal(Literal::Bool(b)) => b.to_string(),
            ExpressionKind::Literal(Literal::Char(c)) => format!("{:?}", c),
            ExpressionKind::Literal(Literal::String(s)) => format!("{:?}", s),
            ExpressionKind::Object(members) => format!(
                "{{{}}}",
                members.iter().map(|(k, v)| format!("{}: {}", k, sexpr(v))).collect::<Vec<String>>().join(", ")
            ),
            ExpressionKind::Paren(inner) => format!("(paren {})", sexpr(inner)),
            ExpressionKind::Cast { target, operand } => format!("(cast {:?} {})", target, sexpr(operand)),
        }
    }


    /// Omits each required token of a definition in turn and checks that exactly the expected
    /// specific diagnostic and the aggregate diagnostic are reported.
    fn check_omissions(tokens: &[&str], expected: &[Option<ErrorKind>], aggregate: ErrorKind) {
        assert_eq!(tokens.len(), expected.len());

        for (i, kind) in expected.iter().enumerate() {
            let Some(kind) = kind else { continue };
            let text = tokens.iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, t)| *t)
                .collect::<Vec<&str>>()
                .join(" ");

            let (result, kinds) = parse(&format!("{} {}", text, MAIN));
            assert!(result.is_err(), "omitting {:?} should fail", tokens[i]);
            assert_eq!(kinds, vec![*kind, aggregate], "omitting {:?} from {:?}", tokens[i], text);
        }
    }


    #[test]
    fn test_minimal_program() {
        let (result, kinds) = parse("fn main() -> int { return 42; }");
        let program = result.unwrap();
        assert!(kinds.is_empty());
        assert_eq!(program.definitions.len(), 1);
        assert_eq!(program.definitions[0].name(), "main");

        match &program.definitions[0] {
            Definition::Fn(f) => {
                assert_eq!(f.return_type, "int");
                assert_eq!(f.body.statements.len(), 1);

                let Some(statement) = f.body.statements.first() else { unreachable!() };
                match &statement.kind {
                    StatementKind::Return(Some(value)) => {
                        assert_eq!(value.kind, ExpressionKind::Literal(Literal::Int(42)));
                        assert_eq!((value.position.line, value.position.column), (1, 27));
                    }
                    other => panic!("expected return, got {:?}", other),
                }
            }
            other => panic!("expected fn, got {:?}", other),
        }
    }


    #[test]
    fn test_var_def_omissions() {
        check_omissions(
            &["var", "x", ":", "int", "=", "5", ";"],
            &[
                None,
                Some(ErrorKind::VarDefExpectedIdentifier),
                Some(ErrorKind::VarDefExpectedColon),
                Some(ErrorKind::VarDefExpectedType),
                Some(ErrorKind::VarDefExpectedAssign),
                Some(ErrorKind::ExpectedExpression),
                Some(ErrorKind::VarDefExpectedSemicolon),
            ],
            ErrorKind::VarDefFailed,
        );
    }


    #[test]
    fn test_const_def_omissions() {
        check_omissions(
            &["const", "x", ":", "float", "=", "1.5", ";"],
            &[
                None,
                Some(ErrorKind::ConstDefExpectedIdentifier),
                Some(ErrorKind::ConstDefExpectedColon),
                Some(ErrorKind::ConstDefExpectedType),
                Some(ErrorKind::ConstDefExpectedAssign),
                Some(ErrorKind::ExpectedExpression),
                Some(ErrorKind::ConstDefExpectedSemicolon),
            ],
            ErrorKind::ConstDefFailed,
        );
    }


    #[test]
    fn test_struct_def_omissions() {
        check_omissions(
            &["struct", "S", "{", "a", ":", "int", ";", "}", ";"],
            &[
                None,
                Some(ErrorKind::StructDefExpectedTypeName),
                Some(ErrorKind::StructDefExpectedOpeningBrace),
                Some(ErrorKind::StructDefExpectedClosingBrace),
                Some(ErrorKind::StructMemberExpectedColon),
                Some(ErrorKind::StructMemberExpectedType),
                Some(ErrorKind::StructMemberExpectedSemicolon),
                Some(ErrorKind::StructDefExpectedClosingBrace),
                Some(ErrorKind::StructDefExpectedSemicolon),
            ],
            ErrorKind::StructDefFailed,
        );
    }


    #[test]
    fn test_variant_def_omissions() {
        check_omissions(
            &["variant", "V", "{", "int", ",", "float", "}", ";"],
            &[
                None,
                Some(ErrorKind::VariantDefExpectedTypeName),
                Some(ErrorKind::VariantDefExpectedOpeningBrace),
                Some(ErrorKind::VariantDefExpectedClosingBrace),
                Some(ErrorKind::VariantDefExpectedClosingBrace),
                // dropping the last member leaves a legal trailing comma
                None,
                Some(ErrorKind::VariantDefExpectedClosingBrace),
                Some(ErrorKind::VariantDefExpectedSemicolon),
            ],
            ErrorKind::VariantDefFailed,
        );
    }


    #[test]
    fn test_fn_def_omissions() {
        check_omissions(
            &["fn", "f", "(", "a", ":", "int", ")", "->", "int", "{", "return", "a", ";", "}"],
            &[
                None,
                Some(ErrorKind::FnDefExpectedIdentifier),
                Some(ErrorKind::FnDefExpectedOpeningParen),
                Some(ErrorKind::FnDefExpectedClosingParen),
                Some(ErrorKind::ParamExpectedColon),
                Some(ErrorKind::ParamExpectedType),
                Some(ErrorKind::FnDefExpectedClosingParen),
                Some(ErrorKind::FnDefExpectedArrow),
                Some(ErrorKind::FnDefExpectedReturnType),
                Some(ErrorKind::FnDefExpectedBody),
                None,
                None,
                Some(ErrorKind::ExpectedSemicolon),
                Some(ErrorKind::BlockExpectedClosingBrace),
            ],
            ErrorKind::FnDefFailed,
        );
    }


    #[test]
    fn test_variant_lists_allow_trailing_comma_and_emptiness() {
        let (result, kinds) = parse(&format!("variant A {{ int, }}; variant B {{}}; {}", MAIN));
        assert!(kinds.is_empty());

        let program = result.unwrap();
        match (&program.definitions[0], &program.definitions[1]) {
            (Definition::Variant(a), Definition::Variant(b)) => {
                assert_eq!(a.members, vec!["int".to_owned()]);
                assert!(b.members.is_empty());
            }
            other => panic!("expected variants, got {:?}", other),
        }
    }


    #[test]
    fn test_program_level_errors() {
        let (result, kinds) = parse("var x: int = 1;");
        assert!(result.is_err());
        assert_eq!(kinds, vec![ErrorKind::MissingMain]);

        let (_, kinds) = parse(&format!("{} var main: int = 1;", MAIN));
        assert_eq!(kinds, vec![ErrorKind::DefinitionNameConflict]);

        let (_, kinds) = parse(&format!("{} fn main() -> void {{}}", MAIN));
        assert_eq!(kinds, vec![ErrorKind::DefinitionNameConflict]);

        let (_, kinds) = parse(&format!("{} 5", MAIN));
        assert_eq!(kinds, vec![ErrorKind::ExpectedDefinition]);
    }


    #[test]
    fn test_diagnostic_positions() {
        let mut diagnostics = Diagnostics::new(0);
        let text = "fn main() -> int {\n    var x int = 1;\n}";
        let result = Parser::new(StringSource::new(text, "test"), &mut diagnostics).parse_program();
        assert!(result.is_err());

        let reported: Vec<(ErrorKind, usize, usize)> = diagnostics.records()
            .iter()
            .map(|d| (d.kind, d.position.line, d.position.column))
            .collect();
        assert_eq!(reported, vec![
            (ErrorKind::VarDefExpectedColon, 2, 11),
            (ErrorKind::VarDefFailed, 2, 5),
            (ErrorKind::FnDefFailed, 1, 1),
        ]);
        assert_eq!(
            diagnostics.records()[0].to_string(),
            "Syntax error: expected colon in var definition at test:2:11"
        );
    }


    #[test]
    fn test_lexical_errors_are_forwarded() {
        let (result, kinds) = parse("fn main() -> int { return 01; }");
        assert!(result.is_err());
        assert_eq!(kinds, vec![ErrorKind::InvalidNumberLiteral, ErrorKind::FnDefFailed]);
    }


    #[test]
    fn test_comments_are_skipped() {
        let (result, kinds) = parse("$ leading\nfn main() -> int { $$ inner $$ return 1; } $ trailing");
        assert!(kinds.is_empty());
        assert!(result.is_ok());
    }


    #[test]
    fn test_precedence_and_associativity() {
        assert_eq!(sexpr(&parse_expr("1 + 2 * 3 == 7 || false && true")), "(|| (== (+ 1 (* 2 3)) 7) (&& false true))");
        assert_eq!(sexpr(&parse_expr("a - b - c")), "(- (- a b) c)");
        assert_eq!(sexpr(&parse_expr("a < b != c >= d")), "(!= (< a b) (>= c d))");
        assert_eq!(sexpr(&parse_expr("-x % !y / 2")), "(/ (% (- x) (! y)) 2)");
        assert_eq!(sexpr(&parse_expr("(a + b) * c")), "(* (paren (+ a b)) c)");
    }


    #[test]
    fn test_postfix_chains() {
        assert_eq!(sexpr(&parse_expr("p.q(1, x).r as int")), "(as (. (call (. p q) [1 x]) r) int)");
        assert_eq!(sexpr(&parse_expr("f()()")), "(call (call f []) [])");
    }


    #[test]
    fn test_objects_and_casts() {
        assert_eq!(sexpr(&parse_expr("{x: 1, y: 'c',}")), "{x: 1, y: 'c'}");
        assert_eq!(sexpr(&parse_expr("{}")), "{}");
        assert_eq!(sexpr(&parse_expr("float(n) + 0.5")), "(+ (cast Float n) 0.5)");
        assert_eq!(sexpr(&parse_expr("string(\"a\")")), "(cast String \"a\")");
    }


    #[test]
    fn test_duplicate_object_member() {
        let (_, kinds) = parse("fn main() -> int { var p: P = {a: 1, a: 2}; return 0; }");
        assert_eq!(kinds, vec![ErrorKind::DuplicateObjectMember, ErrorKind::VarDefFailed, ErrorKind::FnDefFailed]);
    }


    #[test]
    fn test_statements() {
        let text = "fn main() -> void {
            var i: int = 0;
            const c: char = 'x';
            i = i + 1;
            stdin >> i >> p.x;
            stdout << i << \"\\n\";
            if i < 1 { break; } elif i < 2 { continue; } else { return; }
            for k in 0 until 10 { f(k); }
            while true { }
            match v { case int -> { } case Point -> { } }
            { var inner: int = 1; }
        }";
        let (result, kinds) = parse(text);
        assert!(kinds.is_empty(), "{:?}", kinds);

        let program = result.unwrap();
        let body = match &program.definitions[0] {
            Definition::Fn(f) => &f.body,
            other => panic!("expected fn, got {:?}", other),
        };

        let shapes: Vec<&str> = body.statements.iter().map(|s| match &s.kind {
            StatementKind::VarDef(_) => "var",
            StatementKind::ConstDef(_) => "const",
            StatementKind::Assignment { .. } => "assign",
            StatementKind::StdinExtraction(targets) if targets.len() == 2 => "stdin",
            StatementKind::StdoutInsertion(values) if values.len() == 2 => "stdout",
            StatementKind::If(stmt) if stmt.elifs.len() == 1 && stmt.else_block.is_some() => "if",
            StatementKind::For(stmt) if stmt.variable == "k" => "for",
            StatementKind::While { .. } => "while",
            StatementKind::VariantMatch(stmt) if stmt.cases.len() == 2 => "match",
            StatementKind::Block(block) if block.statements.len() == 1 => "block",
            _ => "other",
        }).collect();

        assert_eq!(shapes, vec!["var", "const", "assign", "stdin", "stdout", "if", "for", "while", "match", "block"]);
    }


    #[test]
    fn test_duplicate_match_case() {
        let (_, kinds) = parse("fn main() -> void { match v { case int -> {} case int -> {} } }");
        assert_eq!(kinds, vec![ErrorKind::DuplicateMatchCase, ErrorKind::FnDefFailed]);
    }


    #[test]
    fn test_statement_errors() {
        let (_, kinds) = parse("fn main() -> void { stdout i; }");
        assert_eq!(kinds, vec![ErrorKind::StdoutExpectedInsertion, ErrorKind::FnDefFailed]);

        let (_, kinds) = parse("fn main() -> void { for i 0 until 3 {} }");
        assert_eq!(kinds, vec![ErrorKind::ForExpectedIn, ErrorKind::FnDefFailed]);

        let (_, kinds) = parse("fn main() -> void { match v { int -> {} } }");
        assert_eq!(kinds, vec![ErrorKind::MatchExpectedCase, ErrorKind::FnDefFailed]);

        let (_, kinds) = parse("fn main() -> void { if x }");
        assert_eq!(kinds, vec![ErrorKind::ExpectedBlock, ErrorKind::FnDefFailed]);
    }
}
