//! The abstract syntax tree produced by the parser.
//!
//! Every node owns its children outright and carries the [`Position`] it started at. The tree
//! is built once and only read afterwards: both the semantic analyzer and the interpreter walk
//! it with exhaustive `match`es over the node enums below.
use indexmap::IndexMap;

use super::source::Position;
use super::types::TypeId;


/// The root of a parsed source file.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub definitions: Vec<Definition>,
}


#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    Var(VarDef),
    Const(ConstDef),
    Struct(StructDef),
    Variant(VariantDef),
    Fn(FnDef),
}


impl Definition {
    pub fn name(&self) -> &str {
        match self {
            Self::Var(d) | Self::Const(d) => &d.name,
            Self::Struct(d) => &d.name,
            Self::Variant(d) => &d.name,
            Self::Fn(d) => &d.name,
        }
    }


    pub fn position(&self) -> &Position {
        match self {
            Self::Var(d) | Self::Const(d) => &d.position,
            Self::Struct(d) => &d.position,
            Self::Variant(d) => &d.position,
            Self::Fn(d) => &d.position,
        }
    }
}


/// `var name: type = initializer;`
#[derive(Debug, Clone, PartialEq)]
pub struct VarDef {
    pub name: String,
    pub type_name: String,
    pub initializer: Expression,
    pub position: Position,
}


/// `const name: type = initializer;` has the same shape as a variable definition.
pub type ConstDef = VarDef;


#[derive(Debug, Clone, PartialEq)]
pub struct StructMember {
    pub name: String,
    pub type_name: String,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct StructDef {
    pub name: String,
    pub members: Vec<StructMember>,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct VariantDef {
    pub name: String,
    /// Member type names as written; duplicates and emptiness are left to the analyzer.
    pub members: Vec<String>,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub type_name: String,
    pub constant: bool,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct FnDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: String,
    pub body: Block,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub statements: Vec<Statement>,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub kind: StatementKind,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    VarDef(VarDef),
    ConstDef(ConstDef),
    Expression(Expression),
    Assignment { target: Expression, value: Expression },
    /// `stdin >> a >> b;`
    StdinExtraction(Vec<Expression>),
    /// `stdout << a << b;`
    StdoutInsertion(Vec<Expression>),
    VariantMatch(VariantMatch),
    /// A nested `{ ... }` with its own scope.
    Block(Block),
    If(IfStmt),
    For(ForStmt),
    While { condition: Expression, body: Block },
    Continue,
    Break,
    Return(Option<Expression>),
}


#[derive(Debug, Clone, PartialEq)]
pub struct VariantMatch {
    pub scrutinee: Expression,
    /// Case blocks keyed by member type name, in source order.
    pub cases: IndexMap<String, Block>,
}


#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expression,
    pub then_block: Block,
    pub elifs: Vec<(Expression, Block)>,
    pub else_block: Option<Block>,
}


/// `for variable in start until end { ... }` iterates over `[start, end)`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForStmt {
    pub variable: String,
    pub start: Expression,
    pub end: Expression,
    pub body: Block,
}


#[derive(Debug, Clone, PartialEq)]
pub struct Expression {
    pub kind: ExpressionKind,
    pub position: Position,
}


impl Expression {
    pub fn new(kind: ExpressionKind, position: Position) -> Self {
        Self { kind, position }
    }


    /// Splits an assignable expression into its root variable and member path.
    ///
    /// Only a bare identifier or an identifier followed by member accesses (`p.pos.x`) names a
    /// place; anything else returns `None`.
    pub fn as_place(&self) -> Option<(&str, Vec<&str>)> {
        match &self.kind {
            ExpressionKind::Identifier(name) => Some((name, vec![])),
            ExpressionKind::Functional { base, postfixes } => {
                let ExpressionKind::Identifier(root) = &base.kind else { return None };

                let path = postfixes.iter()
                    .map(|postfix| match &postfix.kind {
                        PostfixKind::Member(name) => Some(name.as_str()),
                        _ => None,
                    })
                    .collect::<Option<Vec<&str>>>()?;

                Some((root, path))
            }
            _ => None,
        }
    }
}


#[derive(Debug, Clone, PartialEq)]
pub enum ExpressionKind {
    Binary {
        operator: BinaryOperator,
        left: Box<Expression>,
        right: Box<Expression>,
    },
    Unary {
        operator: UnaryOperator,
        operand: Box<Expression>,
    },
    /// A primary expression followed by one or more postfix operations, applied left to right.
    Functional {
        base: Box<Expression>,
        postfixes: Vec<Postfix>,
    },
    Identifier(String),
    Literal(Literal),
    /// `{ name: expr, ... }`, constructing a struct value.
    Object(IndexMap<String, Expression>),
    Paren(Box<Expression>),
    Cast {
        target: Primitive,
        operand: Box<Expression>,
    },
}


#[derive(Debug, Clone, PartialEq)]
pub struct Postfix {
    pub kind: PostfixKind,
    pub position: Position,
}


#[derive(Debug, Clone, PartialEq)]
pub enum PostfixKind {
    Call(Vec<Expression>),
    Member(String),
    /// `expr as Type`, reading the value out of a variant.
    VariantAccess(String),
}


#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(String),
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOperator {
    Or,
    And,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
}


impl BinaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Or => "||",
            Self::And => "&&",
            Self::Equal => "==",
            Self::NotEqual => "!=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
        }
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOperator {
    Negate,
    Not,
}


impl UnaryOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Negate => "-",
            Self::Not => "!",
        }
    }
}


/// The primitive types a cast expression may target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Int,
    Float,
    Bool,
    Char,
    String,
}


impl Primitive {
    pub fn type_id(&self) -> TypeId {
        match self {
            Self::Int => TypeId::INT,
            Self::Float => TypeId::FLOAT,
            Self::Bool => TypeId::BOOL,
            Self::Char => TypeId::CHAR,
            Self::String => TypeId::STRING,
        }
    }
}
