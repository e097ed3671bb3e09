//! Provides a representation of the tokens of the language which include debugging information
//! which can be used to display useful error messages, and the data needed to produce the abstract
//! syntax tree.
//!
//! Token types are laid out in fixed, contiguous ranges so that the spelling of any keyword,
//! operator or punctuation token can be found with `table[token_type as usize - offset]`.
use std::fmt;

use crate::diagnostics::ErrorKind;

use super::source::Position;


/// All the possible types of tokens in Ember.
///
/// The order of this enumeration is significant: [`KEYWORDS`], [`OPERATORS`] and
/// [`PUNCTUATION`] are indexed relative to [`KEYWORD_OFFSET`], [`OPERATOR_OFFSET`] and
/// [`PUNCTUATION_OFFSET`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Var,
    Const,
    Struct,
    Variant,
    Fn,
    Return,
    If,
    Elif,
    Else,
    For,
    In,
    Until,
    While,
    Continue,
    Break,
    Match,
    Case,
    As,
    Stdin,
    Stdout,
    Int,
    Float,
    Bool,
    Char,
    String,
    Void,

    Identifier,
    IntegerLiteral,
    FloatLiteral,
    BoolLiteral,
    CharLiteral,
    StringLiteral,

    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Bang,
    Assign,
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    And,
    Or,
    Arrow,
    StreamInsert,
    StreamExtract,
    Dot,

    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    LeftBracket,
    RightBracket,
    Semicolon,
    Comma,
    Colon,

    Comment,
    MultilineComment,
    EndOfInput,
    Unexpected,
}


use TokenType::*;

/// Every token type in declaration order, so that `ALL_TOKEN_TYPES[t as usize] == t`.
pub const ALL_TOKEN_TYPES: [TokenType; 64] = [
    Var, Const, Struct, Variant, Fn, Return, If, Elif, Else, For, In, Until, While, Continue,
    Break, Match, Case, As, Stdin, Stdout, Int, Float, Bool, Char, String, Void,
    Identifier, IntegerLiteral, FloatLiteral, BoolLiteral, CharLiteral, StringLiteral,
    Plus, Minus, Star, Slash, Percent, Bang, Assign, Equal, NotEqual, Less, LessEqual, Greater,
    GreaterEqual, And, Or, Arrow, StreamInsert, StreamExtract, Dot,
    LeftParen, RightParen, LeftBrace, RightBrace, LeftBracket, RightBracket, Semicolon, Comma,
    Colon,
    Comment, MultilineComment, EndOfInput, Unexpected,
];

pub const KEYWORD_OFFSET: usize = Var as usize;
pub const OPERATOR_OFFSET: usize = Plus as usize;
pub const PUNCTUATION_OFFSET: usize = LeftParen as usize;

pub const KEYWORDS: [&str; 26] = [
    "var", "const", "struct", "variant", "fn", "return", "if", "elif", "else", "for", "in",
    "until", "while", "continue", "break", "match", "case", "as", "stdin", "stdout", "int",
    "float", "bool", "char", "string", "void",
];

pub const OPERATORS: [&str; 19] = [
    "+", "-", "*", "/", "%", "!", "=", "==", "!=", "<", "<=", ">", ">=", "&&", "||", "->", "<<",
    ">>", ".",
];

pub const PUNCTUATION: [&str; 9] = ["(", ")", "{", "}", "[", "]", ";", ",", ":"];


impl TokenType {
    /// Looks up the keyword token for an identifier-shaped lexeme.
    pub fn keyword(text: &str) -> Option<Self> {
        KEYWORDS.iter()
            .position(|k| *k == text)
            .map(|i| ALL_TOKEN_TYPES[KEYWORD_OFFSET + i])
    }


    pub fn operator(text: &str) -> Option<Self> {
        OPERATORS.iter()
            .position(|o| *o == text)
            .map(|i| ALL_TOKEN_TYPES[OPERATOR_OFFSET + i])
    }


    pub fn punctuation(text: &str) -> Option<Self> {
        PUNCTUATION.iter()
            .position(|p| *p == text)
            .map(|i| ALL_TOKEN_TYPES[PUNCTUATION_OFFSET + i])
    }


    /// Returns the fixed spelling of keyword, operator and punctuation tokens.
    pub fn spelling(&self) -> Option<&'static str> {
        let index = *self as usize;
        if index < KEYWORD_OFFSET + KEYWORDS.len() {
            Some(KEYWORDS[index - KEYWORD_OFFSET])
        } else if (OPERATOR_OFFSET..OPERATOR_OFFSET + OPERATORS.len()).contains(&index) {
            Some(OPERATORS[index - OPERATOR_OFFSET])
        } else if (PUNCTUATION_OFFSET..PUNCTUATION_OFFSET + PUNCTUATION.len()).contains(&index) {
            Some(PUNCTUATION[index - PUNCTUATION_OFFSET])
        } else {
            None
        }
    }


    /// True for the keywords naming the primitive types (`int` through `void`).
    pub fn is_primitive_type(&self) -> bool {
        matches!(self, Int | Float | Bool | Char | String | Void)
    }
}


/// The typed payload carried alongside the raw lexeme of literal and error tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue {
    Integer(i64),
    Float(f64),
    Bool(bool),
    Char(char),
    String(std::string::String),
    /// The lexical error an [`TokenType::Unexpected`] token stands for.
    Error(ErrorKind),
}


/// Metadata for tokens required for parsing and debugging/error messages
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub token_type: TokenType,
    pub value: std::string::String,
    pub typed_value: Option<TokenValue>,
    pub position: Position,
}


impl Token {
    pub fn new(token_type: TokenType, value: std::string::String, position: Position) -> Self {
        Self { token_type, value, typed_value: None, position }
    }


    pub fn with_value(mut self, typed_value: TokenValue) -> Self {
        self.typed_value = Some(typed_value);
        self
    }


    /// The lexical error carried by an unexpected token, if any.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self.typed_value {
            Some(TokenValue::Error(kind)) => Some(kind),
            _ => None,
        }
    }
}


impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:?} '{}' at {}", self.token_type, self.value, self.position)
    }
}


#[cfg(test)]
mod tests {
    use super::*;


    #[test]
    fn test_all_token_types_in_declaration_order() {
        for (i, t) in ALL_TOKEN_TYPES.iter().enumerate() {
            assert_eq!(*t as usize, i);
        }
    }


    #[test]
    fn test_table_offsets() {
        assert_eq!(KEYWORD_OFFSET, 0);
        assert_eq!(ALL_TOKEN_TYPES[KEYWORD_OFFSET + KEYWORDS.len() - 1], Void);
        assert_eq!(ALL_TOKEN_TYPES[OPERATOR_OFFSET + OPERATORS.len() - 1], Dot);
        assert_eq!(ALL_TOKEN_TYPES[PUNCTUATION_OFFSET + PUNCTUATION.len() - 1], Colon);
        assert_eq!(OPERATOR_OFFSET, StringLiteral as usize + 1);
        assert_eq!(PUNCTUATION_OFFSET, OPERATOR_OFFSET + OPERATORS.len());
    }


    #[test]
    fn test_spelling_lookups() {
        assert_eq!(TokenType::keyword("elif"), Some(Elif));
        assert_eq!(TokenType::keyword("true"), None);
        assert_eq!(TokenType::operator("<<"), Some(StreamInsert));
        assert_eq!(TokenType::punctuation(";"), Some(Semicolon));
        assert_eq!(Arrow.spelling(), Some("->"));
        assert_eq!(Identifier.spelling(), None);
        assert_eq!(EndOfInput.spelling(), None);
    }
}
