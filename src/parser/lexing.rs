//! Provides the [`Lexer`] which turns a stream of characters into [`Token`]s on demand.
//!
//! The lexer is pulled by the parser one token at a time through [`Lexer::next_token()`].
//! Nothing is remembered between calls other than the position held by the character source,
//! so the lexer never needs to buffer more than the single character of lookahead the source
//! provides.
//!
//! Malformed input never stops the lexer: it is returned as an [`TokenType::Unexpected`] token
//! whose payload names the lexical [`ErrorKind`], and the parser forwards it to the diagnostic
//! sink when it reaches that token.
use tracing::trace;

use crate::diagnostics::ErrorKind;

use super::source::{CharSource, Position};
use super::token::*;


/// Pulls characters from a [`CharSource`] and groups them into tokens.
pub struct Lexer<S: CharSource> {
    source: S,
}


impl<S: CharSource> Lexer<S> {
    /// A lexer reading from the start of `source`.
    pub fn new(source: S) -> Self {
        Self { source }
    }


    /// Consumes whitespace and returns the next token of the input.
    ///
    /// Once the input is exhausted every call returns an [`TokenType::EndOfInput`] token.
    pub fn next_token(&mut self) -> Token {
        self.skip_whitespace();
        let position = self.source.position();

        let token = match self.source.peek() {
            None => Token::new(TokenType::EndOfInput, String::new(), position),
            Some(c) if c.is_alphabetic() || c == '_' => self.lex_word(position),
            Some(c) if c.is_ascii_digit() => self.lex_number(position),
            Some('"') => self.lex_quoted('"', position),
            Some('\'') => self.lex_quoted('\'', position),
            Some('$') => self.lex_comment(position),
            Some(_) => self.lex_symbol(position),
        };

        trace!(token = %token, "lexed token");
        token
    }


    fn skip_whitespace(&mut self) {
        while matches!(self.source.peek(), Some(c) if c.is_whitespace()) {
            self.source.next_char();
        }
    }


    /// Appends characters to `text` for as long as `accept` holds for the next character.
    fn consume_while(&mut self, text: &mut String, accept: impl Fn(char) -> bool) {
        while let Some(c) = self.source.peek() {
            if !accept(c) {
                break;
            }

            text.push(c);
            self.source.next_char();
        }
    }


    /// Lexes an identifier, keyword or boolean literal.
    fn lex_word(&mut self, position: Position) -> Token {
        let mut text = String::new();
        self.consume_while(&mut text, |c| c.is_alphanumeric() || c == '_');

        match text.as_str() {
            "true" => Token::new(TokenType::BoolLiteral, text, position).with_value(TokenValue::Bool(true)),
            "false" => Token::new(TokenType::BoolLiteral, text, position).with_value(TokenValue::Bool(false)),
            _ => match TokenType::keyword(&text) {
                Some(keyword) => Token::new(keyword, text, position),
                None => Token::new(TokenType::Identifier, text, position),
            }
        }
    }


    /// Lexes an integer or float literal.
    ///
    /// The run of digits and dots is consumed first. If the literal is not directly followed
    /// by a character from the allow-list, the offending suffix is swallowed into the same
    /// token so that diagnostics show the whole bad run instead of a split token.
    fn lex_number(&mut self, position: Position) -> Token {
        let mut text = String::new();
        self.consume_while(&mut text, |c| c.is_ascii_digit() || c == '.');

        let mut valid = has_valid_shape(&text);
        if !self.source.peek().map_or(true, may_follow_number) {
            valid = false;
            self.consume_while(&mut text, |c| !may_follow_number(c));
        }

        let payload = match valid {
            false => None,
            true if text.contains('.') => text.parse::<f64>().ok().map(TokenValue::Float),
            true => text.parse::<i64>().ok().map(TokenValue::Integer),
        };

        match payload {
            Some(value @ TokenValue::Float(_)) => Token::new(TokenType::FloatLiteral, text, position).with_value(value),
            Some(value) => Token::new(TokenType::IntegerLiteral, text, position).with_value(value),
            None => unexpected(text, position, ErrorKind::InvalidNumberLiteral),
        }
    }


    /// Lexes a string (`"`) or char (`'`) literal, decoding escapes as it goes.
    ///
    /// The token's value holds the decoded content, including when the literal turns out to
    /// be malformed.
    fn lex_quoted(&mut self, delimiter: char, position: Position) -> Token {
        self.source.next_char();
        let mut content = String::new();

        loop {
            match self.source.peek() {
                None | Some('\n') => return unexpected(content, position, ErrorKind::MissingClosingQuote),
                Some(c) if c == delimiter => {
                    self.source.next_char();
                    break;
                }
                Some('\\') => {
                    self.source.next_char();
                    match self.source.next_char() {
                        Some('n') => content.push('\n'),
                        Some('t') => content.push('\t'),
                        Some(c) => content.push(c),
                        None => return unexpected(content, position, ErrorKind::MissingClosingQuote),
                    }
                }
                Some(c) => {
                    content.push(c);
                    self.source.next_char();
                }
            }
        }

        if delimiter == '"' {
            let value = TokenValue::String(content.clone());
            return Token::new(TokenType::StringLiteral, content, position).with_value(value);
        }

        let mut chars = content.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Token::new(TokenType::CharLiteral, content, position).with_value(TokenValue::Char(c)),
            _ => unexpected(content, position, ErrorKind::InvalidCharLiteral),
        }
    }


    /// Lexes `$` single-line and `$$ ... $$` multi-line comments.
    fn lex_comment(&mut self, position: Position) -> Token {
        self.source.next_char();

        if self.source.peek() != Some('$') {
            let mut text = String::new();
            self.consume_while(&mut text, |c| c != '\n');
            return Token::new(TokenType::Comment, text, position);
        }

        self.source.next_char();
        let mut text = String::new();
        loop {
            match self.source.next_char() {
                None => return unexpected(text, position, ErrorKind::UnexpectedEndOfFile),
                Some('$') if self.source.peek() == Some('$') => {
                    self.source.next_char();
                    return Token::new(TokenType::MultilineComment, text, position);
                }
                Some(c) => text.push(c),
            }
        }
    }


    /// Lexes operators and punctuation using maximal munch on two-character operators.
    fn lex_symbol(&mut self, position: Position) -> Token {
        let mut text = String::new();
        if let Some(first) = self.source.next_char() {
            text.push(first);
        }

        if let Some(second) = self.source.peek() {
            let pair = format!("{}{}", text, second);
            if let Some(operator) = TokenType::operator(&pair) {
                self.source.next_char();
                return Token::new(operator, pair, position);
            }
        }

        match TokenType::operator(&text).or_else(|| TokenType::punctuation(&text)) {
            Some(token_type) => Token::new(token_type, text, position),
            None => unexpected(text, position, ErrorKind::UnexpectedCharacter),
        }
    }
}


fn unexpected(text: String, position: Position, kind: ErrorKind) -> Token {
    Token::new(TokenType::Unexpected, text, position).with_value(TokenValue::Error(kind))
}


/// Checks the digits-and-dots run of a number: at most one dot, and no leading zero unless the
/// whole integer part is exactly `0`.
fn has_valid_shape(text: &str) -> bool {
    if text.matches('.').count() > 1 {
        return false;
    }

    let integer_part = text.split('.').next().unwrap_or_default();
    !(integer_part.starts_with('0') && integer_part.len() > 1)
}


/// The allow-list of characters that may directly follow a number literal.
fn may_follow_number(c: char) -> bool {
    c.is_whitespace()
        || matches!(c, ')' | ']' | '}' | ';' | ',' | '$')
        || OPERATORS.iter().any(|op| op.starts_with(c))
}


#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::parser::source::StringSource;


    fn lex(text: &str) -> Vec<Token> {
        let mut lexer = Lexer::new(StringSource::new(text, "test"));
        let mut tokens = vec![];
        loop {
            let token = lexer.next_token();
            if token.token_type == TokenType::EndOfInput {
                break;
            }
            tokens.push(token);
        }
        tokens
    }


    fn single(text: &str) -> Token {
        let tokens = lex(text);
        assert_eq!(tokens.len(), 1, "expected a single token for {:?}, got {:?}", text, tokens);
        tokens.into_iter().next().unwrap()
    }


    fn retokenize_table(table: &[&str], offset: usize) {
        let source: String = table.iter().map(|s| format!("{} ", s)).collect();
        let tokens = lex(&source);
        assert_eq!(tokens.len(), table.len());

        for (i, token) in tokens.iter().enumerate() {
            assert_eq!(token.token_type as usize, offset + i);
            assert_eq!(token.value, table[i]);
        }
    }


    #[test]
    fn test_retokenize_keywords() {
        retokenize_table(&KEYWORDS, KEYWORD_OFFSET);
    }


    #[test]
    fn test_retokenize_operators() {
        retokenize_table(&OPERATORS, OPERATOR_OFFSET);
    }


    #[test]
    fn test_retokenize_punctuation() {
        retokenize_table(&PUNCTUATION, PUNCTUATION_OFFSET);
    }


    #[test]
    fn test_identifiers_and_booleans() {
        let tokens = lex("_foo bar9 true false variant");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![
            TokenType::Identifier,
            TokenType::Identifier,
            TokenType::BoolLiteral,
            TokenType::BoolLiteral,
            TokenType::Variant,
        ]);
        assert_eq!(tokens[2].typed_value, Some(TokenValue::Bool(true)));
        assert_eq!(tokens[3].typed_value, Some(TokenValue::Bool(false)));
    }


    #[test]
    fn test_invalid_number_literals() {
        for text in ["00.0", "00.", "0.2x", "3.14#", "0.0.0.0", "3x", "01"] {
            let token = single(text);
            assert_eq!(token.token_type, TokenType::Unexpected, "{}", text);
            assert_eq!(token.value, text);
            assert_eq!(token.error_kind(), Some(ErrorKind::InvalidNumberLiteral));
        }
    }


    #[test]
    fn test_invalid_number_literal_stops_at_terminator() {
        let tokens = lex("3x;");
        assert_eq!(tokens.len(), 2, "{:?}", tokens);

        assert_eq!(tokens[0].token_type, TokenType::Unexpected);
        assert_eq!(tokens[0].value, "3x");
        assert_eq!(tokens[0].error_kind(), Some(ErrorKind::InvalidNumberLiteral));
        assert_eq!(tokens[1].token_type, TokenType::Semicolon);

        let types: Vec<TokenType> = lex("x = 12ab + 1;").into_iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![
            TokenType::Identifier,
            TokenType::Assign,
            TokenType::Unexpected,
            TokenType::Plus,
            TokenType::IntegerLiteral,
            TokenType::Semicolon,
        ]);
    }


    #[test]
    fn test_valid_number_literals() {
        let token = single("0");
        assert_eq!(token.token_type, TokenType::IntegerLiteral);
        assert_eq!(token.typed_value, Some(TokenValue::Integer(0)));

        let token = single("0.5");
        assert_eq!(token.token_type, TokenType::FloatLiteral);
        assert_eq!(token.typed_value, Some(TokenValue::Float(0.5)));

        let token = single("123.456");
        assert_eq!(token.token_type, TokenType::FloatLiteral);
        assert_eq!(token.typed_value, Some(TokenValue::Float(123.456)));
    }


    #[test]
    fn test_numbers_followed_by_allowed_characters() {
        let types: Vec<TokenType> = lex("f(1,2)+3;").iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![
            TokenType::Identifier,
            TokenType::LeftParen,
            TokenType::IntegerLiteral,
            TokenType::Comma,
            TokenType::IntegerLiteral,
            TokenType::RightParen,
            TokenType::Plus,
            TokenType::IntegerLiteral,
            TokenType::Semicolon,
        ]);

        let tokens = lex("7$ comment");
        assert_eq!(tokens[0].typed_value, Some(TokenValue::Integer(7)));
        assert_eq!(tokens[1].token_type, TokenType::Comment);
    }


    #[test]
    fn test_integer_overflow_is_invalid() {
        let token = single("99999999999999999999");
        assert_eq!(token.error_kind(), Some(ErrorKind::InvalidNumberLiteral));
    }


    #[test]
    fn test_string_escapes() {
        let token = single("\" \\\" \\' \\n \\t \"");
        assert_eq!(token.token_type, TokenType::StringLiteral);
        assert_eq!(token.typed_value, Some(TokenValue::String(" \" ' \n \t ".to_owned())));
    }


    #[test]
    fn test_unterminated_string_and_char() {
        let token = single("\"abc");
        assert_eq!(token.token_type, TokenType::Unexpected);
        assert_eq!(token.error_kind(), Some(ErrorKind::MissingClosingQuote));
        assert_eq!(token.value, "abc");

        let tokens = lex("\"ab\ncd\"");
        assert_eq!(tokens[0].error_kind(), Some(ErrorKind::MissingClosingQuote));
        assert_eq!(tokens[0].value, "ab");

        let token = single("'x");
        assert_eq!(token.error_kind(), Some(ErrorKind::MissingClosingQuote));
        assert_eq!(token.value, "x");
    }


    #[test]
    fn test_char_literals() {
        let token = single("'a'");
        assert_eq!(token.token_type, TokenType::CharLiteral);
        assert_eq!(token.typed_value, Some(TokenValue::Char('a')));

        let token = single("'\\n'");
        assert_eq!(token.typed_value, Some(TokenValue::Char('\n')));

        let token = single("'ab'");
        assert_eq!(token.error_kind(), Some(ErrorKind::InvalidCharLiteral));
        assert_eq!(token.value, "ab");

        let token = single("''");
        assert_eq!(token.error_kind(), Some(ErrorKind::InvalidCharLiteral));
    }


    #[test]
    fn test_comments() {
        let tokens = lex("$ line\nx $$ multi\nline $$ y");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![
            TokenType::Comment,
            TokenType::Identifier,
            TokenType::MultilineComment,
            TokenType::Identifier,
        ]);
        assert_eq!(tokens[0].value, " line");
        assert_eq!(tokens[2].value, " multi\nline ");

        let token = single("$$ never closed");
        assert_eq!(token.error_kind(), Some(ErrorKind::UnexpectedEndOfFile));
    }


    #[test]
    fn test_maximal_munch_and_unexpected_characters() {
        let tokens = lex("->-<<<=&|");
        let types: Vec<TokenType> = tokens.iter().map(|t| t.token_type).collect();
        assert_eq!(types, vec![
            TokenType::Arrow,
            TokenType::Minus,
            TokenType::StreamInsert,
            TokenType::LessEqual,
            TokenType::Unexpected,
            TokenType::Unexpected,
        ]);
        assert_eq!(tokens[4].value, "&");
        assert_eq!(tokens[4].error_kind(), Some(ErrorKind::UnexpectedCharacter));
    }


    #[test]
    fn test_token_positions() {
        let tokens = lex("var x\n  = 1;");
        let positions: Vec<(usize, usize)> = tokens.iter()
            .map(|t| (t.position.line, t.position.column))
            .collect();
        assert_eq!(positions, vec![(1, 1), (1, 5), (2, 3), (2, 5), (2, 6)]);
    }


    #[test]
    fn test_end_of_input_repeats() {
        let mut lexer = Lexer::new(StringSource::new("", "test"));
        assert_eq!(lexer.next_token().token_type, TokenType::EndOfInput);
        assert_eq!(lexer.next_token().token_type, TokenType::EndOfInput);
    }
}
