//! Character sources feeding the lexer.
//!
//! The lexer only ever needs to look one character ahead, consume a character, and ask where
//! it currently is, so both the file-backed and the in-memory readers implement the small
//! [`CharSource`] trait. Positions are 1-based and always describe the *next* character to be
//! read.
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;


/// A location in a source file, used to attach diagnostics to tokens and AST nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    pub line: usize,
    pub column: usize,
    pub source: Arc<str>,
}


impl Position {
    pub fn new(line: usize, column: usize, source: Arc<str>) -> Self {
        Self { line, column, source }
    }
}


impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}:{}", self.source, self.line, self.column)
    }
}


/// The interface the lexer pulls characters through.
pub trait CharSource {
    /// Returns the next character without consuming it, or `None` at the end of input.
    fn peek(&self) -> Option<char>;

    /// Consumes and returns the next character, advancing the current position.
    fn next_char(&mut self) -> Option<char>;

    /// The position of the character [`CharSource::peek()`] would return.
    fn position(&self) -> Position;
}


/// Reads characters out of an in-memory string.
///
/// Used for embedding and for tests; the label is what diagnostics print as the file name.
pub struct StringSource {
    chars: Vec<char>,
    index: usize,
    line: usize,
    column: usize,
    label: Arc<str>,
}


impl StringSource {
    pub fn new(text: &str, label: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            index: 0,
            line: 1,
            column: 1,
            label: Arc::from(label),
        }
    }
}


impl CharSource for StringSource {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.index).copied()
    }


    fn next_char(&mut self) -> Option<char> {
        let c = self.chars.get(self.index).copied()?;
        self.index += 1;

        if c == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }

        Some(c)
    }


    fn position(&self) -> Position {
        Position::new(self.line, self.column, self.label.clone())
    }
}


/// Reads characters out of a file on disk, labelled with the path it was opened from.
///
/// The whole file is read up front; scripts are small and this keeps positions identical to
/// the in-memory reader.
pub struct FileSource {
    inner: StringSource,
}


impl FileSource {
    /// Opens the given file and prepares it for lexing.
    ///
    /// # Errors
    ///
    /// Returns the underlying I/O error if the file cannot be read or is not valid UTF-8.
    pub fn open(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(Self {
            inner: StringSource::new(&text, &path.display().to_string()),
        })
    }
}


impl CharSource for FileSource {
    fn peek(&self) -> Option<char> {
        self.inner.peek()
    }


    fn next_char(&mut self) -> Option<char> {
        self.inner.next_char()
    }


    fn position(&self) -> Position {
        self.inner.position()
    }
}
