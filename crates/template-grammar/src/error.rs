use std::fmt;
use thiserror::Error;

pub type Result<T, E = GrammarError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum GrammarError {
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
    #[error("I/O error reading {path}: {message}")]
    Io { path: String, message: String },
}

/// Malformed template text.
///
/// `column` is 1-based and counts characters of `text`. File name and line
/// number are only known when the template came from a corpus file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct SyntaxError {
    pub message: String,
    pub text: String,
    pub column: usize,
    pub file_name: Option<String>,
    pub line_number: Option<usize>,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (text='{}', column={}", self.message, self.text, self.column)?;
        if let Some(file_name) = &self.file_name {
            write!(f, ", file={file_name}")?;
        }
        if let Some(line_number) = self.line_number {
            write!(f, ", line={line_number}")?;
        }
        write!(f, ")")
    }
}
