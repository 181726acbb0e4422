use thiserror::Error;

/// Result type for script reading operations
pub type Result<T> = std::result::Result<T, AstError>;

/// Errors that can occur while turning GDScript source into a tree
#[derive(Error, Debug)]
pub enum AstError {
    /// The source is structurally malformed
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// The file could not be read
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The file is not valid UTF-8 text
    #[error("File is not valid UTF-8: {0}")]
    InvalidEncoding(String),

    /// The provider could not be initialized
    #[error("Provider initialization failed: {0}")]
    InitError(String),
}

impl AstError {
    /// Create a parse error
    pub fn parse(line: usize, msg: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: msg.into(),
        }
    }

    /// Line of a parse error, if this is one
    #[must_use]
    pub const fn line(&self) -> Option<usize> {
        match self {
            Self::ParseError { line, .. } => Some(*line),
            _ => None,
        }
    }
}
