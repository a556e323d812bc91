//! Error types for the fallback transform

use thiserror::Error;

/// Result type alias for transform operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rewriting a stylesheet or converting images
#[derive(Error, Debug)]
pub enum Error {
    /// The stylesheet could not be parsed
    #[error("Parse error at {line}:{column}: {message}")]
    Parse {
        line: u32,
        column: u32,
        message: String,
    },

    /// The renderer reported a failure; carries its raw diagnostic text
    #[error("{0}")]
    Render(String),

    /// Filesystem failure other than a missing source image
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_error_is_raw_text() {
        let e = Error::Render("Could not open file".into());
        assert_eq!(e.to_string(), "Could not open file");
    }

    #[test]
    fn parse_error_mentions_position() {
        let e = Error::Parse { line: 3, column: 7, message: "unclosed block".into() };
        assert_eq!(e.to_string(), "Parse error at 3:7: unclosed block");
    }
}
