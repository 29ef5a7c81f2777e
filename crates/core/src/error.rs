use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("unterminated single-quoted string")]
    UnterminatedSingleQuote,

    #[error("unterminated double-quoted string")]
    UnterminatedDoubleQuote,

    #[error("unterminated escape sequence")]
    UnterminatedEscape,

    #[error("empty command line")]
    EmptyCommandLine,

    #[error("empty program name")]
    EmptyProgram,

    #[error("unknown signal: {0}")]
    UnknownSignal(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = CoreError::UnknownSignal("BOGUS".to_string());
        assert!(error.to_string().contains("BOGUS"));

        let error = CoreError::UnterminatedDoubleQuote;
        assert_eq!(error.to_string(), "unterminated double-quoted string");
    }
}
