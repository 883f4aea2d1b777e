use thiserror::Error;

use crate::frontend::token::Loc;

/// An error turning a single token into an instruction.
///
/// Every variant carries the location of the offending token.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("{loc}: unknown escape sequence \\{escape} in string {text}")]
    UnknownEscape {
        escape: char,
        text: String,
        loc: Loc,
    },

    #[error("{loc}: unterminated string literal {text}")]
    UnterminatedString { text: String, loc: Loc },

    #[error("{loc}: invalid arity {arity} for `{word}` (expected {expected})")]
    InvalidArity {
        word: String,
        arity: u8,
        expected: &'static str,
        loc: Loc,
    },

    #[error("{loc}: integer literal {text} does not fit in 64 bits")]
    IntegerOutOfRange { text: String, loc: Loc },
}

impl ParseError {
    pub fn loc(&self) -> &Loc {
        match self {
            ParseError::UnknownEscape { loc, .. }
            | ParseError::UnterminatedString { loc, .. }
            | ParseError::InvalidArity { loc, .. }
            | ParseError::IntegerOutOfRange { loc, .. } => loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_location() {
        let err = ParseError::InvalidArity {
            word: "dup".to_string(),
            arity: 1,
            expected: "2..=6",
            loc: Loc::new("p.cdr", 4, 9),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("p.cdr:4:9:"));
        assert!(msg.contains("dup"));
        assert!(msg.contains("2..=6"));
    }

    #[test]
    fn test_unknown_escape_display() {
        let err = ParseError::UnknownEscape {
            escape: 'q',
            text: "\"a\\q\"".to_string(),
            loc: Loc::new("p.cdr", 1, 1),
        };
        assert!(err.to_string().contains("\\q"));
    }
}
