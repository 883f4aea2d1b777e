use serde::{Deserialize, Serialize};

/// Source location of a token.
///
/// `row` and `col` are 1-based, matching what editors display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loc {
    pub path: String,
    pub row: usize,
    pub col: usize,
}

impl Loc {
    pub fn new(path: impl Into<String>, row: usize, col: usize) -> Self {
        Loc {
            path: path.into(),
            row,
            col,
        }
    }
}

impl std::fmt::Display for Loc {
    /// Formats as `path:row:col` for CLI-friendly diagnostics.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.path, self.row, self.col)
    }
}

/// Kind of a raw token, as far as the lexer can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Word,
    Str,
    Comment,
}

/// A whitespace-delimited piece of source text with its location.
///
/// String tokens keep their surrounding quotes and escapes undecoded;
/// the instruction parser owns escape decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
    pub loc: Loc,
}

impl Token {
    pub fn new(text: impl Into<String>, loc: Loc) -> Self {
        Token {
            text: text.into(),
            loc,
        }
    }

    pub fn kind(&self) -> TokenKind {
        if self.text.starts_with('#') {
            TokenKind::Comment
        } else if self.text.starts_with('"') {
            TokenKind::Str
        } else {
            TokenKind::Word
        }
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_loc_display() {
        let loc = Loc::new("prog.cdr", 3, 14);
        assert_eq!(loc.to_string(), "prog.cdr:3:14");
    }

    #[test]
    fn test_token_kind() {
        let loc = Loc::new("t", 1, 1);
        assert_eq!(Token::new("dup", loc.clone()).kind(), TokenKind::Word);
        assert_eq!(Token::new("\"hi\"", loc.clone()).kind(), TokenKind::Str);
        assert_eq!(Token::new("# note", loc).kind(), TokenKind::Comment);
    }
}
