use thiserror::Error;

use crate::frontend::token::{Loc, Token};

#[derive(Debug, Error)]
#[error("{loc}: {message}")]
pub struct LexError {
    pub message: String,
    pub loc: Loc,
}

/// Splits cinder source into whitespace-delimited tokens.
///
/// Three shapes are recognized:
/// - `# ...` runs to the end of the line and becomes one comment token
/// - `"..."` runs to the next unescaped quote, whitespace included
/// - anything else runs to the next whitespace character
pub struct Lexer {
    source: Vec<char>,
    path: String,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    pub fn new(source: &str, path: impl Into<String>) -> Self {
        Lexer {
            source: source.chars().collect(),
            path: path.into(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn current(&self) -> Option<char> {
        self.source.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current();
        if ch == Some('\n') {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        self.pos += 1;
        ch
    }

    fn loc(&self) -> Loc {
        Loc::new(self.path.clone(), self.line, self.col)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn read_comment(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text.trim_end().to_string()
    }

    fn read_string(&mut self, start: &Loc) -> Result<String, LexError> {
        let mut text = String::new();
        // opening quote
        if let Some(ch) = self.advance() {
            text.push(ch);
        }

        loop {
            match self.advance() {
                Some('"') => {
                    text.push('"');
                    return Ok(text);
                }
                Some('\\') => {
                    text.push('\\');
                    match self.advance() {
                        Some(ch) => text.push(ch),
                        None => break,
                    }
                }
                Some(ch) => text.push(ch),
                None => break,
            }
        }

        Err(LexError {
            message: "unterminated string literal".to_string(),
            loc: start.clone(),
        })
    }

    fn read_word(&mut self) -> String {
        let mut text = String::new();
        while let Some(ch) = self.current() {
            if ch.is_whitespace() {
                break;
            }
            text.push(ch);
            self.advance();
        }
        text
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();

        loop {
            self.skip_whitespace();
            let loc = self.loc();

            let text = match self.current() {
                None => break,
                Some('#') => self.read_comment(),
                Some('"') => self.read_string(&loc)?,
                Some(_) => self.read_word(),
            };

            tokens.push(Token { text, loc });
        }

        Ok(tokens)
    }
}
