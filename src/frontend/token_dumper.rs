use std::io::{self, Write};

use crate::bytecode::Op;
use crate::frontend::token::{Token, TokenKind};

pub struct TokenDumper {
    pub color: bool,
    pub show_debug_repr: bool, // if false, prints the raw token text
}

impl Default for TokenDumper {
    fn default() -> Self {
        Self {
            color: true,
            show_debug_repr: true,
        }
    }
}

impl TokenDumper {
    // ANSI colors
    const RESET: &'static str = "\x1b[0m";
    const DIM: &'static str = "\x1b[2m";
    const GRN: &'static str = "\x1b[32m";
    const YEL: &'static str = "\x1b[33m";
    const CYN: &'static str = "\x1b[36m";
    const MAG: &'static str = "\x1b[35m";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn no_color(mut self) -> Self {
        self.color = false;
        self
    }

    pub fn pretty(mut self) -> Self {
        self.show_debug_repr = false;
        self
    }

    pub fn dump(&self, tokens: &[Token], out: &mut dyn Write) -> io::Result<()> {
        for token in tokens {
            self.write_one(token, out)?;
        }
        Ok(())
    }

    fn write_one(&self, token: &Token, out: &mut dyn Write) -> io::Result<()> {
        let kind = kind(token);
        let colr = if self.color { color(kind) } else { "" };
        let reset = if self.color { Self::RESET } else { "" };

        if self.show_debug_repr {
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {:?}{}",
                token.loc.row, token.loc.col, colr, kind, token.text, reset
            )
        } else {
            writeln!(
                out,
                "[{:02}:{:02}] {}{:<8} {}{}",
                token.loc.row, token.loc.col, colr, kind, token.text, reset
            )
        }
    }
}

fn kind(token: &Token) -> &'static str {
    let text = token.text.as_str();
    match token.kind() {
        TokenKind::Comment => "COMMENT",
        TokenKind::Str => "STRING",
        TokenKind::Word if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) => "INT",
        TokenKind::Word => match Op::keyword(text) {
            Some(_) if text.bytes().all(|b| b.is_ascii_alphabetic()) => "KEYWORD",
            Some(_) => "OP",
            None if text.starts_with('(') => "VARIADIC",
            None => "IDENT",
        },
    }
}

fn color(kind: &str) -> &'static str {
    match kind {
        "COMMENT" => TokenDumper::DIM,
        "STRING" => TokenDumper::GRN,
        "INT" => TokenDumper::CYN,
        "IDENT" => TokenDumper::YEL,
        "OP" | "VARIADIC" => TokenDumper::MAG,
        _ => TokenDumper::RESET,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::lexer::Lexer;

    fn dump(source: &str, dumper: TokenDumper) -> String {
        let tokens = Lexer::new(source, "t.cdr").tokenize().unwrap();
        let mut out: Vec<u8> = Vec::new();
        dumper.dump(&tokens, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_plain_dump_has_location_kind_and_text() {
        let text = dump("1 dup\n  + sq", TokenDumper::new().no_color());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "[01:01] INT      \"1\"");
        assert_eq!(lines[1], "[01:03] KEYWORD  \"dup\"");
        assert_eq!(lines[2], "[02:03] OP       \"+\"");
        assert_eq!(lines[3], "[02:05] IDENT    \"sq\"");
    }

    #[test]
    fn test_pretty_prints_raw_text() {
        let text = dump("\"hi there\" # note", TokenDumper::new().no_color().pretty());
        assert!(text.contains("STRING   \"hi there\""));
        assert!(text.contains("COMMENT  # note"));
    }

    #[test]
    fn test_variadic_kind() {
        let text = dump("(3)syscall", TokenDumper::new().no_color().pretty());
        assert!(text.contains("VARIADIC (3)syscall"));
    }

    #[test]
    fn test_color_codes() {
        let text = dump("\"s\"", TokenDumper::new());
        assert!(text.contains("\x1b[32m"));
        assert!(text.ends_with("\x1b[0m\n"));
    }
}
