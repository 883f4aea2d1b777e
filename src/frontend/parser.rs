use crate::bytecode::{Instruction, Op};
use crate::frontend::parser_error::ParseError;
use crate::frontend::token::{Token, TokenKind};

/// Largest arity accepted by `(N)syscall` and `(N)dup`.
pub const MAX_ARITY: u8 = 6;

/// Smallest arity accepted by `(N)dup`; `dup` itself covers N = 1.
pub const MIN_DUP_ARITY: u8 = 2;

/// Turns lexed tokens into instructions, one per token.
///
/// Parsing is position independent: block structure, names and macros are
/// left to the resolver.
pub struct Parser {
    tokens: Vec<Token>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser { tokens }
    }

    /// Parses every token, stopping at the first error.
    pub fn parse(&self) -> Result<Vec<Instruction>, ParseError> {
        self.tokens.iter().map(parse_token).collect()
    }
}

/// Maps one token to its instruction.
///
/// Recognition order: comment, string literal, unsigned integer, keyword,
/// `(N)syscall` / `(N)dup`, and finally a raw identifier.
pub fn parse_token(token: &Token) -> Result<Instruction, ParseError> {
    let text = token.text.as_str();
    let loc = token.loc.clone();

    let op = match token.kind() {
        TokenKind::Comment => Op::Comment(text.to_string()),
        TokenKind::Str => Op::PushStr(decode_string(token)?),
        TokenKind::Word => {
            if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
                let value = text.parse::<u64>().map_err(|_| ParseError::IntegerOutOfRange {
                    text: text.to_string(),
                    loc: loc.clone(),
                })?;
                Op::PushInt(value)
            } else if let Some(op) = Op::keyword(text) {
                op
            } else if let Some(op) = parse_variadic(token)? {
                op
            } else {
                Op::Ident(text.to_string())
            }
        }
    };

    Ok(Instruction::new(op, loc))
}

/// Recognizes `(N)name`. Returns `Ok(None)` when the text does not have that
/// shape or names something other than `syscall` / `dup`.
fn parse_variadic(token: &Token) -> Result<Option<Op>, ParseError> {
    let Some(rest) = token.text.strip_prefix('(') else {
        return Ok(None);
    };
    let mut chars = rest.chars();
    let (Some(digit), Some(')')) = (chars.next(), chars.next()) else {
        return Ok(None);
    };
    let name = chars.as_str();

    let Some(arity) = digit.to_digit(10).map(|d| d as u8) else {
        return Ok(None);
    };
    if arity > MAX_ARITY || name.is_empty() || !name.bytes().all(|b| b.is_ascii_lowercase()) {
        return Ok(None);
    }

    match name {
        "syscall" => Ok(Some(Op::Syscall(arity))),
        "dup" if arity < MIN_DUP_ARITY => Err(ParseError::InvalidArity {
            word: name.to_string(),
            arity,
            expected: "2..=6",
            loc: token.loc.clone(),
        }),
        "dup" => Ok(Some(Op::DupN(arity))),
        _ => Ok(None),
    }
}

/// Strips the quotes of a string token and decodes `\n`, `\t`, `\\`, `\"`.
fn decode_string(token: &Token) -> Result<String, ParseError> {
    let text = token.text.as_str();
    let inner = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| ParseError::UnterminatedString {
            text: text.to_string(),
            loc: token.loc.clone(),
        })?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('\\') => out.push('\\'),
            Some('"') => out.push('"'),
            Some(other) => {
                return Err(ParseError::UnknownEscape {
                    escape: other,
                    text: text.to_string(),
                    loc: token.loc.clone(),
                });
            }
            None => {
                return Err(ParseError::UnterminatedString {
                    text: text.to_string(),
                    loc: token.loc.clone(),
                });
            }
        }
    }

    Ok(out)
}
