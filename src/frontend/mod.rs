pub mod lexer;
pub mod parser;
pub mod parser_error;
pub mod token;
pub mod token_dumper;

pub use lexer::{LexError, Lexer};
pub use parser::Parser;
pub use parser_error::ParseError;
pub use token::{Loc, Token, TokenKind};
