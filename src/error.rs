use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::bytecode::disasm::DumpError;
use crate::bytecode::resolve_error::ResolveError;
use crate::codegen::{CodegenError, ToolchainError};
use crate::frontend::{LexError, ParseError};
use crate::runtime::RuntimeError;

/// Any failure of the cinder pipeline. Every one is fatal to the command.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: expected a .cdr source or .cimg image", path.display())]
    UnknownExtension { path: PathBuf },

    #[error("{}: invalid program image: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: postcard::Error,
    },

    #[error("cannot encode program image: {0}")]
    Encode(#[source] postcard::Error),

    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),

    #[error(transparent)]
    Codegen(#[from] CodegenError),

    #[error(transparent)]
    Toolchain(#[from] ToolchainError),

    #[error(transparent)]
    Dump(#[from] DumpError),

    #[error("output error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::Loc;

    #[test]
    fn test_stage_errors_display_unchanged() {
        let err: Error = ResolveError::UnmatchedEnd {
            loc: Loc::new("e.cdr", 1, 1),
        }
        .into();
        assert_eq!(err.to_string(), "e.cdr:1:1: unmatched end");
    }

    #[test]
    fn test_extension_message() {
        let err = Error::UnknownExtension {
            path: PathBuf::from("prog.txt"),
        };
        assert_eq!(err.to_string(), "prog.txt: expected a .cdr source or .cimg image");
    }
}
