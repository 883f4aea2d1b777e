use thiserror::Error;

use crate::frontend::token::Loc;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodegenError {
    #[error("static segment exhausted: string literals need {size} bytes, capacity is {cap}")]
    StaticSegmentExhausted { size: usize, cap: usize },

    #[error("{loc}: unresolved `{op}` cannot be compiled")]
    Unresolved { op: &'static str, loc: Loc },

    #[error("{loc}: `{op}` arity {arity} has no register mapping")]
    InvalidArity {
        op: &'static str,
        arity: u8,
        loc: Loc,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = CodegenError::StaticSegmentExhausted { size: 10, cap: 4 };
        assert!(err.to_string().contains("need 10 bytes, capacity is 4"));

        let err = CodegenError::Unresolved {
            op: "ident",
            loc: Loc::new("c.cdr", 2, 1),
        };
        assert_eq!(err.to_string(), "c.cdr:2:1: unresolved `ident` cannot be compiled");

        let err = CodegenError::InvalidArity {
            op: "syscall",
            arity: 7,
            loc: Loc::new("c.cdr", 1, 1),
        };
        assert_eq!(err.to_string(), "c.cdr:1:1: `syscall` arity 7 has no register mapping");
    }
}
