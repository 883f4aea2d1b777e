use thiserror::Error;

use crate::bytecode::Op;
use crate::frontend::token::Loc;

/// Kind of definition a `proc` / `macro` marker introduces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefKind {
    Procedure,
    Macro,
}

impl std::fmt::Display for DefKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DefKind::Procedure => write!(f, "procedure"),
            DefKind::Macro => write!(f, "macro"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("{loc}: unmatched else")]
    UnmatchedElse { loc: Loc },

    #[error("{loc}: unmatched do")]
    UnmatchedDo { loc: Loc },

    #[error("{loc}: unmatched end")]
    UnmatchedEnd { loc: Loc },

    /// An `end` whose opener cannot be closed by `end` (a `while` without `do`).
    #[error("{loc}: unreachable end, block started with `{opener}` at {opener_loc}")]
    UnreachableEnd {
        opener: &'static str,
        opener_loc: Loc,
        loc: Loc,
    },

    #[error("{loc}: unclosed block started with `{opener}`")]
    UnclosedBlock { opener: &'static str, loc: Loc },

    #[error("{loc}: unclosed macro definition `{name}`")]
    UnclosedMacro { name: String, loc: Loc },

    #[error("{loc}: empty {kind} definition")]
    EmptyDefinition { kind: DefKind, loc: Loc },

    #[error("{loc}: {kind} name must be identifier")]
    NameNotIdentifier { kind: DefKind, loc: Loc },

    #[error("{loc}: duplicate identifier `{name}`")]
    DuplicateIdentifier { name: String, loc: Loc },

    #[error("{loc}: nested proc definition not supported")]
    NestedProcedure { loc: Loc },

    #[error("{loc}: undefined identifier `{name}`")]
    UndefinedIdentifier { name: String, loc: Loc },

    #[error("{loc}: macro `{name}` used before definition")]
    MacroUsedBeforeDefinition { name: String, loc: Loc },

    #[error("{loc}: macro expansion of `{name}` nested deeper than {limit} levels")]
    MacroTooDeep {
        name: String,
        limit: usize,
        loc: Loc,
    },
}

impl ResolveError {
    pub fn unreachable_end(opener: &Op, opener_loc: &Loc, loc: &Loc) -> Self {
        ResolveError::UnreachableEnd {
            opener: opener.name(),
            opener_loc: opener_loc.clone(),
            loc: loc.clone(),
        }
    }

    pub fn unclosed_block(opener: &Op, loc: &Loc) -> Self {
        ResolveError::UnclosedBlock {
            opener: opener.name(),
            loc: loc.clone(),
        }
    }

    pub fn loc(&self) -> &Loc {
        match self {
            ResolveError::UnmatchedElse { loc }
            | ResolveError::UnmatchedDo { loc }
            | ResolveError::UnmatchedEnd { loc }
            | ResolveError::UnreachableEnd { loc, .. }
            | ResolveError::UnclosedBlock { loc, .. }
            | ResolveError::UnclosedMacro { loc, .. }
            | ResolveError::EmptyDefinition { loc, .. }
            | ResolveError::NameNotIdentifier { loc, .. }
            | ResolveError::DuplicateIdentifier { loc, .. }
            | ResolveError::NestedProcedure { loc }
            | ResolveError::UndefinedIdentifier { loc, .. }
            | ResolveError::MacroUsedBeforeDefinition { loc, .. }
            | ResolveError::MacroTooDeep { loc, .. } => loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new("r.cdr", 7, 2)
    }

    #[test]
    fn test_unmatched_end_display() {
        let err = ResolveError::UnmatchedEnd { loc: loc() };
        assert_eq!(err.to_string(), "r.cdr:7:2: unmatched end");
    }

    #[test]
    fn test_unreachable_end_display() {
        let err = ResolveError::unreachable_end(&Op::While, &Loc::new("r.cdr", 1, 1), &loc());
        let msg = err.to_string();
        assert!(msg.contains("unreachable end"));
        assert!(msg.contains("`while`"));
        assert!(msg.contains("r.cdr:1:1"));
    }

    #[test]
    fn test_unclosed_block_display() {
        let err = ResolveError::unclosed_block(&Op::If, &loc());
        assert_eq!(err.to_string(), "r.cdr:7:2: unclosed block started with `if`");
    }

    #[test]
    fn test_definition_kind_in_messages() {
        let err = ResolveError::NameNotIdentifier {
            kind: DefKind::Procedure,
            loc: loc(),
        };
        assert!(err.to_string().contains("procedure name must be identifier"));

        let err = ResolveError::EmptyDefinition {
            kind: DefKind::Macro,
            loc: loc(),
        };
        assert!(err.to_string().contains("empty macro definition"));
    }

    #[test]
    fn test_identifier_errors_name_the_identifier() {
        let err = ResolveError::MacroUsedBeforeDefinition {
            name: "sq".to_string(),
            loc: loc(),
        };
        assert!(err.to_string().contains("`sq` used before definition"));

        let err = ResolveError::DuplicateIdentifier {
            name: "inc".to_string(),
            loc: loc(),
        };
        assert!(err.to_string().contains("duplicate identifier `inc`"));
    }

    #[test]
    fn test_loc_accessor() {
        let err = ResolveError::NestedProcedure { loc: loc() };
        assert_eq!(err.loc(), &loc());
    }

    #[test]
    fn test_error_implements_std_error() {
        let err = ResolveError::UnmatchedDo { loc: loc() };
        let _: &dyn std::error::Error = &err;
    }
}
