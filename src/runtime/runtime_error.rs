use thiserror::Error;

use crate::frontend::token::Loc;

/// A fatal condition raised while interpreting a program.
///
/// Every variant carries the location of the instruction being executed.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// An identifier or macro marker survived resolution.
    #[error("{loc}: unresolved `{op}` reached at runtime")]
    Unresolved { op: &'static str, loc: Loc },

    #[error("{loc}: stack underflow in `{op}`")]
    StackUnderflow { op: &'static str, loc: Loc },

    #[error("{loc}: memory access out of bounds at address {addr} (memory is {size} bytes)")]
    OutOfBounds { addr: u64, size: usize, loc: Loc },

    /// A pushed literal's slot ends past `static_cap`. Slots come from the
    /// program's literal table in instruction order, so literals that never
    /// run still take up room ahead of this one.
    #[error("{loc}: static segment exhausted: literal needs bytes {start}..{end}, capacity is {cap}")]
    StaticSegmentExhausted {
        start: usize,
        end: usize,
        cap: usize,
        loc: Loc,
    },

    #[error("{loc}: procedure call stack overflow (capacity {cap})")]
    CallStackOverflow { cap: usize, loc: Loc },

    #[error("{loc}: return with empty procedure call stack")]
    CallStackUnderflow { loc: Loc },

    #[error("{loc}: unknown syscall {number}")]
    UnknownSyscall { number: u64, loc: Loc },

    #[error("{loc}: unsupported file descriptor {fd} for write")]
    UnsupportedFd { fd: u64, loc: Loc },

    #[error("{loc}: syscall {number} needs {needed} arguments, got {given}")]
    MissingSyscallArgument {
        number: u64,
        needed: usize,
        given: usize,
        loc: Loc,
    },

    #[error("{loc}: execution step limit exceeded ({limit})")]
    StepLimitExceeded { limit: usize, loc: Loc },

    #[error("{loc}: {source}")]
    Io {
        loc: Loc,
        #[source]
        source: std::io::Error,
    },
}

impl RuntimeError {
    pub fn loc(&self) -> &Loc {
        match self {
            RuntimeError::Unresolved { loc, .. }
            | RuntimeError::StackUnderflow { loc, .. }
            | RuntimeError::OutOfBounds { loc, .. }
            | RuntimeError::StaticSegmentExhausted { loc, .. }
            | RuntimeError::CallStackOverflow { loc, .. }
            | RuntimeError::CallStackUnderflow { loc }
            | RuntimeError::UnknownSyscall { loc, .. }
            | RuntimeError::UnsupportedFd { loc, .. }
            | RuntimeError::MissingSyscallArgument { loc, .. }
            | RuntimeError::StepLimitExceeded { loc, .. }
            | RuntimeError::Io { loc, .. } => loc,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loc() -> Loc {
        Loc::new("rt.cdr", 3, 4)
    }

    #[test]
    fn test_messages_start_with_location() {
        let err = RuntimeError::StackUnderflow { op: "add", loc: loc() };
        assert_eq!(err.to_string(), "rt.cdr:3:4: stack underflow in `add`");
    }

    #[test]
    fn test_overflow_message_names_capacity() {
        let err = RuntimeError::CallStackOverflow { cap: 8, loc: loc() };
        assert!(err.to_string().contains("overflow (capacity 8)"));
    }

    #[test]
    fn test_io_error_keeps_source() {
        let err = RuntimeError::Io {
            loc: loc(),
            source: std::io::Error::other("pipe closed"),
        };
        assert!(err.to_string().ends_with("pipe closed"));
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.loc(), &loc());
    }
}
