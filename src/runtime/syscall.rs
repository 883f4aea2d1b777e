//! Linux syscall subset understood by both engines.

use crate::frontend::token::Loc;
use crate::runtime::runtime_error::RuntimeError;

pub const SYS_WRITE: u64 = 1;
pub const SYS_EXIT: u64 = 60;

pub const STDOUT: u64 = 1;
pub const STDERR: u64 = 2;

/// x86-64 syscall argument registers, in the order arguments are popped.
pub const ARG_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "r10", "r8", "r9"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

/// A decoded syscall request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syscall {
    Write { stream: Stream, addr: u64, len: u64 },
    Exit { code: u64 },
}

impl Syscall {
    /// Decode `number` with its popped arguments (`args[0]` popped first).
    pub fn decode(number: u64, args: &[u64], loc: &Loc) -> Result<Syscall, RuntimeError> {
        let needed = match number {
            SYS_WRITE => 3,
            SYS_EXIT => 1,
            _ => {
                return Err(RuntimeError::UnknownSyscall {
                    number,
                    loc: loc.clone(),
                });
            }
        };
        if args.len() < needed {
            return Err(RuntimeError::MissingSyscallArgument {
                number,
                needed,
                given: args.len(),
                loc: loc.clone(),
            });
        }

        match number {
            SYS_WRITE => {
                let stream = match args[0] {
                    STDOUT => Stream::Stdout,
                    STDERR => Stream::Stderr,
                    fd => {
                        return Err(RuntimeError::UnsupportedFd {
                            fd,
                            loc: loc.clone(),
                        });
                    }
                };
                Ok(Syscall::Write {
                    stream,
                    addr: args[1],
                    len: args[2],
                })
            }
            _ => Ok(Syscall::Exit { code: args[0] }),
        }
    }
}

/// Process status the kernel reports for `exit(code)`.
pub fn exit_status(code: u64) -> i32 {
    (code & 0xff) as i32
}
