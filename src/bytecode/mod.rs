pub mod disasm;
pub mod ir;
pub mod op;
pub mod resolve;
pub mod resolve_error;

pub use ir::{Instruction, Known, Macro, Program};
pub use op::{BinOp, Op};
pub use resolve::Resolver;
pub use resolve_error::ResolveError;
