pub mod interp;
pub mod memory;
pub mod runtime_error;
pub mod syscall;

pub use interp::{InterpConfig, Interpreter, Outcome};
pub use runtime_error::RuntimeError;
