//! cinder: a stack language with an interpreter and an x86-64 NASM backend.
//!
//! Source flows one way through the crate:
//! `frontend` (tokens, instructions) → `bytecode::resolve` (linked program)
//! → `runtime::interp` or `codegen`.

pub mod bytecode;
pub mod codegen;
pub mod config;
pub mod driver;
pub mod error;
pub mod frontend;
pub mod runtime;

pub use config::RunOptions;
pub use error::{Error, Result};
