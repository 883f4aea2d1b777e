pub mod codegen_error;
pub mod toolchain;
pub mod x86_64;

pub use codegen_error::CodegenError;
pub use toolchain::{Artifacts, RunOutput, ToolchainError};
pub use x86_64::{CodeGenerator, CodegenConfig};
