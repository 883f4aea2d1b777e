use std::path::PathBuf;

use crate::codegen::CodegenConfig;
use crate::runtime::InterpConfig;

/// Settings shared by every subcommand, built from CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOptions {
    /// `.asm`, `.o` and the executable are written next to this prefix.
    pub out_prefix: PathBuf,
    /// Bytes reserved for string literals.
    pub static_cap: usize,
    /// Bytes of runtime memory after the static segment.
    pub mem_cap: usize,
    /// Procedure nesting limit.
    pub proc_stack_cap: usize,
    /// Run the executable after linking.
    pub execute: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            out_prefix: PathBuf::from("./build/out"),
            static_cap: 64 * 1024,
            mem_cap: 64 * 1024,
            proc_stack_cap: 1024,
            execute: false,
        }
    }
}

impl RunOptions {
    pub fn interp_config(&self) -> InterpConfig {
        InterpConfig {
            static_cap: self.static_cap,
            mem_cap: self.mem_cap,
            proc_stack_cap: self.proc_stack_cap,
            ..InterpConfig::default()
        }
    }

    pub fn codegen_config(&self) -> CodegenConfig {
        CodegenConfig {
            static_cap: self.static_cap,
            mem_cap: self.mem_cap,
            proc_stack_cap: self.proc_stack_cap,
        }
    }
}

/// Output format of the `dump` subcommand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DumpFormat {
    /// Human readable listing with jump arrows.
    #[default]
    Text,
    /// `index: {json}` lines that can be read back.
    Json,
}
